//! Persona commentary on a finished analysis.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use hypecast_models::{PersonaCatalog, PersonaCommentary, PersonaProfile, Sentiment};
use tracing::{info, warn};

use crate::error::WorkerResult;
use crate::generative::{GenerativeModel, Prompt};

const BUNDLED_CATALOG: &str = include_str!("../../../config/personas.json");

/// Load the persona catalog from `path`, or the bundled one.
pub async fn load_catalog(path: Option<&Path>) -> WorkerResult<PersonaCatalog> {
    let catalog = match path {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            PersonaCatalog::from_json(&json)?
        }
        None => PersonaCatalog::from_json(BUNDLED_CATALOG)?,
    };
    info!(personas = catalog.len(), "Persona catalog loaded");
    Ok(catalog)
}

/// Strip pictographic emoji and dingbats; speech backends read them aloud.
pub fn strip_emoji(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| {
            !matches!(
                *c as u32,
                0x1F600..=0x1F64F
                    | 0x1F300..=0x1F5FF
                    | 0x1F680..=0x1F6FF
                    | 0x1F1E0..=0x1F1FF
                    | 0x1F900..=0x1F9FF
                    | 0x2600..=0x27BF
                    | 0xFE0F
                    | 0x200D
            )
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn system_prompt(persona: &PersonaProfile, sentiment: Sentiment) -> String {
    let mood = sentiment.as_str();
    format!(
        "You are {name} giving your opinion about a token investment.\n\
         Your speaking style is {style}.\n\
         General catchphrases (use exactly one): {general}\n\
         {mood} catchphrases (use exactly one): {moody}\n\
         Traits you tend to mention: {traits}\n\
         Stay in character, keep the tone consistent with {style}, and keep it clean enough to air.",
        name = persona.name,
        style = persona.style,
        general = persona.catchphrases.join(", "),
        moody = persona.sentiment_catchphrases(sentiment).join(", "),
        traits = persona.traits(sentiment).join(", "),
    )
}

fn user_prompt(subject: &str, analysis_text: &str, sentiment: Sentiment) -> String {
    format!(
        "Based on this analysis of {subject}:\n{analysis_text}\n\n\
         Give your {mood} opinion about investing in {subject}. \
         Use exactly one general catchphrase and one {mood} catchphrase. \
         Keep it under 100 words.",
        mood = sentiment.as_str(),
    )
}

/// Writes in-character commentary, falling back to a template when the
/// model is unavailable.
pub struct CommentaryWriter {
    model: Arc<dyn GenerativeModel>,
}

impl CommentaryWriter {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Commentary from one persona. Never fails.
    ///
    /// `rotation` picks which catchphrase and trait the fallback uses.
    pub async fn write(
        &self,
        persona: &PersonaProfile,
        rotation: usize,
        subject: &str,
        analysis_text: &str,
        sentiment: Sentiment,
    ) -> PersonaCommentary {
        let prompt = Prompt::new(
            system_prompt(persona, sentiment),
            user_prompt(subject, analysis_text, sentiment),
        );

        let generated = match self.model.complete(&prompt).await {
            Ok(text) => Some(strip_emoji(&text)).filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(persona = %persona.name, error = %e, "Commentary generation failed, using template");
                None
            }
        };

        match generated {
            Some(text) => PersonaCommentary {
                persona: persona.name.clone(),
                sentiment,
                text,
                generated: true,
            },
            None => PersonaCommentary {
                persona: persona.name.clone(),
                sentiment,
                text: persona.fallback_line(rotation, subject, sentiment),
                generated: false,
            },
        }
    }

    /// Commentary from every persona in catalog order.
    pub async fn write_all(
        &self,
        catalog: &PersonaCatalog,
        subject: &str,
        analysis_text: &str,
        sentiment: Sentiment,
    ) -> Vec<PersonaCommentary> {
        join_all(
            catalog
                .personas
                .iter()
                .enumerate()
                .map(|(i, persona)| self.write(persona, i, subject, analysis_text, sentiment)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use async_trait::async_trait;

    struct Scripted(Option<&'static str>);

    #[async_trait]
    impl GenerativeModel for Scripted {
        async fn complete(&self, prompt: &Prompt) -> WorkerResult<String> {
            assert!(prompt.image_url.is_none());
            match self.0 {
                Some(text) => Ok(text.to_string()),
                None => Err(WorkerError::analysis_failed("offline")),
            }
        }
    }

    #[test]
    fn test_strip_emoji() {
        assert_eq!(strip_emoji("To the moon 🚀🚀 baby ✨"), "To the moon baby");
        assert_eq!(strip_emoji("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_bundled_catalog_loads() {
        let catalog = load_catalog(None).await.unwrap();
        assert!(!catalog.is_empty());
    }

    #[tokio::test]
    async fn test_generated_commentary_is_cleaned() {
        let catalog = load_catalog(None).await.unwrap();
        let writer = CommentaryWriter::new(Arc::new(Scripted(Some("  Buy it 🔥 now  "))));
        let c = writer
            .write(&catalog.personas[0], 0, "PEPE", "INVEST", Sentiment::Bullish)
            .await;
        assert!(c.generated);
        assert_eq!(c.text, "Buy it now");
    }

    #[tokio::test]
    async fn test_fallback_on_model_failure() {
        let catalog = load_catalog(None).await.unwrap();
        let writer = CommentaryWriter::new(Arc::new(Scripted(None)));
        let all = writer
            .write_all(&catalog, "PEPE", "DO NOT INVEST", Sentiment::Bearish)
            .await;

        assert_eq!(all.len(), catalog.len());
        for (i, (c, p)) in all.iter().zip(&catalog.personas).enumerate() {
            assert!(!c.generated);
            assert_eq!(c.persona, p.name);
            assert_eq!(c.text, p.fallback_line(i, "PEPE", Sentiment::Bearish));
            assert!(c.text.contains("PEPE is"));
        }
    }
}
