//! Persona configuration used to voice commentary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommendation::Sentiment;

/// Errors raised while loading a persona catalog.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("invalid persona catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("persona catalog is empty")]
    Empty,

    #[error("persona '{persona}' has no {field}")]
    MissingList { persona: String, field: &'static str },
}

/// One commentary persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub name: String,
    /// Speaking style description fed into the prompt
    pub style: String,
    /// Voice catalog query; defaults to `name` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    pub catchphrases: Vec<String>,
    pub bullish_catchphrases: Vec<String>,
    pub bearish_catchphrases: Vec<String>,
    pub bullish_traits: Vec<String>,
    pub bearish_traits: Vec<String>,
}

impl PersonaProfile {
    pub fn voice_query(&self) -> &str {
        self.voice.as_deref().unwrap_or(&self.name)
    }

    pub fn sentiment_catchphrases(&self, sentiment: Sentiment) -> &[String] {
        match sentiment {
            Sentiment::Bullish => &self.bullish_catchphrases,
            Sentiment::Bearish => &self.bearish_catchphrases,
        }
    }

    pub fn traits(&self, sentiment: Sentiment) -> &[String] {
        match sentiment {
            Sentiment::Bullish => &self.bullish_traits,
            Sentiment::Bearish => &self.bearish_traits,
        }
    }

    /// Template line used when generated commentary is unavailable.
    ///
    /// Entries are picked deterministically: index `rotation` modulo each
    /// list's length.
    pub fn fallback_line(&self, rotation: usize, subject: &str, sentiment: Sentiment) -> String {
        let catchphrase = pick(&self.catchphrases, rotation);
        let trait_ = pick(self.traits(sentiment), rotation);
        let sentiment_line = pick(self.sentiment_catchphrases(sentiment), rotation);
        format!("{catchphrase} {subject} is {trait_}! {sentiment_line}")
    }

    fn validate(&self) -> Result<(), PersonaError> {
        let lists: [(&'static str, &Vec<String>); 5] = [
            ("catchphrases", &self.catchphrases),
            ("bullish_catchphrases", &self.bullish_catchphrases),
            ("bearish_catchphrases", &self.bearish_catchphrases),
            ("bullish_traits", &self.bullish_traits),
            ("bearish_traits", &self.bearish_traits),
        ];
        for (field, list) in lists {
            if list.is_empty() {
                return Err(PersonaError::MissingList {
                    persona: self.name.clone(),
                    field,
                });
            }
        }
        Ok(())
    }
}

fn pick(list: &[String], rotation: usize) -> &str {
    if list.is_empty() {
        return "";
    }
    &list[rotation % list.len()]
}

/// Ordered set of personas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaCatalog {
    pub personas: Vec<PersonaProfile>,
}

impl PersonaCatalog {
    /// Parse and validate a catalog from JSON.
    pub fn from_json(json: &str) -> Result<Self, PersonaError> {
        let catalog: PersonaCatalog = serde_json::from_str(json)?;
        if catalog.personas.is_empty() {
            return Err(PersonaError::Empty);
        }
        for persona in &catalog.personas {
            persona.validate()?;
        }
        Ok(catalog)
    }

    /// Case-insensitive lookup by name.
    pub fn find(&self, name: &str) -> Option<&PersonaProfile> {
        self.personas
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

/// Commentary produced for one persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaCommentary {
    pub persona: String,
    pub sentiment: Sentiment,
    pub text: String,
    /// False when the template fallback was used
    pub generated: bool,
}
