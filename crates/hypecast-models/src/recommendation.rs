//! Keyword classifier turning free-form analysis text into a recommendation.

use serde::{Deserialize, Serialize};
use std::fmt;

const POSITIVE: &str = "INVEST";
const NEGATIONS: [&str; 3] = ["DO NOT INVEST", "DON'T INVEST", "NOT INVEST"];

/// Binary outcome of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "INVEST")]
    Invest,
    #[serde(rename = "DO NOT INVEST")]
    DoNotInvest,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Invest => "INVEST",
            Recommendation::DoNotInvest => "DO NOT INVEST",
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Recommendation::Invest)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persona tone derived from the recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Bullish,
    Bearish,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
        }
    }
}

impl From<Recommendation> for Sentiment {
    fn from(rec: Recommendation) -> Self {
        match rec {
            Recommendation::Invest => Sentiment::Bullish,
            Recommendation::DoNotInvest => Sentiment::Bearish,
        }
    }
}

/// Classify analysis text.
///
/// Positive iff the upper-cased text contains `INVEST` and none of the
/// negated phrases. A negation anywhere wins over any positive mention.
pub fn classify(text: &str) -> Recommendation {
    let upper = text.to_uppercase();
    let negated = NEGATIONS.iter().any(|phrase| upper.contains(phrase));
    if upper.contains(POSITIVE) && !negated {
        Recommendation::Invest
    } else {
        Recommendation::DoNotInvest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_is_negative() {
        let text = "Volume is thin. We recommend you DO NOT INVEST at this time.";
        assert_eq!(classify(text), Recommendation::DoNotInvest);
    }

    #[test]
    fn test_plain_invest_is_positive() {
        let text = "Momentum is real. Strong case to INVEST now.";
        assert_eq!(classify(text), Recommendation::Invest);
    }

    #[test]
    fn test_negation_wins_over_positive() {
        let text = "Some say INVEST. Final call: DO NOT INVEST.";
        assert_eq!(classify(text), Recommendation::DoNotInvest);
    }

    #[test]
    fn test_other_negations_and_case() {
        assert_eq!(classify("don't invest in this"), Recommendation::DoNotInvest);
        assert_eq!(classify("I would not invest here"), Recommendation::DoNotInvest);
        assert_eq!(classify("go ahead and invest"), Recommendation::Invest);
    }

    #[test]
    fn test_no_keyword_is_negative() {
        assert_eq!(classify("Looks interesting."), Recommendation::DoNotInvest);
        assert_eq!(classify(""), Recommendation::DoNotInvest);
    }

    #[test]
    fn test_sentiment_mapping_and_serde() {
        assert_eq!(Sentiment::from(Recommendation::Invest), Sentiment::Bullish);
        assert_eq!(Sentiment::from(Recommendation::DoNotInvest), Sentiment::Bearish);
        let json = serde_json::to_string(&Recommendation::DoNotInvest).unwrap();
        assert_eq!(json, "\"DO NOT INVEST\"");
    }
}
