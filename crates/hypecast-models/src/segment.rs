//! Bounded text segments fed to a rendering backend one at a time.

use serde::{Deserialize, Serialize};

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// One chunk of narration text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Zero-based position in the source text
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

impl Segment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = word_count(&text);
        Self {
            index,
            text,
            word_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  one\ttwo \n three  "), 3);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
    }

    #[test]
    fn test_segment_counts_words() {
        let seg = Segment::new(2, "Bitcoin is up. Again.");
        assert_eq!(seg.index, 2);
        assert_eq!(seg.word_count, 4);
    }
}
