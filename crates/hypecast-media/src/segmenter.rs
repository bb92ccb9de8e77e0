//! English sentence splitting and word-budget segment packing.

use std::collections::HashSet;
use std::sync::LazyLock;

use hypecast_models::{word_count, Segment};

/// Default word budget per segment.
pub const DEFAULT_MAX_WORDS: usize = 20;

static ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "mt.", "rev.", "gen.", "gov.",
    "sen.", "rep.", "capt.", "lt.", "col.", "sgt.", "vs.", "etc.", "e.g.", "i.e.", "cf.",
    "approx.", "est.", "dept.", "inc.", "ltd.", "co.", "corp.", "llc.", "no.", "nos.", "vol.",
    "fig.", "p.", "pp.", "u.s.", "u.k.", "u.n.", "e.u.", "a.m.", "p.m.", "jan.", "feb.",
    "mar.", "apr.", "jun.", "jul.", "aug.", "sep.", "sept.", "oct.", "nov.", "dec.", "mon.",
    "tue.", "wed.", "thu.", "fri.", "sat.", "sun.", "ave.", "blvd.", "rd.", "min.", "max.",
    "avg.",
];

static ABBREVIATIONS_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ABBREVIATIONS.iter().copied().collect());

const TERMINATORS: &[char] = &['.', '!', '?', '…'];
const CLOSING: &[char] = &['"', '\'', '”', '’', ')', ']', '}'];
const OPENING: &[char] = &['"', '\'', '“', '‘', '(', '['];

/// Paired spans consumed as a unit so inner punctuation never splits.
static PAIRED_DELIMITERS: &[(char, char)] = &[('"', '"'), ('“', '”'), ('(', ')'), ('[', ']'), ('{', '}')];

const MAX_DELIMITER_SEARCH: usize = 1000;

fn is_initial(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.'), None) if c.is_uppercase()
    )
}

fn is_abbreviation(word: &str) -> bool {
    let word = word.trim_start_matches(OPENING);
    if is_initial(word) {
        return true;
    }
    ABBREVIATIONS_SET.contains(word.to_lowercase().as_str())
}

/// Iterator over the sentences of a text.
///
/// Sentences break after `.`, `!` or `?` (plus any closing quotes or
/// brackets) followed by whitespace, whatever the case of the next word.
/// Abbreviations, initials and decimal numbers never end a sentence. An
/// ellipsis, or a terminator inside a closed quoted or bracketed span, only
/// ends one when the next word starts with an uppercase letter, a digit or an
/// opening quote.
#[derive(Debug)]
pub struct SentenceParser<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> SentenceParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn prev_char(&self) -> Option<char> {
        self.input[..self.position].chars().next_back()
    }

    /// Length of a number like `1,000.50` starting here.
    fn number_len(&self) -> Option<usize> {
        let rest = self.remaining();
        if !rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        if self.prev_char().is_some_and(|c| c.is_alphanumeric()) {
            return None;
        }

        let bytes = rest.as_bytes();
        let mut end = 0;
        while end < bytes.len() {
            match bytes[end] {
                b'0'..=b'9' => end += 1,
                b'.' | b',' if bytes.get(end + 1).is_some_and(u8::is_ascii_digit) => end += 1,
                _ => break,
            }
        }
        Some(end)
    }

    /// Length of a closed quoted or bracketed span starting here.
    fn delimited_len(&self) -> Option<usize> {
        let mut chars = self.remaining().char_indices();
        let (_, first) = chars.next()?;
        let &(open, close) = PAIRED_DELIMITERS.iter().find(|(o, _)| *o == first)?;

        let mut depth = 1usize;
        for (offset, ch) in chars {
            if offset > MAX_DELIMITER_SEARCH {
                break;
            }
            if ch == close {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + ch.len_utf8());
                }
            } else if ch == open {
                depth += 1;
            }
        }
        None
    }

    /// Consume trailing terminators and closing punctuation.
    ///
    /// Returns the last terminator seen.
    fn absorb_tail(&mut self, mut last_terminator: char) -> char {
        while let Some(next) = self.peek() {
            if TERMINATORS.contains(&next) {
                last_terminator = next;
            } else if !CLOSING.contains(&next) {
                break;
            }
            self.position += next.len_utf8();
        }
        last_terminator
    }

    fn is_boundary(&self, sentence: &str, terminator: char, quoted: bool) -> bool {
        let rest = self.remaining();
        if rest.is_empty() {
            return true;
        }
        if !rest.starts_with(char::is_whitespace) {
            return false;
        }
        let Some(next) = rest.trim_start().chars().next() else {
            return true;
        };

        let tail = sentence.trim_end_matches(CLOSING);
        let ellipsis = terminator == '…' || tail.ends_with("..");
        if quoted || ellipsis {
            return next.is_uppercase() || next.is_ascii_digit() || OPENING.contains(&next);
        }

        if terminator == '.' {
            return !tail
                .split_whitespace()
                .last()
                .is_some_and(is_abbreviation);
        }
        true
    }

    /// Parse the next sentence, trimmed. `None` once input is exhausted.
    pub fn parse_sentence(&mut self) -> Option<&'a str> {
        let skipped = self.remaining().len() - self.remaining().trim_start().len();
        self.position += skipped;
        if self.remaining().is_empty() {
            return None;
        }

        let start = self.position;
        while let Some(ch) = self.peek() {
            if let Some(len) = self.number_len() {
                self.position += len;
                continue;
            }

            let mut quoted = false;
            let terminator = if let Some(len) = self.delimited_len() {
                let span = &self.input[self.position..self.position + len];
                self.position += len;
                // A span like `"Stop."` can end the sentence it closes
                let inner = span[..span.len() - span.chars().next_back().map_or(0, char::len_utf8)]
                    .trim_end();
                match inner.chars().next_back() {
                    Some(c) if TERMINATORS.contains(&c) => {
                        quoted = true;
                        c
                    }
                    _ => continue,
                }
            } else {
                self.position += ch.len_utf8();
                if !TERMINATORS.contains(&ch) {
                    continue;
                }
                ch
            };

            let last_terminator = self.absorb_tail(terminator);
            let sentence = &self.input[start..self.position];
            if self.is_boundary(sentence, last_terminator, quoted) {
                break;
            }
        }

        Some(self.input[start..self.position].trim_end())
    }
}

impl<'a> Iterator for SentenceParser<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.parse_sentence()
    }
}

/// Split text into whitespace-normalized sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    SentenceParser::new(text)
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Packs sentences into segments bounded by a word budget.
#[derive(Debug, Clone, Copy)]
pub struct TextSegmenter {
    max_words: usize,
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORDS)
    }
}

impl TextSegmenter {
    /// A budget of zero is treated as one.
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words: max_words.max(1),
        }
    }

    /// Split `text` into ordered segments.
    ///
    /// Before adding a sentence, the current segment is closed if it already
    /// holds `max_words` or more, or if adding the sentence would reach that
    /// budget. Sentences are never split, so one long sentence becomes its own
    /// segment.
    pub fn segment(&self, text: &str) -> Vec<Segment> {
        self.pack(split_sentences(text))
    }

    /// Pack pre-split sentences.
    pub fn pack<I, S>(&self, sentences: I) -> Vec<Segment>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut current_words = 0;

        for sentence in sentences {
            let sentence = sentence.as_ref().trim();
            let words = word_count(sentence);
            if words == 0 {
                continue;
            }

            if current.is_empty() {
                current.push_str(sentence);
                current_words = words;
            } else if current_words >= self.max_words || current_words + words >= self.max_words {
                segments.push(Segment::new(segments.len(), std::mem::take(&mut current)));
                current.push_str(sentence);
                current_words = words;
            } else {
                current.push(' ');
                current.push_str(sentence);
                current_words += words;
            }
        }

        if !current.is_empty() {
            segments.push(Segment::new(segments.len(), current));
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    const SAMPLES: &[&str] = &[
        "",
        "   \n\t ",
        "One sentence without a terminator",
        "Bitcoin is up. Dr. Smith agrees! Is it 3.5x already? \"Yes.\" Buy now.",
        "Wow... What a day. The U.S. market opened at 9 a.m. Then it rallied 1,200.50 points.",
        "He said (quietly. very quietly.) that it was over. Then he left.",
        "This sentence is very long and keeps going with many many words so that it alone exceeds the whole word budget of twenty words easily. Short one. Another short one here. And a final sentence.",
        "Numbers like 42. Start a new sentence? 7 more to go.",
        "wow this coin is going up fast. i love it so much right now. buy it today before it moons. seriously do it now.",
        "To the moon! buy now. this is huge? yes.",
    ];

    #[test]
    fn test_splits_on_terminators() {
        let sentences = split_sentences("Bitcoin is up. Ethereum is down! Why? Nobody knows.");
        assert_eq!(
            sentences,
            vec!["Bitcoin is up.", "Ethereum is down!", "Why?", "Nobody knows."]
        );
    }

    #[test]
    fn test_abbreviations_and_initials_do_not_split() {
        let sentences =
            split_sentences("Mr. J. R. Smith met Dr. Jones at 5 p.m. sharp. Then they left.");
        assert_eq!(
            sentences,
            vec!["Mr. J. R. Smith met Dr. Jones at 5 p.m. sharp.", "Then they left."]
        );
    }

    #[test]
    fn test_decimals_do_not_split() {
        let sentences = split_sentences("It rose 3.75 percent. Volume hit 1,000.5 units.");
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].contains("3.75"));
    }

    #[test]
    fn test_quoted_span_stays_together() {
        let sentences = split_sentences("She shouted \"Stop. Now!\" and ran. Then silence.");
        assert_eq!(
            sentences,
            vec!["She shouted \"Stop. Now!\" and ran.", "Then silence."]
        );
    }

    #[test]
    fn test_closing_punctuation_stays_with_sentence() {
        let sentences = split_sentences("He said \"go.\" Then (it ended.) Done.");
        assert_eq!(sentences[0], "He said \"go.\"");
    }

    #[test]
    fn test_lowercase_next_word_still_splits() {
        let sentences = split_sentences("To the moon! buy now. this is huge? yes.");
        assert_eq!(sentences, vec!["To the moon!", "buy now.", "this is huge?", "yes."]);
    }

    #[test]
    fn test_lowercase_abbreviation_and_ellipsis_do_not_split() {
        let sentences = split_sentences("Meet dr. smith at noon. well... maybe later.");
        assert_eq!(sentences, vec!["Meet dr. smith at noon.", "well... maybe later."]);
    }

    #[test]
    fn test_lowercase_text_respects_budget() {
        let text = "wow this coin is going up fast. i love it so much right now. \
                    buy it today before it moons. seriously do it now.";
        let segments = TextSegmenter::new(5).segment(text);
        let words: Vec<usize> = segments.iter().map(|s| s.word_count).collect();
        assert_eq!(words, vec![7, 7, 6, 4]);
    }

    #[test]
    fn test_no_split_without_whitespace() {
        assert_eq!(split_sentences("see example.Com now."), vec!["see example.Com now."]);
    }

    #[test]
    fn test_empty_input_yields_no_segments() {
        let segmenter = TextSegmenter::default();
        assert!(segmenter.segment("").is_empty());
        assert!(segmenter.segment("  \n ").is_empty());
    }

    #[test]
    fn test_packing_rule() {
        let segmenter = TextSegmenter::new(5);
        // 2 + 2 = 4 < 5 -> combined; 4 + 2 = 6 >= 5 -> new segment
        let segments = segmenter.pack(["a b.", "c d.", "e f."]);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "a b. c d.");
        assert_eq!(segments[0].word_count, 4);
        assert_eq!(segments[1].text, "e f.");
        assert_eq!(segments[1].index, 1);
    }

    #[test]
    fn test_reaching_budget_closes_segment() {
        let segmenter = TextSegmenter::new(4);
        // 2 + 2 = 4 reaches the budget, so no merge
        let segments = segmenter.pack(["a b.", "c d."]);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_long_sentence_is_its_own_segment() {
        let segmenter = TextSegmenter::new(3);
        let segments = segmenter.pack(["a.", "one two three four five.", "b."]);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a.", "one two three four five.", "b."]);
    }

    #[test]
    fn test_rejoin_reconstructs_normalized_input() {
        let segmenter = TextSegmenter::default();
        for sample in SAMPLES {
            let rejoined = segmenter
                .segment(sample)
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            assert_eq!(rejoined, normalized(sample), "sample: {sample:?}");
        }
    }

    #[test]
    fn test_segments_respect_budget() {
        for max_words in [1, 3, 5, 20] {
            let segmenter = TextSegmenter::new(max_words);
            for sample in SAMPLES {
                let sentences = split_sentences(sample);
                for segment in segmenter.segment(sample) {
                    assert!(
                        segment.word_count < max_words || sentences.contains(&segment.text),
                        "segment {:?} breaks budget {}",
                        segment.text,
                        max_words
                    );
                }
            }
        }
    }

    #[test]
    fn test_indices_are_sequential() {
        let segments = TextSegmenter::new(3).segment(SAMPLES[6]);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index, i);
        }
    }
}
