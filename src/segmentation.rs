//! Sentence segmentation for English prose.
//!
//! A rule-based splitter in the spirit of Punkt: a sentence ends at a run of
//! terminal punctuation (optionally followed by closing quotes or brackets)
//! that is followed by whitespace or the end of the text. Periods after known
//! abbreviations and single-letter initials do not end a sentence; dotted
//! tokens (`U.S.`) and ellipses only do when the next word is not lowercase.
//! Line breaks alone never split.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Abbreviations (lowercase, without the final period) that never end a sentence
const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "mx", "dr", "prof", "sr", "jr", "st", "mt", "ft", "rev", "hon", "gen",
    "col", "capt", "lt", "sgt", "cpl", "gov", "sen", "rep", "pres", "vs", "etc", "e.g", "i.e",
    "cf", "al", "approx", "dept", "inc", "ltd", "corp", "jan", "feb", "aug", "sept", "oct",
    "nov", "dec", "fig", "vol", "ch", "pp",
];

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’' | '»')
}

fn is_opening(c: char) -> bool {
    matches!(c, '"' | '\'' | '(' | '[' | '“' | '‘' | '«')
}

/// Splits text into sentences
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    abbreviations: HashSet<String>,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::with_abbreviations(DEFAULT_ABBREVIATIONS.iter().copied())
    }
}

impl SentenceSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a splitter with a custom abbreviation list.
    ///
    /// Entries are matched case-insensitively; a trailing period is optional.
    pub fn with_abbreviations<I, S>(abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let abbreviations = abbreviations
            .into_iter()
            .map(|a| a.as_ref().trim().trim_end_matches('.').to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        Self { abbreviations }
    }

    /// Split `text` into trimmed, non-empty sentence slices, in order
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            let (punct_pos, ch) = chars[i];
            if !is_terminal(ch) {
                i += 1;
                continue;
            }

            let mut j = i;
            while j + 1 < chars.len() && is_terminal(chars[j + 1].1) {
                j += 1;
            }
            let run_end = chars[j].0 + chars[j].1.len_utf8();
            while j + 1 < chars.len() && is_closing(chars[j + 1].1) {
                j += 1;
            }
            let end = chars[j].0 + chars[j].1.len_utf8();
            i = j + 1;

            // "3.14", "e.g.," and similar are not boundaries
            if let Some(&(_, next)) = chars.get(i) {
                if !next.is_whitespace() {
                    continue;
                }
            }

            let next_word = chars[i..]
                .iter()
                .map(|&(_, c)| c)
                .find(|c| !c.is_whitespace());

            if self.is_boundary(&text[start..punct_pos], &text[punct_pos..run_end], next_word) {
                push_sentence(&mut sentences, &text[start..end]);
                start = end;
            }
        }

        push_sentence(&mut sentences, &text[start..]);
        sentences
    }

    fn is_boundary(&self, preceding: &str, run: &str, next_word: Option<char>) -> bool {
        let Some(next) = next_word else {
            return true;
        };

        if run != "." {
            // Ellipsis mid-sentence: "Wait... what?"
            if run.chars().all(|c| c == '.' || c == '…') {
                return !next.is_lowercase();
            }
            return true;
        }

        let word = preceding
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(is_opening);
        if word.is_empty() {
            return true;
        }

        if self.abbreviations.contains(&word.to_lowercase()) {
            return false;
        }

        let mut letters = word.chars();
        if let (Some(c), None) = (letters.next(), letters.next()) {
            if c.is_uppercase() && c != 'I' {
                return false;
            }
        }

        if word.contains('.') {
            return !next.is_lowercase();
        }

        true
    }
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, candidate: &'a str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
}

/// Split with the default English abbreviation list
pub fn split_sentences(text: &str) -> Vec<&str> {
    static SPLITTER: OnceLock<SentenceSplitter> = OnceLock::new();
    SPLITTER.get_or_init(SentenceSplitter::default).split(text)
}
