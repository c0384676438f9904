// Lexicon matcher - literal block-list scan with whole-word semantics.
//
// The lexicon is built once from configuration and shared immutably by every
// detector that needs it. Obfuscated spellings ("sh*t") are separate entries;
// nothing here tries to normalise them.

use regex::{Regex, RegexBuilder};
use std::ops::Range;

const BUILTIN_WORDS: &[&str] = &[
    "fuck", "f*ck", "shit", "sh*t", "bitch", "bastard", "asshole", "dickhead", "cunt", "wanker",
    "motherfucker", "bullshit", "crap", "damn",
];

/// One configured term plus its compiled case-insensitive pattern.
#[derive(Debug, Clone)]
struct LexiconEntry {
    word: String,
    pattern: Regex,
}

/// Immutable block-list. Entry order is the configuration order and is the
/// order in which matches are reported.
#[derive(Debug, Clone)]
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
}

impl Lexicon {
    /// Build a lexicon from raw configured terms.
    ///
    /// Terms are trimmed and lowercased; blanks and duplicates are dropped while
    /// the first occurrence keeps its position.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<LexiconEntry> = Vec::new();

        for raw in words {
            let word = raw.as_ref().trim().to_lowercase();
            if word.is_empty() || entries.iter().any(|e| e.word == word) {
                continue;
            }

            match RegexBuilder::new(&regex::escape(&word))
                .case_insensitive(true)
                .build()
            {
                Ok(pattern) => entries.push(LexiconEntry { word, pattern }),
                Err(e) => tracing::warn!(word = %word, error = %e, "Skipping lexicon entry"),
            }
        }

        Self { entries }
    }

    /// The default block-list used when no lexicon file is configured.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_WORDS.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when any configured term appears as a standalone word.
    pub fn contains_profanity(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.entries
            .iter()
            .any(|entry| standalone_matches(entry, text).next().is_some())
    }

    /// Configured terms found in `text`, in configuration order.
    pub fn get_profane_words(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|entry| standalone_matches(entry, text).next().is_some())
            .map(|entry| entry.word.clone())
            .collect()
    }

    /// Replace every whole-word match with asterisks of the same length.
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut ranges: Vec<Range<usize>> = self
            .entries
            .iter()
            .flat_map(|entry| standalone_matches(entry, text).collect::<Vec<_>>())
            .collect();
        ranges.sort_by_key(|r| (r.start, std::cmp::Reverse(r.end)));

        let mut cleaned = String::with_capacity(text.len());
        let mut cursor = 0;
        for range in ranges {
            // Overlapping entries: the earliest, longest match wins.
            if range.start < cursor {
                continue;
            }
            cleaned.push_str(&text[cursor..range.start]);
            let masked = text[range.clone()].chars().count();
            cleaned.extend(std::iter::repeat('*').take(masked));
            cursor = range.end;
        }
        cleaned.push_str(&text[cursor..]);
        cleaned
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte ranges where `entry` occurs with no word character on either side.
fn standalone_matches<'a>(
    entry: &'a LexiconEntry,
    text: &'a str,
) -> impl Iterator<Item = Range<usize>> + 'a {
    entry.pattern.find_iter(text).filter_map(move |m| {
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        let bounded = !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char);
        bounded.then(|| m.range())
    })
}
