//! Rule-based text → phoneme conversion.
//!
//! Not a phonetic transcription: letters and common spelling clusters map to
//! tokens of the fixed vocabulary in [`crate::viseme::VISEME_TABLE`], which is
//! enough for plausible lip motion.  The same input always yields the same
//! token stream.
//!
//! Rules, in priority order:
//! 1. lowercase, then drop every character that is not `a`–`z`, whitespace or
//!    a hyphen (whitespace and hyphens are word boundaries);
//! 2. greedily match the longest known cluster at the cursor (4, 3, 2 letters);
//! 3. a doubled consonant counts once;
//! 4. any remaining letter maps to its default phoneme.
//!
//! A [`Phoneme::PAUSE`] token separates consecutive words.

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::viseme::{classify, Viseme};

/// A phoneme token from the fixed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Phoneme(&'static str);

impl Phoneme {
    /// Word-boundary pause.
    pub const PAUSE: Phoneme = Phoneme("sil");

    /// Look a token up in the vocabulary.
    pub fn new(token: &str) -> Option<Phoneme> {
        crate::viseme::VISEME_TABLE
            .iter()
            .find(|(p, _)| *p == token)
            .map(|&(p, _)| Phoneme(p))
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }

    pub fn is_pause(self) -> bool {
        self == Phoneme::PAUSE
    }

    pub fn viseme(self) -> Viseme {
        classify(self.0)
    }
}

impl fmt::Display for Phoneme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One word of the input with its phonemes (no pause tokens).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Word {
    pub text: String,
    pub phonemes: Vec<Phoneme>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule tables
// ─────────────────────────────────────────────────────────────────────────────

/// Multi-letter spelling clusters.  Longest match wins.
const CLUSTERS: &[(&str, &[&str])] = &[
    ("tion", &["sh", "ah", "n"]),
    ("sion", &["zh", "ah", "n"]),
    ("igh", &["ay"]),
    ("tch", &["ch"]),
    ("dge", &["jh"]),
    ("sch", &["s", "k"]),
    ("th", &["th"]),
    ("ch", &["ch"]),
    ("sh", &["sh"]),
    ("ph", &["f"]),
    ("wh", &["w"]),
    ("ng", &["ng"]),
    ("ck", &["k"]),
    ("qu", &["k", "w"]),
    ("kn", &["n"]),
    ("wr", &["r"]),
    ("ee", &["iy"]),
    ("ea", &["iy"]),
    ("ie", &["iy"]),
    ("oo", &["uw"]),
    ("ou", &["aw"]),
    ("ow", &["ow"]),
    ("oa", &["ow"]),
    ("oh", &["oh"]),
    ("oi", &["oy"]),
    ("oy", &["oy"]),
    ("ai", &["ey"]),
    ("ay", &["ey"]),
    ("au", &["ao"]),
    ("aw", &["ao"]),
    ("er", &["er"]),
    ("ir", &["er"]),
    ("ur", &["er"]),
    ("ar", &["aa", "r"]),
    ("or", &["ao", "r"]),
];

const MAX_CLUSTER_LEN: usize = 4;

/// Default phoneme(s) per letter.
fn letter_phonemes(c: u8) -> &'static [&'static str] {
    match c {
        b'a' => &["aa"],
        b'b' => &["b"],
        b'c' => &["k"],
        b'd' => &["d"],
        b'e' => &["eh"],
        b'f' => &["f"],
        b'g' => &["g"],
        b'h' => &["hh"],
        b'i' => &["ih"],
        b'j' => &["jh"],
        b'k' => &["k"],
        b'l' => &["l"],
        b'm' => &["m"],
        b'n' => &["n"],
        b'o' => &["oh"],
        b'p' => &["p"],
        b'q' => &["k"],
        b'r' => &["r"],
        b's' => &["s"],
        b't' => &["t"],
        b'u' => &["uh"],
        b'v' => &["v"],
        b'w' => &["w"],
        b'x' => &["k", "s"],
        b'y' => &["y"],
        b'z' => &["z"],
        _ => &[],
    }
}

fn is_vowel(c: u8) -> bool {
    matches!(c, b'a' | b'e' | b'i' | b'o' | b'u')
}

static CLUSTER_MAP: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| CLUSTERS.iter().copied().collect());

/// Characters outside the letter / boundary vocabulary.
static RE_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z\s\-]").unwrap());

/// Word boundaries.
static RE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-]+").unwrap());

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

fn push_tokens(out: &mut Vec<Phoneme>, tokens: &[&str]) {
    // Every token in the rule tables is part of the vocabulary; the
    // `filter_map` only guards against a table typo.
    out.extend(tokens.iter().filter_map(|t| Phoneme::new(t)));
}

/// Convert one already-cleaned lowercase ASCII word.
fn word_to_phonemes(word: &str) -> Vec<Phoneme> {
    let bytes = word.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    'outer: while i < bytes.len() {
        for len in (2..=MAX_CLUSTER_LEN).rev() {
            if i + len > bytes.len() {
                continue;
            }
            if let Some(tokens) = CLUSTER_MAP.get(&word[i..i + len]) {
                push_tokens(&mut out, tokens);
                i += len;
                continue 'outer;
            }
        }

        let c = bytes[i];
        push_tokens(&mut out, letter_phonemes(c));
        // "ll", "ss", "tt"… articulate once.
        if i + 1 < bytes.len() && bytes[i + 1] == c && !is_vowel(c) {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// Split text into words and convert each one.
///
/// Words that contain no convertible letters are dropped.
pub fn text_to_words(text: &str) -> Vec<Word> {
    let lowered = text.to_lowercase();
    let cleaned = RE_STRIP.replace_all(&lowered, "");
    RE_BOUNDARY
        .split(&cleaned)
        .filter(|w| !w.is_empty())
        .map(|w| Word { text: w.to_string(), phonemes: word_to_phonemes(w) })
        .filter(|w| !w.phonemes.is_empty())
        .collect()
}

/// Convert text to a flat phoneme stream with a pause between words.
///
/// Empty input yields an empty sequence.
pub fn text_to_phonemes(text: &str) -> Vec<Phoneme> {
    let mut out = Vec::new();
    for (i, word) in text_to_words(text).into_iter().enumerate() {
        if i > 0 {
            out.push(Phoneme::PAUSE);
        }
        out.extend(word.phonemes);
    }
    out
}

/// [`text_to_phonemes`] for optional input; `None` yields an empty sequence.
pub fn text_to_phonemes_opt(text: Option<&str>) -> Vec<Phoneme> {
    text.map(text_to_phonemes).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viseme::is_known_phoneme;

    fn tokens(text: &str) -> Vec<&'static str> {
        text_to_phonemes(text).into_iter().map(Phoneme::as_str).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(text_to_phonemes("").is_empty());
        assert!(text_to_phonemes("   ").is_empty());
        assert!(text_to_phonemes("?!.,").is_empty());
        assert!(text_to_phonemes_opt(None).is_empty());
        assert!(text_to_phonemes_opt(Some("")).is_empty());
    }

    #[test]
    fn test_digraphs_before_letters() {
        assert_eq!(tokens("the"), vec!["th", "eh"]);
        assert_eq!(tokens("ship"), vec!["sh", "ih", "p"]);
        assert_eq!(tokens("sing"), vec!["s", "ih", "ng"]);
        assert_eq!(tokens("oh"), vec!["oh"]);
    }

    #[test]
    fn test_longest_cluster_wins() {
        assert_eq!(tokens("nation"), vec!["n", "aa", "sh", "ah", "n"]);
        assert_eq!(tokens("night"), vec!["n", "ay", "t"]);
        assert_eq!(tokens("match"), vec!["m", "aa", "ch"]);
    }

    #[test]
    fn test_doubled_consonants_collapse() {
        assert_eq!(tokens("hello"), vec!["hh", "eh", "l", "oh"]);
    }

    #[test]
    fn test_pause_between_words_only() {
        let ph = text_to_phonemes("hello world");
        assert_eq!(ph.iter().filter(|p| p.is_pause()).count(), 1);
        assert!(!ph.first().unwrap().is_pause());
        assert!(!ph.last().unwrap().is_pause());
    }

    #[test]
    fn test_punctuation_and_case_stripped() {
        assert_eq!(text_to_phonemes("Hello, World!"), text_to_phonemes("hello world"));
        assert_eq!(text_to_phonemes("it's"), text_to_phonemes("its"));
    }

    #[test]
    fn test_hyphen_is_a_boundary() {
        let words = text_to_words("forty-two");
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "forty");
    }

    #[test]
    fn test_output_within_vocabulary() {
        let text = "The quick brown fox jumps over the lazy dog; \
                    sphinx of black quartz, judge my vow! Xylophone night watch.";
        for p in text_to_phonemes(text) {
            assert!(is_known_phoneme(p.as_str()), "{p} not in vocabulary");
        }
    }

    #[test]
    fn test_deterministic() {
        let a = text_to_phonemes("Deterministic output, every time.");
        let b = text_to_phonemes("Deterministic output, every time.");
        assert_eq!(a, b);
    }

    #[test]
    fn test_phoneme_lookup() {
        assert_eq!(Phoneme::new("th").map(Phoneme::viseme), Some(Viseme::TH));
        assert_eq!(Phoneme::new("nope"), None);
        assert_eq!(Phoneme::PAUSE.viseme(), Viseme::Sil);
    }
}
