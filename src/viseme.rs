//! Viseme alphabet and the phoneme → viseme classifier.
//!
//! The 15 visemes follow the widely used Oculus/OVR set: one silence class,
//! ten consonant classes grouped by place of articulation and five vowel
//! classes grouped by jaw opening and lip rounding.
//!
//! The phoneme vocabulary is fixed.  Every entry maps to exactly one viseme;
//! anything outside the vocabulary classifies as [`Viseme::Sil`].

use std::{collections::HashMap, fmt, str::FromStr};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Bumped whenever the vocabulary or any authored table changes shape.
pub const TABLE_VERSION: u32 = 1;

/// Canonical viseme identifiers (numeric codes 0–14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Viseme {
    /// Silence / rest pose.
    #[serde(rename = "sil")]
    Sil = 0,
    /// p, b, m: lips pressed together.
    PP = 1,
    /// f, v: lower lip against upper teeth.
    FF = 2,
    /// th, dh: tongue between the teeth.
    TH = 3,
    /// t, d: tongue tip on the alveolar ridge.
    DD = 4,
    /// k, g, ng: back of the tongue raised.
    #[serde(rename = "kk")]
    KK = 5,
    /// ch, jh, sh, zh: lips pushed forward, tongue curved.
    CH = 6,
    /// s, z: teeth close, tongue forward.
    SS = 7,
    /// n, l: tongue tip up, mouth slightly open.
    #[serde(rename = "nn")]
    NN = 8,
    /// r: lips slightly rounded, tongue curled.
    RR = 9,
    /// Open vowels.
    #[serde(rename = "aa")]
    AA = 10,
    /// Mid front vowels.
    E = 11,
    /// Close front vowels.
    I = 12,
    /// Rounded mid vowels.
    O = 13,
    /// Rounded close vowels.
    U = 14,
}

impl Viseme {
    /// All visemes in code order.
    pub const ALL: [Viseme; 15] = [
        Viseme::Sil,
        Viseme::PP,
        Viseme::FF,
        Viseme::TH,
        Viseme::DD,
        Viseme::KK,
        Viseme::CH,
        Viseme::SS,
        Viseme::NN,
        Viseme::RR,
        Viseme::AA,
        Viseme::E,
        Viseme::I,
        Viseme::O,
        Viseme::U,
    ];

    /// Numeric code, 0 for silence through 14 for `U`.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Canonical name (`"sil"`, `"PP"`, `"kk"`, …).
    pub fn as_str(self) -> &'static str {
        match self {
            Viseme::Sil => "sil",
            Viseme::PP => "PP",
            Viseme::FF => "FF",
            Viseme::TH => "TH",
            Viseme::DD => "DD",
            Viseme::KK => "kk",
            Viseme::CH => "CH",
            Viseme::SS => "SS",
            Viseme::NN => "nn",
            Viseme::RR => "RR",
            Viseme::AA => "aa",
            Viseme::E => "E",
            Viseme::I => "I",
            Viseme::O => "O",
            Viseme::U => "U",
        }
    }

    /// Position in [`Viseme::ALL`]; handy for fixed-size per-viseme arrays.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Viseme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returned by [`Viseme::from_str`] for names that are neither a canonical
/// viseme name nor a numeric code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown viseme '{0}'")]
pub struct UnknownViseme(pub String);

impl FromStr for Viseme {
    type Err = UnknownViseme;

    /// Accepts canonical names (exact case first, then case-insensitive) and
    /// numeric codes `"0"`–`"14"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Viseme::from_code(code).ok_or_else(|| UnknownViseme(s.to_string()));
        }
        Viseme::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .or_else(|| Viseme::ALL.iter().find(|v| v.as_str().eq_ignore_ascii_case(s)))
            .copied()
            .ok_or_else(|| UnknownViseme(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phoneme vocabulary → viseme table
// ─────────────────────────────────────────────────────────────────────────────

/// The complete phoneme vocabulary and its viseme classes.
///
/// Tokens are lowercase and ARPABET-flavoured, so externally produced
/// ARPABET phonemes (lowercased, stress digits stripped) classify too.
pub const VISEME_TABLE: &[(&str, Viseme)] = &[
    // silence / pause
    ("sil", Viseme::Sil),
    // bilabials
    ("p", Viseme::PP),
    ("b", Viseme::PP),
    ("m", Viseme::PP),
    // labiodentals
    ("f", Viseme::FF),
    ("v", Viseme::FF),
    // dental fricatives
    ("th", Viseme::TH),
    ("dh", Viseme::TH),
    // alveolar plosives
    ("t", Viseme::DD),
    ("d", Viseme::DD),
    // velars and the glottal
    ("k", Viseme::KK),
    ("g", Viseme::KK),
    ("ng", Viseme::KK),
    ("hh", Viseme::KK),
    // affricates / postalveolars
    ("ch", Viseme::CH),
    ("jh", Viseme::CH),
    ("sh", Viseme::CH),
    ("zh", Viseme::CH),
    // sibilants
    ("s", Viseme::SS),
    ("z", Viseme::SS),
    // nasals and lateral
    ("n", Viseme::NN),
    ("l", Viseme::NN),
    // liquids
    ("r", Viseme::RR),
    ("er", Viseme::RR),
    // open vowels
    ("aa", Viseme::AA),
    ("ae", Viseme::AA),
    ("ah", Viseme::AA),
    ("aw", Viseme::AA),
    ("ay", Viseme::AA),
    // mid front vowels
    ("eh", Viseme::E),
    ("ey", Viseme::E),
    // close front vowels
    ("ih", Viseme::I),
    ("iy", Viseme::I),
    ("y", Viseme::I),
    // rounded mid vowels
    ("ao", Viseme::O),
    ("oh", Viseme::O),
    ("ow", Viseme::O),
    ("oy", Viseme::O),
    // rounded close vowels
    ("uh", Viseme::U),
    ("uw", Viseme::U),
    ("w", Viseme::U),
];

static CLASSES: Lazy<HashMap<&'static str, Viseme>> =
    Lazy::new(|| VISEME_TABLE.iter().copied().collect());

/// Classify a phoneme token.  Unknown tokens map to [`Viseme::Sil`].
pub fn classify(phoneme: &str) -> Viseme {
    CLASSES.get(phoneme).copied().unwrap_or(Viseme::Sil)
}

/// Returns `true` if `phoneme` is part of the fixed vocabulary.
pub fn is_known_phoneme(phoneme: &str) -> bool {
    CLASSES.contains_key(phoneme)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_vocabulary_entry_classifies() {
        for &(ph, expected) in VISEME_TABLE {
            assert_eq!(classify(ph), expected, "phoneme {ph}");
            assert!(Viseme::ALL.contains(&classify(ph)));
        }
    }

    #[test]
    fn test_vocabulary_has_no_duplicates() {
        assert_eq!(CLASSES.len(), VISEME_TABLE.len());
    }

    #[test]
    fn test_unknown_is_silence() {
        for s in ["", "xx", "TH", "qq", "中", " p"] {
            assert_eq!(classify(s), Viseme::Sil, "{s:?}");
        }
    }

    #[test]
    fn test_every_non_silent_viseme_is_reachable() {
        for v in Viseme::ALL {
            assert!(
                VISEME_TABLE.iter().any(|&(_, c)| c == v),
                "no phoneme classifies as {v}"
            );
        }
    }

    #[test]
    fn test_codes_roundtrip() {
        for (i, v) in Viseme::ALL.iter().enumerate() {
            assert_eq!(v.code() as usize, i);
            assert_eq!(Viseme::from_code(i as u8), Some(*v));
        }
        assert_eq!(Viseme::from_code(15), None);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("PP".parse::<Viseme>(), Ok(Viseme::PP));
        assert_eq!("kk".parse::<Viseme>(), Ok(Viseme::KK));
        assert_eq!("KK".parse::<Viseme>(), Ok(Viseme::KK));
        assert_eq!("1".parse::<Viseme>(), Ok(Viseme::PP));
        assert_eq!("14".parse::<Viseme>(), Ok(Viseme::U));
        assert!("15".parse::<Viseme>().is_err());
        assert!("mouth".parse::<Viseme>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        assert_eq!(serde_json::to_string(&Viseme::NN).unwrap(), "\"nn\"");
        assert_eq!(serde_json::to_string(&Viseme::Sil).unwrap(), "\"sil\"");
        let v: Viseme = serde_json::from_str("\"aa\"").unwrap();
        assert_eq!(v, Viseme::AA);
    }
}
