//! Spoken-form text normalisation.
//!
//! The phoneme converter only understands letters, so anything the speaker
//! would *say* but that is not spelled out (numbers, `%`, `&`, ordinals,
//! contractions) is expanded to words first.  Without this step "42" would
//! be stripped and the mouth would stay shut while the audio says
//! "forty-two".

use fancy_regex::{Captures, Regex};
use once_cell::sync::Lazy;

// ─────────────────────────────────────────────────────────────────────────────
// Number → words
// ─────────────────────────────────────────────────────────────────────────────

const ONES: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    "ten", "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen",
    "seventeen", "eighteen", "nineteen",
];
const TENS: &[&str] = &["", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety"];
const SCALES: &[(u64, &str)] = &[
    (1_000_000_000_000_000_000, "quintillion"),
    (1_000_000_000_000_000, "quadrillion"),
    (1_000_000_000_000, "trillion"),
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
];

fn below_thousand(n: u64, out: &mut Vec<String>) {
    let hundreds = n / 100;
    let rest = n % 100;
    if hundreds > 0 {
        out.push(format!("{} hundred", ONES[hundreds as usize]));
    }
    match rest {
        0 => {}
        1..=19 => out.push(ONES[rest as usize].to_string()),
        _ if rest % 10 == 0 => out.push(TENS[(rest / 10) as usize].to_string()),
        _ => out.push(format!("{}-{}", TENS[(rest / 10) as usize], ONES[(rest % 10) as usize])),
    }
}

/// Spell out an integer in English words.
pub fn number_to_words(n: i64) -> String {
    if n < 0 {
        return format!("minus {}", unsigned_to_words(n.unsigned_abs()));
    }
    unsigned_to_words(n as u64)
}

fn unsigned_to_words(mut n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }
    let mut parts = Vec::new();
    for &(scale, name) in SCALES {
        if n >= scale {
            below_thousand(n / scale % 1000, &mut parts);
            parts.push(name.to_string());
            n %= scale;
        }
    }
    below_thousand(n, &mut parts);
    parts.join(" ")
}

/// Spell out a decimal string, reading fractional digits one by one
/// (`"3.14"` → `"three point one four"`).
pub fn decimal_to_words(value: &str) -> String {
    let (int_part, frac_part) = value.split_once('.').unwrap_or((value, ""));
    let int_words = if int_part.is_empty() || int_part == "-" {
        ONES[0].to_string()
    } else {
        number_to_words(int_part.parse().unwrap_or(0))
    };
    let int_words = if int_part == "-" { format!("minus {int_words}") } else { int_words };
    if frac_part.is_empty() {
        return int_words;
    }
    let digits: Vec<&str> = frac_part
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| ONES[d as usize])
        .collect();
    format!("{} point {}", int_words, digits.join(" "))
}

fn ordinal_words(n: i64) -> String {
    let words = number_to_words(n);
    let split = words.rfind(['-', ' ']).map(|i| i + 1).unwrap_or(0);
    let (head, last) = words.split_at(split);
    let last = match last {
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        w if w.ends_with('y') => format!("{}ieth", &w[..w.len() - 1]),
        w => format!("{w}th"),
    };
    format!("{head}{last}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Compiled patterns
// ─────────────────────────────────────────────────────────────────────────────

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());
static RE_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d+)(st|nd|rd|th)\b").unwrap());
static RE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*%").unwrap());
static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?<![\w.])-?\d[\d,]*(?:\.\d+)?(?![\w])").unwrap());
static RE_CANT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcan't\b").unwrap());
static RE_WONT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bwon't\b").unwrap());
static RE_CONTRACTION_NT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\w+)n't\b").unwrap());
static RE_CONTRACTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\w+)'re\b").unwrap());
static RE_CONTRACTION_LL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\w+)'ll\b").unwrap());
static RE_CONTRACTION_VE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\w+)'ve\b").unwrap());
static RE_CONTRACTION_M: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(i)'m\b").unwrap());

fn spell_number(raw: &str) -> String {
    let raw = raw.replace(',', "");
    if raw.contains('.') {
        decimal_to_words(&raw)
    } else {
        raw.parse::<i64>().map(number_to_words).unwrap_or(raw)
    }
}

pub fn remove_urls(text: &str) -> String {
    RE_URL.replace_all(text, " ").into_owned()
}

pub fn expand_ordinals(text: &str) -> String {
    RE_ORDINAL
        .replace_all(text, |caps: &Captures| match caps[1].parse::<i64>() {
            Ok(n) => ordinal_words(n),
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

pub fn expand_percentages(text: &str) -> String {
    RE_PERCENT
        .replace_all(text, |caps: &Captures| format!("{} percent", spell_number(&caps[1])))
        .into_owned()
}

pub fn expand_numbers(text: &str) -> String {
    RE_NUMBER
        .replace_all(text, |caps: &Captures| spell_number(&caps[0]))
        .into_owned()
}

pub fn expand_contractions(text: &str) -> String {
    let text = text.replace('\u{2019}', "'");
    let text = RE_CANT.replace_all(&text, "can not").into_owned();
    let text = RE_WONT.replace_all(&text, "will not").into_owned();
    let text = RE_CONTRACTION_NT.replace_all(&text, "$1 not").into_owned();
    let text = RE_CONTRACTION_RE.replace_all(&text, "$1 are").into_owned();
    let text = RE_CONTRACTION_LL.replace_all(&text, "$1 will").into_owned();
    let text = RE_CONTRACTION_VE.replace_all(&text, "$1 have").into_owned();
    RE_CONTRACTION_M.replace_all(&text, "$1 am").into_owned()
}

pub fn expand_symbols(text: &str) -> String {
    text.replace('&', " and ").replace('+', " plus ").replace('@', " at ")
}

/// Full normalisation pass, in dependency order: URLs go first so their
/// digits are not spelled out; percentages and ordinals before bare numbers.
pub fn normalize(text: &str) -> String {
    let text = remove_urls(text);
    let text = expand_contractions(&text);
    let text = expand_symbols(&text);
    let text = expand_percentages(&text);
    let text = expand_ordinals(&text);
    expand_numbers(&text)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
