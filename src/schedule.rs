//! Utterance scheduling: phonemes → timed animation frames.
//!
//! Timing model:
//! - `ms_per_word = 60000 / words_per_minute`;
//! - each phoneme of a word gets an equal share of `ms_per_word`, unless a
//!   fixed `duration_ms` is given, in which case every phoneme frame lasts
//!   exactly that long;
//! - a pause frame (`sil`, no word) of `pause_duration_ms` sits between
//!   consecutive words;
//! - `timestamp_ms` is the running sum of the preceding durations, starting
//!   at 0.

use serde::{Deserialize, Serialize};

use crate::{
    blend::sanitize_unit,
    config::{
        clamp_f64, EngineConfig, MAX_FRAME_MS, MAX_WORDS_PER_MINUTE, MIN_FRAME_MS,
        MIN_WORDS_PER_MINUTE,
    },
    normalize::normalize,
    phonemes::{text_to_words, Phoneme, Word},
    viseme::Viseme,
};

/// One scheduled mouth shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationFrame {
    pub viseme: Viseme,
    /// `None` for pause frames.
    pub phoneme: Option<Phoneme>,
    pub timestamp_ms: f64,
    pub duration_ms: f64,
    pub intensity: f32,
    /// The word this frame belongs to; `None` for pauses.
    pub word: Option<String>,
}

impl AnimationFrame {
    pub fn end_ms(&self) -> f64 {
        self.timestamp_ms + self.duration_ms
    }

    pub fn is_pause(&self) -> bool {
        self.phoneme.is_none()
    }
}

/// Per-utterance overrides; unset fields come from [`EngineConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationOptions {
    /// Fixed duration for every phoneme frame.
    pub duration_ms: Option<f64>,
    pub intensity: Option<f32>,
    pub words_per_minute: Option<f64>,
    pub pause_duration_ms: Option<f64>,
}

/// Options after defaults and clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub ms_per_word: f64,
    pub fixed_duration_ms: Option<f64>,
    pub pause_duration_ms: f64,
    pub intensity: f32,
}

impl AnimationOptions {
    pub fn timing(&self, config: &EngineConfig) -> Timing {
        let wpm = clamp_f64(
            "words_per_minute",
            self.words_per_minute.unwrap_or(config.words_per_minute),
            MIN_WORDS_PER_MINUTE,
            MAX_WORDS_PER_MINUTE,
            config.words_per_minute,
        );
        let pause = clamp_f64(
            "pause_duration_ms",
            self.pause_duration_ms.unwrap_or(config.pause_duration_ms),
            MIN_FRAME_MS,
            MAX_FRAME_MS,
            config.pause_duration_ms,
        );
        let fixed = self
            .duration_ms
            .map(|d| clamp_f64("duration_ms", d, MIN_FRAME_MS, MAX_FRAME_MS, MIN_FRAME_MS));
        Timing {
            ms_per_word: 60_000.0 / wpm,
            fixed_duration_ms: fixed,
            pause_duration_ms: pause,
            intensity: sanitize_unit(self.intensity.unwrap_or(1.0)),
        }
    }
}

/// Schedule already-converted words.
pub fn schedule_words(words: &[Word], timing: &Timing) -> Vec<AnimationFrame> {
    let mut frames = Vec::new();
    let mut t = 0.0;

    for (wi, word) in words.iter().enumerate() {
        if word.phonemes.is_empty() {
            continue;
        }
        if wi > 0 && !frames.is_empty() {
            frames.push(AnimationFrame {
                viseme: Viseme::Sil,
                phoneme: None,
                timestamp_ms: t,
                duration_ms: timing.pause_duration_ms,
                intensity: 0.0,
                word: None,
            });
            t += timing.pause_duration_ms;
        }

        let share = timing
            .fixed_duration_ms
            .unwrap_or(timing.ms_per_word / word.phonemes.len() as f64)
            .max(MIN_FRAME_MS);
        for &ph in &word.phonemes {
            frames.push(AnimationFrame {
                viseme: ph.viseme(),
                phoneme: Some(ph),
                timestamp_ms: t,
                duration_ms: share,
                intensity: timing.intensity,
                word: Some(word.text.clone()),
            });
            t += share;
        }
    }
    frames
}

/// Schedule a flat phoneme stream; [`Phoneme::PAUSE`] tokens split words.
/// Frames carry no word text since the stream does not have it.
pub fn schedule_phonemes(phonemes: &[Phoneme], timing: &Timing) -> Vec<AnimationFrame> {
    let words: Vec<Word> = phonemes
        .split(|p| p.is_pause())
        .filter(|w| !w.is_empty())
        .map(|w| Word { text: String::new(), phonemes: w.to_vec() })
        .collect();
    let mut frames = schedule_words(&words, timing);
    for f in &mut frames {
        if f.word.as_deref() == Some("") {
            f.word = None;
        }
    }
    frames
}

/// Text → frames, optionally normalising the text first.
pub fn create_animation(
    text: &str,
    options: &AnimationOptions,
    config: &EngineConfig,
) -> Vec<AnimationFrame> {
    let text = if config.normalize_text { normalize(text) } else { text.to_string() };
    let words = text_to_words(&text);
    let frames = schedule_words(&words, &options.timing(config));
    tracing::debug!(words = words.len(), frames = frames.len(), "scheduled utterance");
    frames
}

/// End time of the last frame, 0 for an empty timeline.
pub fn total_duration_ms(frames: &[AnimationFrame]) -> f64 {
    frames.last().map(AnimationFrame::end_ms).unwrap_or(0.0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
