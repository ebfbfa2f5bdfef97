//! Engine configuration.
//!
//! Every field has a documented default, so a config file only needs the
//! keys it wants to change:
//!
//! ```json
//! { "transition_speed": 0.5, "words_per_minute": 170 }
//! ```
//!
//! Numeric fields are clamped into their valid ranges after loading rather
//! than rejected; animation parameters are approximate and a clamped value
//! is preferable to a failed utterance.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, VisemeError},
    viseme::Viseme,
};

pub const DEFAULT_TRANSITION_SPEED: f32 = 0.35;
pub const DEFAULT_EPSILON: f32 = 0.001;
pub const DEFAULT_GLOBAL_INTENSITY: f32 = 1.0;
pub const DEFAULT_WORDS_PER_MINUTE: f64 = 150.0;
pub const DEFAULT_PAUSE_DURATION_MS: f64 = 100.0;
pub const DEFAULT_CROSSFADE_MS: f64 = 40.0;

/// Upper bound for the global multiplier; values above 1 exaggerate.
pub const MAX_GLOBAL_INTENSITY: f32 = 2.0;
pub const MIN_WORDS_PER_MINUTE: f64 = 20.0;
pub const MAX_WORDS_PER_MINUTE: f64 = 1000.0;
/// Shortest frame the scheduler emits; keeps timestamps strictly increasing.
pub const MIN_FRAME_MS: f64 = 1.0;
pub const MAX_FRAME_MS: f64 = 10_000.0;

/// Lifts a viseme's primary morph when its influence would be too subtle
/// to read on screen.
///
/// Applied after intensity scaling: if the primary (first-listed) morph
/// resolved and its influence is below `threshold`, it is multiplied by
/// `factor` and clamped.  Fallback morphs are never boosted.
/// The values are hand-tuned for the default morph table and should be
/// re-tuned for other rigs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostRule {
    pub viseme: Viseme,
    pub threshold: f32,
    pub factor: f32,
}

/// Bilabial closure reads poorly at low intensity; lip contact must show.
pub fn default_boost_rules() -> Vec<BoostRule> {
    vec![BoostRule { viseme: Viseme::PP, threshold: 0.5, factor: 1.6 }]
}

/// Tunable engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction of the remaining distance covered per tick, in `(0, 1]`.
    pub transition_speed: f32,
    /// Distance below which `current` snaps to `target`.
    pub epsilon: f32,
    /// Multiplier applied to every influence, in `[0, 2]`.
    pub global_intensity: f32,
    pub words_per_minute: f64,
    pub pause_duration_ms: f64,
    /// Overlap between consecutive frames during playback.
    pub crossfade_ms: f64,
    /// Spell out numbers, symbols and contractions before conversion.
    pub normalize_text: bool,
    pub boost_rules: Vec<BoostRule>,
    /// Starting per-viseme intensities; visemes not listed use the built-in
    /// defaults.
    pub viseme_intensities: BTreeMap<Viseme, f32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transition_speed: DEFAULT_TRANSITION_SPEED,
            epsilon: DEFAULT_EPSILON,
            global_intensity: DEFAULT_GLOBAL_INTENSITY,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            pause_duration_ms: DEFAULT_PAUSE_DURATION_MS,
            crossfade_ms: DEFAULT_CROSSFADE_MS,
            normalize_text: true,
            boost_rules: default_boost_rules(),
            viseme_intensities: BTreeMap::new(),
        }
    }
}

/// Clamp `value` into `[lo, hi]`, logging when it had to move.
/// Non-finite values fall back to `fallback`.
pub(crate) fn clamp_f32(name: &str, value: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        tracing::warn!(%name, value, fallback, "non-finite value replaced");
        return fallback;
    }
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        tracing::warn!(%name, value, clamped, "value clamped");
    }
    clamped
}

pub(crate) fn clamp_f64(name: &str, value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        tracing::warn!(%name, value, fallback, "non-finite value replaced");
        return fallback;
    }
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        tracing::warn!(%name, value, clamped, "value clamped");
    }
    clamped
}

impl EngineConfig {
    /// Return a copy with every numeric field inside its valid range.
    pub fn sanitized(mut self) -> Self {
        self.transition_speed =
            clamp_f32("transition_speed", self.transition_speed, 0.001, 1.0, DEFAULT_TRANSITION_SPEED);
        self.epsilon = clamp_f32("epsilon", self.epsilon, 1e-6, 0.5, DEFAULT_EPSILON);
        self.global_intensity = clamp_f32(
            "global_intensity",
            self.global_intensity,
            0.0,
            MAX_GLOBAL_INTENSITY,
            DEFAULT_GLOBAL_INTENSITY,
        );
        self.words_per_minute = clamp_f64(
            "words_per_minute",
            self.words_per_minute,
            MIN_WORDS_PER_MINUTE,
            MAX_WORDS_PER_MINUTE,
            DEFAULT_WORDS_PER_MINUTE,
        );
        self.pause_duration_ms = clamp_f64(
            "pause_duration_ms",
            self.pause_duration_ms,
            MIN_FRAME_MS,
            MAX_FRAME_MS,
            DEFAULT_PAUSE_DURATION_MS,
        );
        self.crossfade_ms =
            clamp_f64("crossfade_ms", self.crossfade_ms, 0.0, 500.0, DEFAULT_CROSSFADE_MS);
        for rule in &mut self.boost_rules {
            rule.threshold = clamp_f32("boost.threshold", rule.threshold, 0.0, 1.0, 0.0);
            rule.factor = clamp_f32("boost.factor", rule.factor, 1.0, 10.0, 1.0);
        }
        for (viseme, value) in self.viseme_intensities.iter_mut() {
            *value = clamp_f32(viseme.as_str(), *value, 0.0, 1.0, 1.0);
        }
        self
    }

    /// Parse a JSON config; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| VisemeError::Config(e.to_string()))?;
        Ok(config.sanitized())
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{ "words_per_minute": 170 }"#).unwrap();
        assert_eq!(cfg.words_per_minute, 170.0);
        assert_eq!(cfg.transition_speed, DEFAULT_TRANSITION_SPEED);
        assert_eq!(cfg.boost_rules, default_boost_rules());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "transition_speed": 3.0, "pause_duration_ms": -50, "global_intensity": -1 }"#,
        )
        .unwrap();
        assert_eq!(cfg.transition_speed, 1.0);
        assert_eq!(cfg.pause_duration_ms, MIN_FRAME_MS);
        assert_eq!(cfg.global_intensity, 0.0);
    }

    #[test]
    fn test_boost_rule_parses_viseme_name() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "boost_rules": [ { "viseme": "FF", "threshold": 0.4, "factor": 2.0 } ] }"#,
        )
        .unwrap();
        assert_eq!(cfg.boost_rules.len(), 1);
        assert_eq!(cfg.boost_rules[0].viseme, Viseme::FF);
    }

    #[test]
    fn test_viseme_intensities_keyed_by_name() {
        let cfg = EngineConfig::from_json_str(r#"{ "viseme_intensities": { "aa": 0.5, "PP": 3 } }"#)
            .unwrap();
        assert_eq!(cfg.viseme_intensities.get(&Viseme::AA), Some(&0.5));
        assert_eq!(cfg.viseme_intensities.get(&Viseme::PP), Some(&1.0));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, VisemeError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let cfg = EngineConfig { crossfade_ms: 25.0, ..EngineConfig::default() };
        std::fs::write(&path, cfg.to_json_pretty().unwrap()).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), cfg);
    }
}
