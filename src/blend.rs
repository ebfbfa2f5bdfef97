//! Viseme → morph-influence blending.
//!
//! Each viseme drives a short weighted list of morph targets.  For one
//! active viseme the influence of a morph is
//!
//! ```text
//! weight × viseme_intensity × global_intensity × call_intensity   (clamped to [0, 1])
//! ```
//!
//! When several visemes are active at once (cross-fades, coarticulation)
//! their contributions to the same morph are **summed** and then clamped.
//! Averaging would flatten emphasis whenever two shapes share a morph.

use serde::Serialize;

use crate::{
    config::BoostRule,
    resolver::ResolvedMapping,
    viseme::Viseme,
};

// ─────────────────────────────────────────────────────────────────────────────
// Authored morph table
// ─────────────────────────────────────────────────────────────────────────────

/// Authored, asset-agnostic viseme → `(expected morph, weight)` table.
///
/// The first entry of each list is the viseme's primary morph; only that
/// morph, once resolved, is eligible for a boost rule.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTable {
    entries: Vec<(Viseme, Vec<(String, f32)>)>,
}

/// Default table, written against Character Creator style `V_*` names.
/// Other rigs are reached through the resolver.
const DEFAULT_TABLE: &[(Viseme, &[(&str, f32)])] = &[
    (Viseme::Sil, &[]),
    (Viseme::PP, &[("V_Explosive", 1.0), ("Mouth_Press_L", 0.3), ("Mouth_Press_R", 0.3)]),
    (Viseme::FF, &[("V_Dental_Lip", 1.0)]),
    (Viseme::TH, &[("V_Tongue_Out", 1.0), ("V_Open", 0.2)]),
    (Viseme::DD, &[("V_Tongue_Raise", 0.8), ("V_Open", 0.3)]),
    (Viseme::KK, &[("V_Open", 0.5), ("V_Wide", 0.2)]),
    (Viseme::CH, &[("V_Affricate", 1.0)]),
    (Viseme::SS, &[("V_Lip_Open", 0.8), ("V_Wide", 0.3)]),
    (Viseme::NN, &[("V_Tongue_Raise", 0.7), ("V_Open", 0.2)]),
    (Viseme::RR, &[("V_Tongue_Curl_U", 0.6), ("V_Tight_O", 0.5)]),
    (Viseme::AA, &[("V_Open", 1.0), ("Jaw_Open", 0.4)]),
    (Viseme::E, &[("V_Wide", 0.6), ("V_Open", 0.5)]),
    (Viseme::I, &[("V_Wide", 1.0), ("V_Open", 0.2)]),
    (Viseme::O, &[("V_Tight_O", 1.0), ("V_Open", 0.4)]),
    (Viseme::U, &[("V_Tight", 1.0)]),
];

impl Default for MorphTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_TABLE
                .iter()
                .map(|(v, list)| (*v, list.iter().map(|(n, w)| (n.to_string(), *w)).collect())),
        )
    }
}

impl MorphTable {
    /// Build a table.  Weights are clamped to `(0, 1]`; entries with a
    /// non-positive weight are dropped since they could never contribute.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Viseme, Vec<(String, f32)>)>,
    {
        let entries = entries
            .into_iter()
            .map(|(v, list)| {
                let list = list
                    .into_iter()
                    .filter(|(_, w)| w.is_finite() && *w > 0.0)
                    .map(|(n, w)| (n, w.min(1.0)))
                    .collect();
                (v, list)
            })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Viseme, &[(String, f32)])> + '_ {
        self.entries.iter().map(|(v, list)| (*v, list.as_slice()))
    }

    pub fn get(&self, viseme: Viseme) -> &[(String, f32)] {
        self.entries
            .iter()
            .find(|(v, _)| *v == viseme)
            .map(|(_, list)| list.as_slice())
            .unwrap_or(&[])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-viseme intensities
// ─────────────────────────────────────────────────────────────────────────────

/// Default per-viseme intensity, indexed by viseme code.
pub const DEFAULT_VISEME_INTENSITIES: [f32; 15] = [
    0.0, // sil
    1.0, // PP
    0.9, // FF
    0.8, // TH
    0.8, // DD
    0.7, // kk
    0.9, // CH
    0.8, // SS
    0.8, // nn
    0.8, // RR
    1.0, // aa
    0.9, // E
    0.9, // I
    1.0, // O
    1.0, // U
];

/// Per-viseme intensity multipliers in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisemeIntensities([f32; 15]);

impl Default for VisemeIntensities {
    fn default() -> Self {
        Self(DEFAULT_VISEME_INTENSITIES)
    }
}

impl VisemeIntensities {
    pub fn get(&self, viseme: Viseme) -> f32 {
        self.0[viseme.index()]
    }

    /// Set one multiplier, clamped into `[0, 1]`.
    pub fn set(&mut self, viseme: Viseme, value: f32) {
        let value = crate::config::clamp_f32(
            viseme.as_str(),
            value,
            0.0,
            1.0,
            DEFAULT_VISEME_INTENSITIES[viseme.index()],
        );
        self.0[viseme.index()] = value;
    }

    pub fn reset(&mut self, viseme: Viseme) {
        self.0[viseme.index()] = DEFAULT_VISEME_INTENSITIES[viseme.index()];
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Viseme, f32)> + '_ {
        Viseme::ALL.iter().map(move |&v| (v, self.get(v)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blender
// ─────────────────────────────────────────────────────────────────────────────

/// One morph and the influence to apply to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MorphInfluence {
    pub morph: String,
    pub influence: f32,
}

/// Stateless blend step over a resolved mapping.
pub struct Blender<'a> {
    mapping: &'a ResolvedMapping,
    intensities: &'a VisemeIntensities,
    global_intensity: f32,
    boost_rules: &'a [BoostRule],
}

impl<'a> Blender<'a> {
    pub fn new(
        mapping: &'a ResolvedMapping,
        intensities: &'a VisemeIntensities,
        global_intensity: f32,
        boost_rules: &'a [BoostRule],
    ) -> Self {
        Self { mapping, intensities, global_intensity, boost_rules }
    }

    /// Influences for a single viseme.  Only resolved morphs appear.
    pub fn viseme_influences(&self, viseme: Viseme, intensity: f32) -> Vec<MorphInfluence> {
        let scale = self.intensities.get(viseme)
            * self.global_intensity
            * sanitize_unit(intensity);
        let boost = self.boost_rules.iter().find(|r| r.viseme == viseme);

        self.mapping
            .get(viseme)
            .iter()
            .map(|m| {
                let mut influence = (m.weight * scale).clamp(0.0, 1.0);
                if let Some(rule) = boost {
                    if m.primary && influence > 0.0 && influence < rule.threshold {
                        influence = (influence * rule.factor).min(1.0);
                    }
                }
                MorphInfluence { morph: m.name.clone(), influence }
            })
            .collect()
    }

    /// Combine several active visemes: per-morph sum, then clamp.
    ///
    /// Output order is the order in which morphs are first touched.
    pub fn blend(&self, active: &[(Viseme, f32)]) -> Vec<MorphInfluence> {
        let mut out: Vec<MorphInfluence> = Vec::new();
        for &(viseme, intensity) in active {
            for inf in self.viseme_influences(viseme, intensity) {
                match out.iter_mut().find(|o| o.morph == inf.morph) {
                    Some(existing) => existing.influence += inf.influence,
                    None => out.push(inf),
                }
            }
        }
        for o in &mut out {
            o.influence = o.influence.clamp(0.0, 1.0);
        }
        out
    }
}

/// Clamp a caller-supplied intensity into `[0, 1]`; NaN counts as 0.
pub(crate) fn sanitize_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::default_boost_rules,
        resolver::{AssetBinding, MorphResolver},
    };

    const RIG: &[&str] = &[
        "V_Explosive", "V_Dental_Lip", "V_Tongue_Out", "V_Tongue_Raise", "V_Open", "V_Wide",
        "V_Affricate", "V_Lip_Open", "V_Tongue_Curl_U", "V_Tight_O", "V_Tight", "Jaw_Open",
    ];

    fn binding() -> AssetBinding {
        AssetBinding::build(RIG.iter().copied(), &MorphTable::default(), &MorphResolver::new())
    }

    fn value(out: &[MorphInfluence], morph: &str) -> Option<f32> {
        out.iter().find(|m| m.morph == morph).map(|m| m.influence)
    }

    #[test]
    fn test_default_table_covers_every_viseme() {
        let table = MorphTable::default();
        for v in Viseme::ALL {
            if v != Viseme::Sil {
                assert!(!table.get(v).is_empty(), "{v} has no morphs");
            }
        }
    }

    #[test]
    fn test_table_drops_non_positive_weights() {
        let table = MorphTable::new([(
            Viseme::AA,
            vec![("A".to_string(), 0.0), ("B".to_string(), 1.5), ("C".to_string(), -1.0)],
        )]);
        assert_eq!(table.get(Viseme::AA), &[("B".to_string(), 1.0)]);
    }

    #[test]
    fn test_single_viseme_formula() {
        let b = binding();
        let mut intensities = VisemeIntensities::default();
        intensities.set(Viseme::AA, 0.5);
        let blender = Blender::new(b.mapping(), &intensities, 0.8, &[]);
        let out = blender.viseme_influences(Viseme::AA, 1.0);
        assert!((value(&out, "V_Open").unwrap() - 0.4).abs() < 1e-6);
        assert!((value(&out, "Jaw_Open").unwrap() - 0.16).abs() < 1e-6);
    }

    #[test]
    fn test_unresolved_morphs_are_absent() {
        // PP's press morphs are not on the rig.
        let b = binding();
        let intensities = VisemeIntensities::default();
        let blender = Blender::new(b.mapping(), &intensities, 1.0, &[]);
        let out = blender.viseme_influences(Viseme::PP, 1.0);
        assert_eq!(out.len(), 1);
        assert_eq!(value(&out, "Mouth_Press_L"), None);
    }

    #[test]
    fn test_boost_lifts_subtle_primary_only() {
        let b = binding();
        let intensities = VisemeIntensities::default();
        let rules = default_boost_rules();
        let blender = Blender::new(b.mapping(), &intensities, 1.0, &rules);

        // 0.25 < 0.5 threshold → ×1.6
        let low = blender.viseme_influences(Viseme::PP, 0.25);
        assert!((value(&low, "V_Explosive").unwrap() - 0.4).abs() < 1e-6);

        // Above threshold: untouched.
        let high = blender.viseme_influences(Viseme::PP, 0.8);
        assert!((value(&high, "V_Explosive").unwrap() - 0.8).abs() < 1e-6);

        // Other visemes are never boosted.
        let aa = blender.viseme_influences(Viseme::AA, 0.25);
        assert!((value(&aa, "V_Open").unwrap() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_boost_skips_fallback_when_primary_missing() {
        let table = MorphTable::new([(
            Viseme::PP,
            vec![("Lips_Closed".to_string(), 1.0), ("Press_Left".to_string(), 0.3)],
        )]);
        let b = AssetBinding::build(["Press_Left"], &table, &MorphResolver::new());
        let intensities = VisemeIntensities::default();
        let rules = default_boost_rules();
        let blender = Blender::new(b.mapping(), &intensities, 1.0, &rules);

        // 0.3 × 0.25 is under the threshold but the morph is a fallback.
        let low = blender.viseme_influences(Viseme::PP, 0.25);
        assert!((value(&low, "Press_Left").unwrap() - 0.075).abs() < 1e-6);
    }

    #[test]
    fn test_blend_sums_then_clamps() {
        let b = binding();
        let intensities = VisemeIntensities::default();
        let blender = Blender::new(b.mapping(), &intensities, 1.0, &[]);

        // aa drives V_Open at 1.0, O at 0.4 → clamped at 1.0, not averaged.
        let out = blender.blend(&[(Viseme::AA, 1.0), (Viseme::O, 1.0)]);
        assert_eq!(value(&out, "V_Open"), Some(1.0));
        assert_eq!(value(&out, "V_Tight_O"), Some(1.0));

        // Two half-strength contributions add up.
        let out = blender.blend(&[(Viseme::AA, 0.2), (Viseme::O, 0.5)]);
        let expected = 1.0 * 0.2 + 0.4 * 0.5;
        assert!((value(&out, "V_Open").unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_intensity_is_clamped() {
        let b = binding();
        let intensities = VisemeIntensities::default();
        let blender = Blender::new(b.mapping(), &intensities, 1.0, &[]);
        assert_eq!(
            blender.viseme_influences(Viseme::U, 7.0),
            blender.viseme_influences(Viseme::U, 1.0)
        );
        assert_eq!(value(&blender.viseme_influences(Viseme::U, -1.0), "V_Tight"), Some(0.0));
        assert_eq!(value(&blender.viseme_influences(Viseme::U, f32::NAN), "V_Tight"), Some(0.0));
    }

    #[test]
    fn test_intensities_set_and_reset() {
        let mut i = VisemeIntensities::default();
        i.set(Viseme::E, 2.0);
        assert_eq!(i.get(Viseme::E), 1.0);
        i.set(Viseme::E, 0.3);
        i.set(Viseme::I, 0.1);
        i.reset(Viseme::E);
        assert_eq!(i.get(Viseme::E), DEFAULT_VISEME_INTENSITIES[Viseme::E.code() as usize]);
        assert_eq!(i.get(Viseme::I), 0.1);
        i.reset_all();
        assert_eq!(i, VisemeIntensities::default());
    }
}
