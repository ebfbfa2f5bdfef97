//! Per-tick interpolation of morph influences.
//!
//! The host calls [`InfluenceState::step`] once per render tick; nothing
//! here runs on its own timer.  Each step moves `current` a fixed fraction
//! of the way toward `target` and snaps once the gap is below `epsilon`.
//!
//! Writes are explicit: every setter marks the morphs it touched, and
//! [`InfluenceState::drain_changes`] hands the renderer exactly the values
//! that changed since its last sync.

use std::collections::HashMap;

use serde::Serialize;

use crate::blend::{sanitize_unit, MorphInfluence};

/// Interpolation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Every morph sits at its target.
    Idle,
    /// At least one morph is still moving.
    Transitioning,
}

/// Current and target influence for every morph of the loaded asset.
#[derive(Debug, Clone)]
pub struct InfluenceState {
    names: Vec<String>,
    positions: HashMap<String, usize>,
    current: Vec<f32>,
    target: Vec<f32>,
    dirty: Vec<bool>,
}

impl InfluenceState {
    /// All-zero state over `names` (inventory order).
    pub fn new(names: &[String]) -> Self {
        let positions = names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
        Self {
            names: names.to_vec(),
            positions,
            current: vec![0.0; names.len()],
            target: vec![0.0; names.len()],
            dirty: vec![false; names.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn current(&self, name: &str) -> Option<f32> {
        self.positions.get(name).map(|&i| self.current[i])
    }

    pub fn target(&self, name: &str) -> Option<f32> {
        self.positions.get(name).map(|&i| self.target[i])
    }

    /// Replace the whole target vector: listed morphs get their influence,
    /// every other morph targets zero.  Unknown names are skipped.
    pub fn set_targets(&mut self, influences: &[MorphInfluence]) {
        self.target.iter_mut().for_each(|t| *t = 0.0);
        for inf in influences {
            match self.positions.get(&inf.morph) {
                Some(&i) => self.target[i] = sanitize_unit(inf.influence),
                None => tracing::debug!(morph = %inf.morph, "skipping influence for unknown morph"),
            }
        }
    }

    /// Set one morph's current *and* target value.  Returns `false` for a
    /// name the asset does not have.
    pub fn set_influence(&mut self, name: &str, value: f32) -> bool {
        let Some(&i) = self.positions.get(name) else {
            return false;
        };
        let value = sanitize_unit(value);
        self.target[i] = value;
        if self.current[i] != value {
            self.current[i] = value;
            self.dirty[i] = true;
        }
        true
    }

    /// Jump every morph straight to its target.
    pub fn snap(&mut self) {
        for i in 0..self.current.len() {
            if self.current[i] != self.target[i] {
                self.current[i] = self.target[i];
                self.dirty[i] = true;
            }
        }
    }

    /// Target zero everywhere; the next steps ease back to rest.
    pub fn reset(&mut self) {
        self.target.iter_mut().for_each(|t| *t = 0.0);
    }

    pub fn phase(&self) -> Phase {
        if self.current == self.target {
            Phase::Idle
        } else {
            Phase::Transitioning
        }
    }

    /// One tick: `current += (target - current) × speed`, snapping within
    /// `epsilon`.
    pub fn step(&mut self, speed: f32, epsilon: f32) -> Phase {
        for i in 0..self.current.len() {
            let (cur, tgt) = (self.current[i], self.target[i]);
            if cur == tgt {
                continue;
            }
            let mut next = cur + (tgt - cur) * speed;
            // A step too small to change an f32 would never arrive.
            if next == cur || (next - tgt).abs() < epsilon {
                next = tgt;
            }
            self.current[i] = next.clamp(0.0, 1.0);
            self.dirty[i] = true;
        }
        self.phase()
    }

    /// `(morph, current)` for every morph, zeros included, in inventory order.
    pub fn values(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.names.iter().map(String::as_str).zip(self.current.iter().copied())
    }

    /// Values changed since the previous call.
    pub fn drain_changes(&mut self) -> Vec<(String, f32)> {
        let mut out = Vec::new();
        for (i, dirty) in self.dirty.iter_mut().enumerate() {
            if std::mem::take(dirty) {
                out.push((self.names[i].clone(), self.current[i]));
            }
        }
        out
    }
}

/// Upper bound on the ticks needed to close a gap of `distance` at `speed`
/// before snapping at `epsilon`.
pub fn max_ticks_to_converge(distance: f32, speed: f32, epsilon: f32) -> usize {
    if distance < epsilon || speed >= 1.0 {
        return 1;
    }
    let ticks = ((epsilon / distance).ln() / (1.0 - speed).ln()).ceil();
    ticks.max(1.0) as usize + 1
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> InfluenceState {
        InfluenceState::new(&["A".to_string(), "B".to_string(), "C".to_string()])
    }

    fn inf(morph: &str, influence: f32) -> MorphInfluence {
        MorphInfluence { morph: morph.to_string(), influence }
    }

    #[test]
    fn test_starts_idle_at_zero() {
        let s = state();
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.values().all(|(_, v)| v == 0.0));
    }

    #[test]
    fn test_converges_within_bound() {
        let (speed, eps) = (0.3, 0.001);
        let mut s = state();
        s.set_targets(&[inf("A", 1.0), inf("B", 0.4)]);
        assert_eq!(s.phase(), Phase::Transitioning);

        let bound = max_ticks_to_converge(1.0, speed, eps);
        let mut ticks = 0;
        while s.step(speed, eps) == Phase::Transitioning {
            ticks += 1;
            assert!(ticks <= bound, "not converged after {ticks} ticks");
        }
        assert_eq!(s.current("A"), Some(1.0));
        assert_eq!(s.current("B"), Some(0.4));
        assert_eq!(s.current("C"), Some(0.0));
    }

    #[test]
    fn test_slowest_speed_tightest_epsilon_still_converges() {
        let (speed, eps) = (0.001, 1e-6);
        let mut s = state();
        s.set_targets(&[inf("A", 1.0)]);

        let bound = max_ticks_to_converge(1.0, speed, eps);
        let mut ticks = 0;
        while s.step(speed, eps) == Phase::Transitioning {
            ticks += 1;
            assert!(ticks <= bound, "not converged after {ticks} ticks");
        }
        assert_eq!(s.current("A"), Some(1.0));

        s.set_targets(&[]);
        let mut ticks = 0;
        while s.step(speed, eps) == Phase::Transitioning {
            ticks += 1;
            assert!(ticks <= bound, "not back at rest after {ticks} ticks");
        }
        assert_eq!(s.current("A"), Some(0.0));
    }

    #[test]
    fn test_moves_monotonically_toward_target() {
        let mut s = state();
        s.set_targets(&[inf("A", 1.0)]);
        let mut last = 0.0;
        for _ in 0..5 {
            s.step(0.25, 0.001);
            let now = s.current("A").unwrap();
            assert!(now > last && now <= 1.0);
            last = now;
        }
    }

    #[test]
    fn test_snap_is_immediate() {
        let mut s = state();
        s.set_targets(&[inf("B", 0.7)]);
        s.snap();
        assert_eq!(s.current("B"), Some(0.7));
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn test_set_targets_zeroes_unlisted_and_skips_unknown() {
        let mut s = state();
        s.set_targets(&[inf("A", 1.0), inf("C", 1.0)]);
        s.set_targets(&[inf("A", 0.5), inf("Missing", 1.0)]);
        assert_eq!(s.target("A"), Some(0.5));
        assert_eq!(s.target("C"), Some(0.0));
        assert_eq!(s.target("Missing"), None);
    }

    #[test]
    fn test_reset_eases_back_to_rest() {
        let mut s = state();
        s.set_targets(&[inf("A", 1.0)]);
        s.snap();
        s.reset();
        assert_eq!(s.phase(), Phase::Transitioning);
        for _ in 0..max_ticks_to_converge(1.0, 0.5, 0.001) {
            s.step(0.5, 0.001);
        }
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.current("A"), Some(0.0));
    }

    #[test]
    fn test_drain_changes() {
        let mut s = state();
        assert!(s.set_influence("B", 0.25));
        assert!(!s.set_influence("Z", 0.25));
        assert_eq!(s.drain_changes(), vec![("B".to_string(), 0.25)]);
        assert!(s.drain_changes().is_empty());

        s.set_targets(&[inf("A", 1.0)]);
        s.step(1.0, 0.001);
        let changed: Vec<String> = s.drain_changes().into_iter().map(|(n, _)| n).collect();
        assert_eq!(changed, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_full_speed_is_one_tick() {
        let mut s = state();
        s.set_targets(&[inf("A", 0.9)]);
        assert_eq!(s.step(1.0, 0.001), Phase::Idle);
    }
}
