//! Timeline playback: which visemes are active at a given time.
//!
//! The caller owns the clock.  Each render tick it asks [`Playback::sample`]
//! for the active visemes at the elapsed time and hands them to the engine.
//! Near the end of a frame the next frame's viseme fades in while the
//! current one fades out, so neighbouring shapes overlap briefly the way
//! real articulation does.

use crate::{schedule::AnimationFrame, viseme::Viseme};

pub struct Playback {
    frames: Vec<AnimationFrame>,
    crossfade_ms: f64,
}

impl Playback {
    pub fn new(frames: Vec<AnimationFrame>, crossfade_ms: f64) -> Self {
        let crossfade_ms = if crossfade_ms.is_finite() { crossfade_ms.max(0.0) } else { 0.0 };
        Self { frames, crossfade_ms }
    }

    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    pub fn total_duration_ms(&self) -> f64 {
        crate::schedule::total_duration_ms(&self.frames)
    }

    pub fn is_finished(&self, t_ms: f64) -> bool {
        t_ms >= self.total_duration_ms()
    }

    /// Index of the frame covering `t_ms`.
    pub fn frame_index_at(&self, t_ms: f64) -> Option<usize> {
        if self.frames.is_empty() || t_ms < 0.0 || self.is_finished(t_ms) {
            return None;
        }
        let after = self.frames.partition_point(|f| f.timestamp_ms <= t_ms);
        after.checked_sub(1)
    }

    pub fn frame_at(&self, t_ms: f64) -> Option<&AnimationFrame> {
        self.frame_index_at(t_ms).map(|i| &self.frames[i])
    }

    /// Active `(viseme, weight)` pairs at `t_ms`.  Empty before the start
    /// and after the end of the timeline.
    pub fn sample(&self, t_ms: f64) -> Vec<(Viseme, f32)> {
        let Some(i) = self.frame_index_at(t_ms) else {
            return Vec::new();
        };
        let frame = &self.frames[i];
        let mut active = vec![(frame.viseme, frame.intensity)];

        let fade = self.crossfade_ms.min(frame.duration_ms / 2.0);
        if let Some(next) = self.frames.get(i + 1) {
            let fade_start = frame.end_ms() - fade;
            if fade > 0.0 && t_ms > fade_start {
                let p = ((t_ms - fade_start) / fade).clamp(0.0, 1.0) as f32;
                active[0].1 *= 1.0 - p;
                active.push((next.viseme, next.intensity * p));
            }
        }
        active
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
