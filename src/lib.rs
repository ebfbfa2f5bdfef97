//! # visemix
//!
//! Text-driven lip sync for morph-target (blend-shape) faces.
//!
//! ## Quick start
//!
//! ```
//! use visemix::{AnimationOptions, EngineConfig, Viseme, VisemeEngine};
//!
//! let mut engine = VisemeEngine::new(EngineConfig::default());
//!
//! // Morph names as exposed by the loaded mesh.
//! let report = engine.load_morph_inventory(["V_Explosive", "V_Open", "Jaw_Open"]);
//! assert!(!report.resolved.is_empty());
//!
//! // Drive a single shape, then tick until it settles.
//! engine.apply_viseme(Viseme::AA, 1.0, false).unwrap();
//! while engine.update().unwrap() == visemix::Phase::Transitioning {}
//!
//! // Or schedule a whole utterance and play it back against your own clock.
//! let frames = engine.create_animation("hello world", &AnimationOptions::default());
//! let playback = engine.playback(frames);
//! engine.play_at(&playback, 120.0).unwrap();
//! engine.update().unwrap();
//! for (morph, value) in engine.drain_changes().unwrap() {
//!     println!("{morph} = {value:.3}");
//! }
//! ```
//!
//! ## Pipeline
//! 1. **Normalisation**: numbers, ordinals, contractions → words.
//! 2. **Phonemes**: letter-cluster rules → ARPAbet-like tokens.
//! 3. **Classification**: phoneme → one of 15 visemes.
//! 4. **Scheduling**: words-per-minute timing → [`AnimationFrame`]s.
//! 5. **Resolution**: authored morph names → names on the loaded asset.
//! 6. **Blending**: active visemes → per-morph target influences.
//! 7. **Interpolation**: per-tick easing of current toward target.

// C FFI for native hosts: engine handle, inventory load, apply, tick, read.
pub mod ffi;

pub mod blend;
pub mod config;
pub mod engine;
pub mod error;
pub mod interpolate;
pub mod normalize;
pub mod phonemes;
pub mod playback;
pub mod profile;
pub mod resolver;
pub mod schedule;
pub mod viseme;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use blend::{MorphInfluence, MorphTable, VisemeIntensities};
pub use config::EngineConfig;
pub use engine::VisemeEngine;
pub use error::{Result, VisemeError};
pub use interpolate::Phase;
pub use playback::Playback;
pub use profile::Profile;
pub use resolver::{MorphResolver, ResolutionReport};
pub use schedule::{AnimationFrame, AnimationOptions};
pub use viseme::Viseme;
