//! Tuning profiles: a serialisable snapshot of the resolved mapping and the
//! per-viseme intensities.
//!
//! ```json
//! {
//!   "version": 1,
//!   "resolvedVisemeMappings": { "PP": [ { "morph": "V_Explosive", "weight": 1.0 } ] },
//!   "visemeIntensities": { "PP": 0.9, "aa": 1.0 }
//! }
//! ```
//!
//! Import is all-or-nothing: [`Profile::validate`] checks every entry
//! against the loaded asset first, and nothing is applied unless the whole
//! profile passes.

use std::{collections::BTreeMap, fs::File, io::{BufReader, BufWriter}, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    blend::VisemeIntensities,
    error::{Result, VisemeError},
    resolver::{MorphNameIndex, ResolvedMapping, ResolvedMorph},
    viseme::Viseme,
};

pub const PROFILE_VERSION: u32 = 1;

fn profile_version() -> u32 {
    PROFILE_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileMorph {
    pub morph: String,
    pub weight: f32,
    /// Eligible for the viseme's boost rule.
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Profile {
    #[serde(default = "profile_version")]
    pub version: u32,
    #[serde(default)]
    pub resolved_viseme_mappings: BTreeMap<String, Vec<ProfileMorph>>,
    #[serde(default)]
    pub viseme_intensities: BTreeMap<String, f32>,
}

/// A profile that passed validation against a specific asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedProfile {
    pub mappings: Vec<(Viseme, Vec<ResolvedMorph>)>,
    pub intensities: Vec<(Viseme, f32)>,
}

fn invalid(msg: String) -> VisemeError {
    VisemeError::InvalidProfile(msg)
}

fn parse_viseme(key: &str) -> Result<Viseme> {
    key.parse::<Viseme>().map_err(|e| invalid(e.to_string()))
}

impl Profile {
    /// Snapshot the current tuning.
    pub fn capture(mapping: &ResolvedMapping, intensities: &VisemeIntensities) -> Self {
        let resolved_viseme_mappings = mapping
            .iter()
            .filter(|(_, morphs)| !morphs.is_empty())
            .map(|(v, morphs)| {
                let list = morphs
                    .iter()
                    .map(|m| ProfileMorph {
                        morph: m.name.clone(),
                        weight: m.weight,
                        primary: m.primary,
                    })
                    .collect();
                (v.as_str().to_string(), list)
            })
            .collect();
        let viseme_intensities =
            intensities.iter().map(|(v, i)| (v.as_str().to_string(), i)).collect();
        Self { version: PROFILE_VERSION, resolved_viseme_mappings, viseme_intensities }
    }

    /// Check every entry against `index`.  Returns the typed content on
    /// success; the first problem found otherwise.
    pub fn validate(&self, index: &MorphNameIndex) -> Result<ValidatedProfile> {
        if self.version != PROFILE_VERSION {
            return Err(invalid(format!(
                "unsupported profile version {} (expected {})",
                self.version, PROFILE_VERSION
            )));
        }

        let mut mappings = Vec::with_capacity(self.resolved_viseme_mappings.len());
        for (key, morphs) in &self.resolved_viseme_mappings {
            let viseme = parse_viseme(key)?;
            let mut list = Vec::with_capacity(morphs.len());
            for m in morphs {
                if !(m.weight.is_finite() && m.weight > 0.0 && m.weight <= 1.0) {
                    return Err(invalid(format!(
                        "{key}: weight {} for '{}' outside (0, 1]",
                        m.weight, m.morph
                    )));
                }
                if !index.contains(&m.morph) {
                    return Err(invalid(format!(
                        "{key}: morph '{}' does not exist on the loaded asset",
                        m.morph
                    )));
                }
                list.push(ResolvedMorph {
                    name: m.morph.clone(),
                    weight: m.weight,
                    primary: m.primary,
                });
            }
            mappings.push((viseme, list));
        }

        let mut intensities = Vec::with_capacity(self.viseme_intensities.len());
        for (key, &value) in &self.viseme_intensities {
            let viseme = parse_viseme(key)?;
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(invalid(format!("{key}: intensity {value} outside [0, 1]")));
            }
            intensities.push((viseme, value));
        }

        Ok(ValidatedProfile { mappings, intensities })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a profile.  Shape errors (wrong types, unknown keys) surface as
    /// [`VisemeError::InvalidProfile`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader).map_err(|e| invalid(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
