//! Morph-target name resolution.
//!
//! The authored viseme table names morphs the way one rig exports them
//! (`V_Explosive`, `Tongue_Up`, …); a different export of the same face may
//! call them `v_explosive`, `VExplosive` or `mouthClose`.  The resolver maps
//! an expected name onto the names actually present on the loaded asset by
//! trying a fixed, ordered chain of strategies:
//!
//! | # | Strategy          | Rule                                                     |
//! |---|-------------------|----------------------------------------------------------|
//! | 1 | exact             | byte-for-byte equal                                      |
//! | 2 | case-insensitive  | equal after lowercasing                                  |
//! | 3 | normalized        | equal after keeping only lowercase alphanumerics         |
//! | 4 | token overlap     | most shared tokens (> 0), ties go to the earlier name    |
//! | 5 | synonym           | first asset name containing a listed alternate substring |
//!
//! The first strategy that answers wins.  If none does the name is
//! unresolved: it is reported and left out of the mapping, never treated as
//! a present morph at weight zero.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{blend::MorphTable, viseme::Viseme};

// ─────────────────────────────────────────────────────────────────────────────
// Name helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Lowercase alphanumeric-only form of a morph name.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lowercase tokens split on non-alphanumeric boundaries.
pub fn tokenize_name(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// MorphNameIndex
// ─────────────────────────────────────────────────────────────────────────────

/// Lookup structure over one asset's morph inventory.  Read-only once built.
#[derive(Debug, Clone)]
pub struct MorphNameIndex {
    names: Vec<String>,
    exact: HashSet<String>,
    lowercase: HashMap<String, usize>,
    normalized: HashMap<String, usize>,
    tokens: Vec<Vec<String>>,
}

impl MorphNameIndex {
    /// Index an inventory.  Order is preserved; repeated names keep their
    /// first position.
    pub fn new<I, S>(inventory: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        let mut exact = HashSet::new();
        for name in inventory {
            let name = name.into();
            if exact.insert(name.clone()) {
                names.push(name);
            }
        }

        let mut lowercase = HashMap::new();
        let mut normalized = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            lowercase.entry(name.to_lowercase()).or_insert(i);
            normalized.entry(normalize_name(name)).or_insert(i);
        }
        let tokens = names.iter().map(|n| tokenize_name(n)).collect();

        tracing::debug!(morphs = names.len(), "built morph name index");
        Self { names, exact, lowercase, normalized, tokens }
    }

    /// Names in inventory order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exact.contains(name)
    }

    /// Inventory position of an exact name.
    pub fn position(&self, name: &str) -> Option<usize> {
        if !self.contains(name) {
            return None;
        }
        self.names.iter().position(|n| n == name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    CaseInsensitive,
    Normalized,
    TokenOverlap,
    Synonym,
}

/// One step of the resolution chain.
pub trait ResolveStrategy {
    fn kind(&self) -> MatchStrategy;

    /// Return the actual asset name for `expected`, or `None` to defer to
    /// the next strategy.
    fn try_resolve(&self, expected: &str, index: &MorphNameIndex) -> Option<String>;
}

pub struct ExactMatch;

impl ResolveStrategy for ExactMatch {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::Exact
    }

    fn try_resolve(&self, expected: &str, index: &MorphNameIndex) -> Option<String> {
        index.contains(expected).then(|| expected.to_string())
    }
}

pub struct CaseInsensitiveMatch;

impl ResolveStrategy for CaseInsensitiveMatch {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::CaseInsensitive
    }

    fn try_resolve(&self, expected: &str, index: &MorphNameIndex) -> Option<String> {
        index
            .lowercase
            .get(&expected.to_lowercase())
            .map(|&i| index.names[i].clone())
    }
}

pub struct NormalizedMatch;

impl ResolveStrategy for NormalizedMatch {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::Normalized
    }

    fn try_resolve(&self, expected: &str, index: &MorphNameIndex) -> Option<String> {
        let key = normalize_name(expected);
        if key.is_empty() {
            return None;
        }
        index.normalized.get(&key).map(|&i| index.names[i].clone())
    }
}

/// Scores candidates by shared tokens.
///
/// Every token counts by default, single letters included, so `V_Explosive`
/// falls back to `V_Open` on a rig that has nothing closer.  Raise
/// `min_token_len` in a custom chain to ignore short prefixes.
pub struct TokenOverlapMatch {
    pub min_token_len: usize,
}

impl Default for TokenOverlapMatch {
    fn default() -> Self {
        Self { min_token_len: 1 }
    }
}

impl ResolveStrategy for TokenOverlapMatch {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::TokenOverlap
    }

    fn try_resolve(&self, expected: &str, index: &MorphNameIndex) -> Option<String> {
        let wanted: HashSet<String> = tokenize_name(expected)
            .into_iter()
            .filter(|t| t.chars().count() >= self.min_token_len)
            .collect();
        if wanted.is_empty() {
            return None;
        }

        let mut best: Option<(usize, usize)> = None; // (score, index)
        for (i, tokens) in index.tokens.iter().enumerate() {
            let candidate: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            let score = wanted.iter().filter(|t| candidate.contains(t.as_str())).count();
            // Strictly greater: on a tie the earlier name stays.
            if score > 0 && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, i));
            }
        }
        best.map(|(_, i)| index.names[i].clone())
    }
}

/// Alternate spellings keyed by the normalized expected name.  Substrings
/// are compared in normalized form against normalized asset names.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("vexplosive", &["mouthclose", "lipstogether", "mouthpress", "visemepp", "mbp"]),
    ("vdentallip", &["lipbite", "mouthrolllower", "lowerlipin", "visemeff"]),
    ("vopen", &["jawopen", "mouthopen", "visemeaa"]),
    ("vtighto", &["mouthpucker", "lipspucker", "visemeo"]),
    ("vtight", &["mouthfunnel", "lipsfunnel", "visemeu"]),
    ("vwide", &["mouthstretch", "mouthsmile", "visemei"]),
    ("vaffricate", &["mouthshrug", "lipsforward", "visemech"]),
    ("vlipopen", &["mouthupperup", "lipspart", "visemess"]),
    ("vtongueraise", &["tongueup", "tongueraise", "tonguelift"]),
    ("vtongueout", &["tongueout", "tongueextend", "visemeth"]),
    ("vtonguecurlu", &["tonguecurl", "tongueroll", "visemerr"]),
    ("jawopen", &["jawopen", "mouthopen", "jawdrop"]),
    ("mouthclose", &["mouthclose", "lipstogether"]),
    ("tongueup", &["tongueup", "tongueraise"]),
];

static SYNONYM_MAP: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| SYNONYMS.iter().copied().collect());

pub struct SynonymMatch;

impl ResolveStrategy for SynonymMatch {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::Synonym
    }

    fn try_resolve(&self, expected: &str, index: &MorphNameIndex) -> Option<String> {
        let alternates = SYNONYM_MAP.get(normalize_name(expected).as_str())?;
        index
            .names
            .iter()
            .find(|name| {
                let norm = normalize_name(name);
                alternates.iter().any(|alt| norm.contains(alt))
            })
            .cloned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub actual: String,
    pub strategy: MatchStrategy,
}

/// Ordered strategy chain.
pub struct MorphResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl Default for MorphResolver {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(ExactMatch),
                Box::new(CaseInsensitiveMatch),
                Box::new(NormalizedMatch),
                Box::new(TokenOverlapMatch::default()),
                Box::new(SynonymMatch),
            ],
        }
    }
}

impl MorphResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver with a custom chain.
    pub fn with_strategies(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run the chain; first answer wins.
    pub fn resolve(&self, expected: &str, index: &MorphNameIndex) -> Option<Resolution> {
        self.strategies.iter().find_map(|s| {
            s.try_resolve(expected, index)
                .map(|actual| Resolution { actual, strategy: s.kind() })
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved mapping + report
// ─────────────────────────────────────────────────────────────────────────────

/// An asset morph driven by a viseme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMorph {
    pub name: String,
    pub weight: f32,
    /// Resolved from the first morph the table lists for this viseme.
    pub primary: bool,
}

/// Per-viseme morphs that exist on the current asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedMapping {
    per_viseme: [Vec<ResolvedMorph>; 15],
}

impl ResolvedMapping {
    pub fn get(&self, viseme: Viseme) -> &[ResolvedMorph] {
        &self.per_viseme[viseme.index()]
    }

    /// Replace one viseme's morph list (used by profile import).
    pub fn set(&mut self, viseme: Viseme, morphs: Vec<ResolvedMorph>) {
        self.per_viseme[viseme.index()] = morphs;
    }

    /// Add a morph; if the viseme already drives that morph the larger
    /// weight is kept so it is not counted twice.
    fn insert(&mut self, viseme: Viseme, name: String, weight: f32, primary: bool) {
        let list = &mut self.per_viseme[viseme.index()];
        match list.iter_mut().find(|m| m.name == name) {
            Some(existing) => {
                existing.weight = existing.weight.max(weight);
                existing.primary |= primary;
            }
            None => list.push(ResolvedMorph { name, weight, primary }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Viseme, &[ResolvedMorph])> + '_ {
        Viseme::ALL.iter().map(move |&v| (v, self.get(v)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    pub viseme: Viseme,
    pub expected: String,
    pub actual: String,
    pub weight: f32,
    pub strategy: MatchStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedEntry {
    pub viseme: Viseme,
    pub expected: String,
    pub weight: f32,
}

/// Outcome of resolving the whole morph table against one asset.
///
/// Every `(viseme, expected)` pair of the table appears in exactly one of
/// the two lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub resolved: Vec<ResolvedEntry>,
    pub unresolved: Vec<UnresolvedEntry>,
}

impl ResolutionReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Everything derived from one loaded asset.
///
/// The index, the mapping built against it and the resolve cache live and
/// die together, so a mapping can never outlive the inventory it was
/// resolved against.
#[derive(Debug, Clone)]
pub struct AssetBinding {
    index: MorphNameIndex,
    mapping: ResolvedMapping,
    report: ResolutionReport,
    cache: HashMap<String, Option<Resolution>>,
    lookup_misses: Vec<String>,
}

impl AssetBinding {
    /// Index `inventory` and resolve every entry of `table` against it.
    pub fn build<I, S>(inventory: I, table: &MorphTable, resolver: &MorphResolver) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = MorphNameIndex::new(inventory);
        let mut binding = Self {
            index,
            mapping: ResolvedMapping::default(),
            report: ResolutionReport::default(),
            cache: HashMap::new(),
            lookup_misses: Vec::new(),
        };

        for (viseme, entries) in table.iter() {
            for (pos, (expected, weight)) in entries.iter().enumerate() {
                match binding.lookup(resolver, expected) {
                    Some(res) => {
                        binding.mapping.insert(viseme, res.actual.clone(), *weight, pos == 0);
                        binding.report.resolved.push(ResolvedEntry {
                            viseme,
                            expected: expected.clone(),
                            actual: res.actual,
                            weight: *weight,
                            strategy: res.strategy,
                        });
                    }
                    None => {
                        binding.report.unresolved.push(UnresolvedEntry {
                            viseme,
                            expected: expected.clone(),
                            weight: *weight,
                        });
                    }
                }
            }
        }

        tracing::info!(
            morphs = binding.index.len(),
            resolved = binding.report.resolved.len(),
            unresolved = binding.report.unresolved.len(),
            "resolved viseme mapping for asset"
        );
        binding
    }

    /// Memoised single-name resolution.  A name that misses and is not
    /// already in the report's unresolved list is recorded in
    /// [`lookup_misses`](Self::lookup_misses), once.
    pub fn resolve(&mut self, resolver: &MorphResolver, expected: &str) -> Option<Resolution> {
        let fresh = !self.cache.contains_key(expected);
        let result = self.lookup(resolver, expected);
        if fresh && result.is_none() {
            self.lookup_misses.push(expected.to_string());
        }
        result
    }

    /// Names passed to [`resolve`](Self::resolve) that the asset lacks, in
    /// first-seen order.
    pub fn lookup_misses(&self) -> &[String] {
        &self.lookup_misses
    }

    /// Misses are logged once per name.
    fn lookup(&mut self, resolver: &MorphResolver, expected: &str) -> Option<Resolution> {
        if let Some(hit) = self.cache.get(expected) {
            return hit.clone();
        }
        let result = resolver.resolve(expected, &self.index);
        match &result {
            Some(res) if res.strategy != MatchStrategy::Exact => {
                tracing::debug!(expected, actual = %res.actual, strategy = ?res.strategy, "morph resolved");
            }
            Some(_) => {}
            None => tracing::warn!(expected, "morph target not found on asset"),
        }
        self.cache.insert(expected.to_string(), result.clone());
        result
    }

    pub fn index(&self) -> &MorphNameIndex {
        &self.index
    }

    pub fn mapping(&self) -> &ResolvedMapping {
        &self.mapping
    }

    pub(crate) fn mapping_mut(&mut self) -> &mut ResolvedMapping {
        &mut self.mapping
    }

    pub fn report(&self) -> &ResolutionReport {
        &self.report
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn index(names: &[&str]) -> MorphNameIndex {
        MorphNameIndex::new(names.iter().copied())
    }

    fn resolve(expected: &str, names: &[&str]) -> Option<Resolution> {
        MorphResolver::new().resolve(expected, &index(names))
    }

    #[test]
    fn test_normalize_and_tokenize() {
        assert_eq!(normalize_name("V_Tongue-Raise 2"), "vtongueraise2");
        assert_eq!(tokenize_name("V_Tongue-Raise"), vec!["v", "tongue", "raise"]);
        assert!(tokenize_name("__").is_empty());
    }

    #[test]
    fn test_exact_identity() {
        let names = ["V_Open", "V_Explosive", "v_explosive"];
        for n in names {
            let r = resolve(n, &names).unwrap();
            assert_eq!(r.actual, n);
            assert_eq!(r.strategy, MatchStrategy::Exact);
        }
    }

    #[test]
    fn test_case_insensitive() {
        let r = resolve("V_EXPLOSIVE", &["Jaw_Open", "v_explosive"]).unwrap();
        assert_eq!(r.actual, "v_explosive");
        assert_eq!(r.strategy, MatchStrategy::CaseInsensitive);
    }

    #[test]
    fn test_normalized() {
        let r = resolve("Jaw_Open", &["browDown", "jawOpen"]).unwrap();
        assert_eq!(r.actual, "jawOpen");
        assert_eq!(r.strategy, MatchStrategy::Normalized);
    }

    #[test]
    fn test_token_overlap_picks_highest_score() {
        let r = resolve("Mouth_Smile_Left", &["Mouth_Frown_Left", "Mouth_Smile_L_Left", "Eye_Blink"]).unwrap();
        assert_eq!(r.actual, "Mouth_Smile_L_Left");
        assert_eq!(r.strategy, MatchStrategy::TokenOverlap);
    }

    #[test]
    fn test_token_overlap_counts_single_letter_tokens() {
        let r = resolve("V_Explosive", &["V_Open"]).unwrap();
        assert_eq!(r.actual, "V_Open");
        assert_eq!(r.strategy, MatchStrategy::TokenOverlap);
    }

    #[test]
    fn test_token_overlap_min_len_is_configurable() {
        let resolver = MorphResolver::with_strategies(vec![
            Box::new(ExactMatch),
            Box::new(TokenOverlapMatch { min_token_len: 2 }),
        ]);
        let index = MorphNameIndex::new(["V_Open"]);
        assert_eq!(resolver.resolve("V_Explosive", &index), None);
    }

    #[test]
    fn test_token_overlap_tie_goes_to_first_index() {
        let r = resolve("Mouth_Roll", &["Mouth_Left", "Mouth_Right"]).unwrap();
        assert_eq!(r.actual, "Mouth_Left");
    }

    #[test]
    fn test_token_overlap_stable_under_permutation() {
        let base = ["Brow_Up", "Cheek_Puff_L", "Mouth_Pucker_Lips", "Eye_Wide"];
        let permutations: [[&str; 4]; 3] = [
            ["Eye_Wide", "Mouth_Pucker_Lips", "Brow_Up", "Cheek_Puff_L"],
            ["Mouth_Pucker_Lips", "Eye_Wide", "Cheek_Puff_L", "Brow_Up"],
            ["Cheek_Puff_L", "Brow_Up", "Eye_Wide", "Mouth_Pucker_Lips"],
        ];
        let expected = resolve("Lips_Pucker", &base).unwrap();
        for p in permutations {
            assert_eq!(resolve("Lips_Pucker", &p).unwrap(), expected);
        }
    }

    #[test]
    fn test_synonym_tongue_raise() {
        let r = resolve("V_Tongue_Raise", &["Jaw_Open", "Tongue_Up"]).unwrap();
        assert_eq!(r.actual, "Tongue_Up");

        // Strategy in isolation, no token overlap available.
        let idx = index(&["jawOpen", "tongueUp"]);
        assert_eq!(SynonymMatch.try_resolve("V_Tongue_Raise", &idx), Some("tongueUp".to_string()));
    }

    #[test]
    fn test_synonym_reached_when_tokens_do_not_overlap() {
        let r = resolve("V_Explosive", &["browDown", "mouthClose"]).unwrap();
        assert_eq!(r.actual, "mouthClose");
        assert_eq!(r.strategy, MatchStrategy::Synonym);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(resolve("V_Explosive", &["Eye_Blink_L", "Brow_Raise"]), None);
        assert_eq!(resolve("anything", &[]), None);
    }

    #[test]
    fn test_index_dedups_and_keeps_order() {
        let idx = index(&["B", "A", "B"]);
        assert_eq!(idx.names(), &["B".to_string(), "A".to_string()]);
        assert_eq!(idx.position("A"), Some(1));
        assert_eq!(idx.position("C"), None);
    }

    #[test]
    fn test_custom_chain_order() {
        let resolver = MorphResolver::with_strategies(vec![Box::new(SynonymMatch), Box::new(ExactMatch)]);
        let idx = index(&["mouthClose", "V_Explosive"]);
        let r = resolver.resolve("V_Explosive", &idx).unwrap();
        assert_eq!(r.strategy, MatchStrategy::Synonym);
        assert_eq!(r.actual, "mouthClose");
    }

    #[test]
    fn test_binding_report_is_consistent() {
        let table = MorphTable::default();
        let binding = AssetBinding::build(
            ["V_Open", "V_Explosive", "Tongue_Up", "Jaw_Open"],
            &table,
            &MorphResolver::new(),
        );
        let report = binding.report();
        let total: usize = table.iter().map(|(_, e)| e.len()).sum();
        assert_eq!(report.resolved.len() + report.unresolved.len(), total);

        for entry in &report.resolved {
            assert!(binding.mapping().get(entry.viseme).iter().any(|m| m.name == entry.actual));
            assert!(binding.index().contains(&entry.actual));
        }
        for entry in &report.unresolved {
            assert!(!report
                .resolved
                .iter()
                .any(|r| r.viseme == entry.viseme && r.expected == entry.expected));
        }
        for (_, morphs) in binding.mapping().iter() {
            for m in morphs {
                assert!(binding.index().contains(&m.name), "{} not on asset", m.name);
            }
        }
    }

    #[test]
    fn test_binding_cache() {
        let table = MorphTable::default();
        let resolver = MorphResolver::new();
        let mut binding = AssetBinding::build(["Tongue_Up"], &table, &resolver);
        let first = binding.resolve(&resolver, "V_Tongue_Raise");
        let second = binding.resolve(&resolver, "V_Tongue_Raise");
        assert_eq!(first, second);
        assert_eq!(binding.resolve(&resolver, "Nope_Nothing"), None);
    }

    #[test]
    fn test_binding_records_lookup_misses_once() {
        let table = MorphTable::default();
        let resolver = MorphResolver::new();
        let mut binding = AssetBinding::build(["Jaw_Open"], &table, &resolver);
        assert!(binding.lookup_misses().is_empty());

        assert_eq!(binding.resolve(&resolver, "Brow_Raise"), None);
        assert_eq!(binding.resolve(&resolver, "Brow_Raise"), None);
        assert!(binding.resolve(&resolver, "Jaw_Open").is_some());
        assert_eq!(binding.lookup_misses(), ["Brow_Raise".to_string()]);
    }

    #[test]
    fn test_binding_marks_primary_only_from_first_entry() {
        let table = MorphTable::new([(
            Viseme::PP,
            vec![("Lips_Closed".to_string(), 1.0), ("Press_Left".to_string(), 0.3)],
        )]);
        let resolver = MorphResolver::new();

        let binding = AssetBinding::build(["Press_Left"], &table, &resolver);
        let pp = binding.mapping().get(Viseme::PP);
        assert_eq!(pp.len(), 1);
        assert!(!pp[0].primary);

        let binding = AssetBinding::build(["Lips_Closed", "Press_Left"], &table, &resolver);
        let pp = binding.mapping().get(Viseme::PP);
        assert!(pp[0].primary);
        assert!(!pp[1].primary);
    }
}
