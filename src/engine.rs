//! The engine facade: one value owning the per-session state.
//!
//! Lifecycle:
//! 1. [`VisemeEngine::new`]: not ready; application calls return
//!    [`VisemeError::NotReady`].
//! 2. [`VisemeEngine::load_morph_inventory`]: indexes the asset, resolves
//!    the morph table, builds a zeroed influence state.  Calling it again
//!    for a new asset throws all of that away and starts over.
//! 3. Per render tick: [`apply_viseme`](VisemeEngine::apply_viseme) /
//!    [`play_at`](VisemeEngine::play_at), then [`update`](VisemeEngine::update),
//!    then read [`influences`](VisemeEngine::influences) or
//!    [`drain_changes`](VisemeEngine::drain_changes).

use crate::{
    blend::{Blender, MorphInfluence, MorphTable, VisemeIntensities},
    config::{clamp_f32, EngineConfig, DEFAULT_GLOBAL_INTENSITY, MAX_GLOBAL_INTENSITY},
    error::{Result, VisemeError},
    interpolate::{InfluenceState, Phase},
    playback::Playback,
    profile::Profile,
    resolver::{AssetBinding, MorphResolver, ResolutionReport, ResolvedMapping},
    schedule::{create_animation, AnimationFrame, AnimationOptions},
    viseme::Viseme,
};

/// State derived from one loaded asset.  Replaced as a unit on swap.
struct LoadedAsset {
    binding: AssetBinding,
    state: InfluenceState,
    generation: u64,
}

pub struct VisemeEngine {
    config: EngineConfig,
    table: MorphTable,
    resolver: MorphResolver,
    intensities: VisemeIntensities,
    asset: Option<LoadedAsset>,
    generation: u64,
}

impl Default for VisemeEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl VisemeEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_table(config, MorphTable::default())
    }

    /// Engine over a custom authored morph table.
    pub fn with_table(config: EngineConfig, table: MorphTable) -> Self {
        let config = config.sanitized();
        let mut intensities = VisemeIntensities::default();
        for (&viseme, &value) in &config.viseme_intensities {
            intensities.set(viseme, value);
        }
        Self {
            config,
            table,
            resolver: MorphResolver::default(),
            intensities,
            asset: None,
            generation: 0,
        }
    }

    /// Replace the resolution chain.  Takes effect on the next inventory load.
    pub fn with_resolver(mut self, resolver: MorphResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_global_intensity(&mut self, value: f32) {
        self.config.global_intensity = clamp_f32(
            "global_intensity",
            value,
            0.0,
            MAX_GLOBAL_INTENSITY,
            DEFAULT_GLOBAL_INTENSITY,
        );
    }

    // ── Asset lifecycle ──────────────────────────────────────────────────────

    /// Load (or swap to) an asset's morph inventory.
    ///
    /// Everything derived from the previous asset (index, resolved mapping,
    /// imported mapping overrides, resolve cache, influence state) is
    /// discarded.  Per-viseme intensities are asset-independent and kept.
    pub fn load_morph_inventory<I, S>(&mut self, inventory: I) -> &ResolutionReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset = None;
        self.generation += 1;

        let binding = AssetBinding::build(inventory, &self.table, &self.resolver);
        let state = InfluenceState::new(binding.index().names());
        for miss in &binding.report().unresolved {
            tracing::warn!(viseme = %miss.viseme, expected = %miss.expected, "viseme morph unresolved");
        }

        let asset = self.asset.insert(LoadedAsset { binding, state, generation: self.generation });
        asset.binding.report()
    }

    /// Drop the current asset; the engine becomes not ready.
    pub fn unload(&mut self) {
        self.asset = None;
    }

    pub fn is_ready(&self) -> bool {
        self.asset.is_some()
    }

    /// Increments on every inventory load; `None` while not ready.
    pub fn asset_generation(&self) -> Option<u64> {
        self.asset.as_ref().map(|a| a.generation)
    }

    fn loaded(&self) -> Result<&LoadedAsset> {
        self.asset.as_ref().ok_or(VisemeError::NotReady)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedAsset> {
        self.asset.as_mut().ok_or(VisemeError::NotReady)
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    /// Resolve a single expected name against the loaded asset.
    pub fn resolve(&mut self, expected: &str) -> Result<Option<String>> {
        let resolver = &self.resolver;
        let asset = self.asset.as_mut().ok_or(VisemeError::NotReady)?;
        Ok(asset.binding.resolve(resolver, expected).map(|r| r.actual))
    }

    pub fn resolution_report(&self) -> Result<&ResolutionReport> {
        Ok(self.loaded()?.binding.report())
    }

    /// Names passed to [`resolve`](Self::resolve) that the current asset
    /// lacks and the load-time report does not already list.
    pub fn lookup_misses(&self) -> Result<&[String]> {
        Ok(self.loaded()?.binding.lookup_misses())
    }

    pub fn resolved_mapping(&self) -> Result<&ResolvedMapping> {
        Ok(self.loaded()?.binding.mapping())
    }

    /// Morph names of the loaded asset in inventory order.
    pub fn morph_names(&self) -> Result<&[String]> {
        Ok(self.loaded()?.binding.index().names())
    }

    // ── Blending ─────────────────────────────────────────────────────────────

    fn blender<'a>(&'a self, asset: &'a LoadedAsset) -> Blender<'a> {
        Blender::new(
            asset.binding.mapping(),
            &self.intensities,
            self.config.global_intensity,
            &self.config.boost_rules,
        )
    }

    pub fn viseme_influences(&self, viseme: Viseme, intensity: f32) -> Result<Vec<MorphInfluence>> {
        let asset = self.loaded()?;
        Ok(self.blender(asset).viseme_influences(viseme, intensity))
    }

    pub fn blend(&self, active: &[(Viseme, f32)]) -> Result<Vec<MorphInfluence>> {
        let asset = self.loaded()?;
        Ok(self.blender(asset).blend(active))
    }

    /// Target a single viseme.  With `immediate` the influences jump there
    /// at once (debugging / tuning); otherwise [`update`](Self::update)
    /// eases toward them.
    pub fn apply_viseme(&mut self, viseme: Viseme, intensity: f32, immediate: bool) -> Result<()> {
        self.apply_blend(&[(viseme, intensity)], immediate)
    }

    /// Target a combination of visemes (summed per morph, then clamped).
    pub fn apply_blend(&mut self, active: &[(Viseme, f32)], immediate: bool) -> Result<()> {
        let influences = self.blend(active)?;
        let asset = self.loaded_mut()?;
        asset.state.set_targets(&influences);
        if immediate {
            asset.state.snap();
        }
        Ok(())
    }

    /// Target whatever `playback` has active at `t_ms`.  Past the end the
    /// mouth returns to rest.  Returns `true` while the timeline is running.
    pub fn play_at(&mut self, playback: &Playback, t_ms: f64) -> Result<bool> {
        let active = playback.sample(t_ms);
        if active.is_empty() {
            self.loaded_mut()?.state.reset();
            return Ok(!playback.is_finished(t_ms));
        }
        self.apply_blend(&active, false)?;
        Ok(true)
    }

    /// Set one morph directly (current and target).
    pub fn set_influence(&mut self, morph: &str, value: f32) -> Result<()> {
        let asset = self.loaded_mut()?;
        if asset.state.set_influence(morph, value) {
            Ok(())
        } else {
            Err(VisemeError::UnknownMorph(morph.to_string()))
        }
    }

    // ── Tick ─────────────────────────────────────────────────────────────────

    /// Advance interpolation by one tick.
    pub fn update(&mut self) -> Result<Phase> {
        let (speed, epsilon) = (self.config.transition_speed, self.config.epsilon);
        Ok(self.loaded_mut()?.state.step(speed, epsilon))
    }

    pub fn phase(&self) -> Result<Phase> {
        Ok(self.loaded()?.state.phase())
    }

    /// Ease every morph back to zero.  Cancels any in-flight transition.
    /// No-op when not ready.
    pub fn reset(&mut self) {
        if let Some(asset) = self.asset.as_mut() {
            asset.state.reset();
        }
    }

    /// Current influence of every morph, zeros included, in inventory order.
    pub fn influences(&self) -> Result<Vec<(String, f32)>> {
        Ok(self
            .loaded()?
            .state
            .values()
            .map(|(n, v)| (n.to_string(), v))
            .collect())
    }

    pub fn influence(&self, morph: &str) -> Result<Option<f32>> {
        Ok(self.loaded()?.state.current(morph))
    }

    /// Morph values changed since the previous call, for the renderer sync.
    pub fn drain_changes(&mut self) -> Result<Vec<(String, f32)>> {
        Ok(self.loaded_mut()?.state.drain_changes())
    }

    // ── Intensities ──────────────────────────────────────────────────────────

    pub fn viseme_intensity(&self, viseme: Viseme) -> f32 {
        self.intensities.get(viseme)
    }

    pub fn set_viseme_intensity(&mut self, viseme: Viseme, value: f32) {
        self.intensities.set(viseme, value);
    }

    pub fn reset_viseme_intensity(&mut self, viseme: Viseme) {
        self.intensities.reset(viseme);
    }

    pub fn reset_viseme_intensities(&mut self) {
        self.intensities.reset_all();
    }

    // ── Timeline ─────────────────────────────────────────────────────────────

    /// Schedule an utterance.  Works before an asset is loaded.
    pub fn create_animation(&self, text: &str, options: &AnimationOptions) -> Vec<AnimationFrame> {
        create_animation(text, options, &self.config)
    }

    /// Wrap a timeline with the configured cross-fade.
    pub fn playback(&self, frames: Vec<AnimationFrame>) -> Playback {
        Playback::new(frames, self.config.crossfade_ms)
    }

    // ── Profiles ─────────────────────────────────────────────────────────────

    pub fn export_profile(&self) -> Result<Profile> {
        Ok(Profile::capture(self.loaded()?.binding.mapping(), &self.intensities))
    }

    /// Validate `profile` against the loaded asset, then apply it.  On any
    /// validation failure nothing changes.
    pub fn import_profile(&mut self, profile: &Profile) -> Result<()> {
        let asset = self.asset.as_mut().ok_or(VisemeError::NotReady)?;
        let validated = profile.validate(asset.binding.index())?;

        for (viseme, morphs) in validated.mappings {
            asset.binding.mapping_mut().set(viseme, morphs);
        }
        for (viseme, value) in validated.intensities {
            self.intensities.set(viseme, value);
        }
        tracing::debug!("profile imported");
        Ok(())
    }

    pub fn import_profile_json(&mut self, json: &str) -> Result<()> {
        let profile = Profile::from_json(json)?;
        self.import_profile(&profile)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
