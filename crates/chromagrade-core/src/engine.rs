//! The engine handle: one owned value holding the converter, tone mapper,
//! LUT cache, operation stack, frame cache and worker pool.
//!
//! Nothing here is global. The host builds a [`GradingEngine`], shares it by
//! reference (it is `Sync`), and drops it to release every cached LUT and
//! frame.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use enough::{Stop, Unstoppable};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use crate::color_management::{ColorSpaceConverter, ProfileId};
use crate::config::EngineConfig;
use crate::error::{GradeError, GradeResult};
use crate::frame::{Frame, SampleEncoding};
use crate::grading::{
    ApplyContext, ApplyReport, ColorGradingSettings, MaskResolver, OperationId, OperationStack, Preset,
};
use crate::lut::{self, Lut, Lut3D, LutCache, LutInfo};
use crate::matching::{ColorMatcher, MatchMethod};
use crate::scopes::ScopeSet;
use crate::tonemap::{HdrMetadata, ToneMapper, ToneMappingSettings};

/// Host-chosen identity of a frame's content. The frame cache trusts it:
/// two different images must never share an id.
pub type FrameId = u64;

/// Everything a graded frame depends on besides the source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FrameKey {
    frame: FrameId,
    revision: u64,
    luts: u64,
    adjustments: u64,
}

#[derive(Debug)]
struct CachedFrame {
    frame: Arc<Frame>,
    applied: Vec<OperationId>,
}

#[derive(Debug, Default)]
struct FrameCacheState {
    entries: HashMap<FrameKey, CachedFrame>,
    /// Insertion order, oldest first.
    order: VecDeque<FrameKey>,
}

/// Graded frames keyed by frame id, stack revision, LUT cache generation and
/// adjustments epoch.
#[derive(Debug)]
struct FrameCache {
    capacity: usize,
    state: Mutex<FrameCacheState>,
}

impl FrameCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(FrameCacheState::default()),
        }
    }

    fn get(&self, key: FrameKey) -> Option<(Arc<Frame>, Vec<OperationId>)> {
        let state = self.state.lock();
        let hit = state.entries.get(&key)?;
        tracing::debug!("Frame cache hit: frame {} at revision {}", key.frame, key.revision);
        Some((Arc::clone(&hit.frame), hit.applied.clone()))
    }

    fn insert(&self, key: FrameKey, frame: Arc<Frame>, applied: Vec<OperationId>) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.lock();
        if state.entries.insert(key, CachedFrame { frame, applied }).is_none() {
            state.order.push_back(key);
        }
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                tracing::debug!("Evicted frame {} (revision {})", oldest.frame, oldest.revision);
            }
        }
    }

    fn contains(&self, key: FrameKey) -> bool {
        self.state.lock().entries.contains_key(&key)
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn clear(&self) {
        *self.state.lock() = FrameCacheState::default();
    }
}

/// Global adjustments plus a counter bumped on every replacement.
#[derive(Debug)]
struct Adjustments {
    settings: ColorGradingSettings,
    epoch: u64,
}

/// Owned handle over every engine component.
pub struct GradingEngine {
    config: EngineConfig,
    pool: rayon::ThreadPool,
    converter: ColorSpaceConverter,
    tone_mapper: ToneMapper,
    luts: LutCache,
    stack: OperationStack,
    grading: RwLock<Adjustments>,
    frames: FrameCache,
    masks: Option<Arc<dyn MaskResolver>>,
}

impl GradingEngine {
    pub fn new(config: EngineConfig) -> GradeResult<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("chromagrade-worker-{i}"))
            .build()
            .map_err(|e| GradeError::Configuration(format!("failed to build worker pool: {e}")))?;

        tracing::info!(
            "Grading engine ready: {} worker threads, LUT cache {}, frame cache {}",
            pool.current_num_threads(),
            config.lut_cache_capacity,
            config.frame_cache_capacity
        );

        Ok(Self {
            pool,
            converter: ColorSpaceConverter::new(),
            tone_mapper: ToneMapper::new(),
            luts: LutCache::new(config.lut_cache_capacity),
            stack: OperationStack::new(),
            grading: RwLock::new(Adjustments { settings: config.grading.clone(), epoch: 0 }),
            frames: FrameCache::new(config.frame_cache_capacity),
            masks: None,
            config,
        })
    }

    /// Resolve operation masks through `masks`.
    pub fn with_mask_resolver(mut self, masks: Arc<dyn MaskResolver>) -> Self {
        self.masks = Some(masks);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn converter(&self) -> &ColorSpaceConverter {
        &self.converter
    }

    pub fn stack(&self) -> &OperationStack {
        &self.stack
    }

    pub fn luts(&self) -> &LutCache {
        &self.luts
    }

    pub fn grading_settings(&self) -> ColorGradingSettings {
        self.grading.read().settings.clone()
    }

    /// Replace the global adjustments. Cached frames are dropped.
    pub fn set_grading_settings(&self, settings: ColorGradingSettings) -> GradeResult<()> {
        settings.validate()?;
        {
            let mut grading = self.grading.write();
            grading.settings = settings;
            grading.epoch += 1;
        }
        self.frames.clear();
        Ok(())
    }

    fn context(&self) -> ApplyContext<'_> {
        ApplyContext {
            luts: Some(&self.luts),
            masks: self.masks.as_deref(),
        }
    }

    // ── Grading ─────────────────────────────────────────────────

    /// Cache key for `frame_id` as of now, and whether outputs are clamped.
    ///
    /// The LUT generation is read before grading starts, so a LUT swapped
    /// mid-apply leaves the result filed under a key no later lookup uses.
    fn frame_key(&self, frame_id: FrameId) -> (FrameKey, bool) {
        let grading = self.grading.read();
        let key = FrameKey {
            frame: frame_id,
            revision: self.stack.revision(),
            luts: self.luts.generation(),
            adjustments: grading.epoch,
        };
        (key, grading.settings.auto_clamp)
    }

    /// Grade a frame with the current stack.
    ///
    /// Results of clean applies are cached, so a repeated call with no change
    /// to the stack, the loaded LUTs or the adjustments returns the cached
    /// frame.
    pub fn apply(&self, frame_id: FrameId, frame: &Frame) -> (Arc<Frame>, ApplyReport) {
        let (key, auto_clamp) = self.frame_key(frame_id);
        if let Some((cached, applied)) = self.frames.get(key) {
            let report = ApplyReport { revision: key.revision, applied, skipped: Vec::new() };
            return (cached, report);
        }

        let (out, report) = self.pool.install(|| {
            let (out, report) = self.stack.apply(frame, self.context());
            if auto_clamp {
                (out.map_pixels(|px| px.map(|v| v.clamp(0.0, 1.0))), report)
            } else {
                (out, report)
            }
        });
        let out = Arc::new(out);
        if report.is_clean() {
            let key = FrameKey { revision: report.revision, ..key };
            self.frames.insert(key, Arc::clone(&out), report.applied.clone());
        }
        (out, report)
    }

    /// Grade a batch into the frame cache on the worker pool. Returns how many
    /// frames were graded (already-cached frames are not counted).
    pub fn warmup(&self, frames: &[(FrameId, Frame)], stop: impl Stop + Send + Sync) -> GradeResult<usize> {
        let graded = self.pool.install(|| {
            frames
                .par_iter()
                .map(|(id, frame)| {
                    stop.check()?;
                    if self.frames.contains(self.frame_key(*id).0) {
                        return Ok(0);
                    }
                    self.apply(*id, frame);
                    Ok(1)
                })
                .collect::<GradeResult<Vec<usize>>>()
        })?;
        let graded = graded.into_iter().sum();
        tracing::debug!("Warmed frame cache with {graded} of {} frames", frames.len());
        Ok(graded)
    }

    pub fn cached_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn clear_frame_cache(&self) {
        self.frames.clear();
    }

    /// Bake the enabled, unmasked operations into a 3D LUT of the configured
    /// size, on the worker pool.
    pub fn generate_lut_from_stack(&self, stop: impl Stop + Send + Sync) -> GradeResult<(Lut3D, ApplyReport)> {
        let size = self.grading.read().settings.lut_size;
        let (lut, report) = self.pool.install(|| self.stack.bake(size, self.context(), stop))?;
        Ok((lut.with_interpolation(self.config.default_interpolation), report))
    }

    // ── Color management ────────────────────────────────────────

    pub fn convert(&self, frame: &Frame, from: &ProfileId, to: &ProfileId) -> GradeResult<Frame> {
        self.pool.install(|| self.converter.convert(frame, from, to))
    }

    /// A LUT converting `from` to `to`, sized by the grading settings.
    pub fn conversion_lut(
        &self,
        from: &ProfileId,
        to: &ProfileId,
        stop: impl Stop + Send,
    ) -> GradeResult<Lut3D> {
        let size = self.grading.read().settings.lut_size;
        let lut = self
            .pool
            .install(|| lut::color_space_lut(&self.converter, from, to, size, stop))?;
        Ok(lut.with_interpolation(self.config.default_interpolation))
    }

    pub fn match_frames(&self, reference: &Frame, target: &Frame, method: MatchMethod) -> GradeResult<Frame> {
        self.pool
            .install(|| ColorMatcher::new(&self.converter).apply(reference, target, method))
    }

    pub fn scopes(&self, frame: &Frame) -> ScopeSet {
        self.pool.install(|| ScopeSet::compute(frame))
    }

    // ── Tone mapping ────────────────────────────────────────────

    /// Tone-map one frame with the configured settings. Encoded (PQ/HLG)
    /// frames come back Rec. 709 encoded.
    pub fn tone_map(&self, frame: &Frame, metadata: &HdrMetadata) -> GradeResult<Frame> {
        self.tone_map_with(frame, metadata, &self.config.tone_mapping)
    }

    pub fn tone_map_with(
        &self,
        frame: &Frame,
        metadata: &HdrMetadata,
        settings: &ToneMappingSettings,
    ) -> GradeResult<Frame> {
        self.pool.install(|| match frame.encoding {
            SampleEncoding::Linear => self.tone_mapper.map(frame, metadata, settings),
            SampleEncoding::Encoded => self.tone_mapper.map_encoded(frame, metadata, settings),
        })
    }

    pub fn tone_map_batch(
        &self,
        frames: &[Frame],
        metadata: &HdrMetadata,
        stop: impl Stop + Send + Sync,
    ) -> GradeResult<Vec<Frame>> {
        self.pool
            .install(|| self.tone_mapper.map_batch(frames, metadata, &self.config.tone_mapping, stop))
    }

    // ── LUTs ────────────────────────────────────────────────────

    /// Load a `.cube`/`.3dl` file into the cache. Returns the cache name.
    pub fn load_lut(&self, path: impl AsRef<Path>, name: Option<&str>) -> GradeResult<String> {
        let name = self.luts.load(path, name)?;
        self.frames.clear();
        Ok(name)
    }

    /// Generate a built-in look and cache it under its own name.
    pub fn load_look(&self, name: &str) -> GradeResult<LutInfo> {
        let size = self.grading.read().settings.lut_size;
        let look = self.pool.install(|| lut::look(name, size, Unstoppable))?;
        let look = look.with_interpolation(self.config.default_interpolation);
        self.insert_lut(name, look.into())
    }

    pub fn insert_lut(&self, name: &str, lut: Lut) -> GradeResult<LutInfo> {
        let lut = self.luts.insert(name, lut)?;
        self.frames.clear();
        Ok(LutInfo::from_lut(name, &lut))
    }

    pub fn unload_lut(&self, name: &str) -> GradeResult<bool> {
        let removed = self.luts.unload(name)?;
        if removed {
            self.frames.clear();
        }
        Ok(removed)
    }

    // ── Presets ─────────────────────────────────────────────────

    /// Snapshot the stack and the global adjustments.
    pub fn snapshot_preset(&self, name: &str) -> Preset {
        Preset::from_stack(name, &self.stack, self.grading_settings())
    }

    pub fn save_preset(&self, name: &str, path: impl AsRef<Path>) -> GradeResult<Preset> {
        let preset = self.snapshot_preset(name);
        preset.save(path)?;
        Ok(preset)
    }

    /// Replace the stack and the global adjustments with a preset's.
    pub fn apply_preset(&self, preset: &Preset) -> GradeResult<()> {
        preset.validate()?;
        preset.apply_to(&self.stack)?;
        self.set_grading_settings(preset.adjustments.clone())?;
        tracing::info!("Applied preset '{}'", preset.name);
        Ok(())
    }

    pub fn load_preset(&self, path: impl AsRef<Path>) -> GradeResult<Preset> {
        let preset = Preset::load(path)?;
        self.apply_preset(&preset)?;
        Ok(preset)
    }
}

impl std::fmt::Debug for GradingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradingEngine")
            .field("config", &self.config)
            .field("worker_threads", &self.pool.current_num_threads())
            .field("luts", &self.luts.len())
            .field("operations", &self.stack.len())
            .field("cached_frames", &self.frames.len())
            .finish()
    }
}
