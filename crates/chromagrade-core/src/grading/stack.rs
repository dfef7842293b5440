//! Ordered, opacity-blended operation stack.
//!
//! Mutation takes the write lock; `apply` holds the read lock for the whole
//! fold, so concurrent applies share one stable view of the operations.

use std::sync::Arc;

use enough::Stop;
use parking_lot::RwLock;
use rayon::prelude::*;

use super::operation::{GradingOperation, OperationId, OperationKind, Prepared, lerp};
use crate::error::{GradeError, GradeResult};
use crate::frame::Frame;
use crate::lut::{Lut3D, LutResolver, generate};

/// Supplies per-pixel mask weights for operations that name a mask.
pub trait MaskResolver: Send + Sync {
    /// Weights in `[0, 1]`, one per pixel, row-major.
    fn resolve_mask(&self, name: &str, width: u32, height: u32) -> GradeResult<Arc<[f32]>>;
}

/// External lookups available while applying a stack.
#[derive(Clone, Copy, Default)]
pub struct ApplyContext<'a> {
    pub luts: Option<&'a dyn LutResolver>,
    pub masks: Option<&'a dyn MaskResolver>,
}

impl<'a> ApplyContext<'a> {
    pub fn with_luts(luts: &'a dyn LutResolver) -> Self {
        Self { luts: Some(luts), masks: None }
    }
}

#[derive(Debug)]
pub struct SkippedOperation {
    pub id: OperationId,
    pub kind: &'static str,
    pub error: GradeError,
}

/// Side channel for [`OperationStack::apply`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Stack revision the result was computed from.
    pub revision: u64,
    pub applied: Vec<OperationId>,
    pub skipped: Vec<SkippedOperation>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, op: &GradingOperation, error: GradeError) {
        tracing::warn!("Skipping {} ({}): {error}", op.id(), op.kind().name());
        self.skipped.push(SkippedOperation { id: op.id(), kind: op.kind().name(), error });
    }
}

fn apply_one(op: &GradingOperation, frame: &Frame, ctx: ApplyContext<'_>) -> GradeResult<Frame> {
    let prepared = op.kind().prepare(ctx.luts)?;
    let opacity = op.opacity();
    let Some(name) = op.mask() else {
        return Ok(frame.map_pixels(|px| lerp(px, prepared.apply(px), opacity)));
    };

    let masks = ctx
        .masks
        .ok_or_else(|| GradeError::Configuration(format!("no mask source for '{name}'")))?;
    let weights = masks.resolve_mask(name, frame.width, frame.height)?;
    if weights.len() != frame.pixel_count() {
        return Err(GradeError::Validation(format!(
            "mask '{name}' has {} weights for {} pixels",
            weights.len(),
            frame.pixel_count()
        )));
    }
    let pixels = frame
        .pixels
        .par_iter()
        .zip(weights.par_iter())
        .map(|(&px, &w)| lerp(px, prepared.apply(px), opacity * w.clamp(0.0, 1.0)))
        .collect();
    Ok(frame.with_pixels(pixels))
}

/// Fold `operations` over `frame` left to right. A failing operation passes
/// its input through and is recorded in the report.
pub fn apply_operations(
    operations: &[GradingOperation],
    frame: &Frame,
    ctx: ApplyContext<'_>,
) -> (Frame, ApplyReport) {
    let mut report = ApplyReport::default();
    let mut current = frame.clone();
    for op in operations {
        if !op.is_enabled() || op.opacity() <= 0.0 {
            continue;
        }
        match apply_one(op, &current, ctx) {
            Ok(next) => {
                current = next;
                report.applied.push(op.id());
            }
            Err(error) => report.skip(op, error),
        }
    }
    (current, report)
}

#[derive(Debug, Default)]
struct StackState {
    operations: Vec<GradingOperation>,
    /// Last id handed out; 0 is never allocated.
    last_id: u64,
    revision: u64,
}

impl StackState {
    fn allocate(&mut self) -> OperationId {
        self.last_id += 1;
        OperationId(self.last_id)
    }

    fn find_mut(&mut self, id: OperationId) -> GradeResult<&mut GradingOperation> {
        self.operations
            .iter_mut()
            .find(|op| op.id() == id)
            .ok_or_else(|| GradeError::Validation(format!("no operation {id} in stack")))
    }
}

#[derive(Debug, Default)]
pub struct OperationStack {
    state: RwLock<StackState>,
}

impl OperationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `op` under a freshly allocated id.
    pub fn add(&self, mut op: GradingOperation) -> OperationId {
        let mut state = self.state.write();
        let id = state.allocate();
        op.set_id(id);
        state.operations.push(op);
        state.revision += 1;
        id
    }

    /// Validate and append an enabled, opaque operation.
    pub fn push(&self, kind: OperationKind) -> GradeResult<OperationId> {
        Ok(self.add(GradingOperation::new(kind)?))
    }

    pub fn remove(&self, id: OperationId) -> Option<GradingOperation> {
        let mut state = self.state.write();
        let index = state.operations.iter().position(|op| op.id() == id)?;
        state.revision += 1;
        Some(state.operations.remove(index))
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.operations.clear();
        state.revision += 1;
    }

    pub fn set_enabled(&self, id: OperationId, enabled: bool) -> GradeResult<()> {
        let mut state = self.state.write();
        state.find_mut(id)?.set_enabled(enabled);
        state.revision += 1;
        Ok(())
    }

    pub fn set_opacity(&self, id: OperationId, opacity: f32) -> GradeResult<()> {
        let mut state = self.state.write();
        state.find_mut(id)?.set_opacity(opacity)?;
        state.revision += 1;
        Ok(())
    }

    /// Replace the whole stack, keeping the operations' ids. Operations
    /// without an id get a fresh one.
    pub fn restore(&self, operations: Vec<GradingOperation>) -> GradeResult<()> {
        let mut seen = std::collections::HashSet::new();
        for op in &operations {
            op.validate()?;
            if op.id().0 != 0 && !seen.insert(op.id()) {
                return Err(GradeError::Validation(format!("duplicate operation id {}", op.id())));
            }
        }

        let mut state = self.state.write();
        state.last_id = state.last_id.max(seen.iter().map(|id| id.0).max().unwrap_or(0));
        state.operations = operations;
        for i in 0..state.operations.len() {
            if state.operations[i].id().0 == 0 {
                let id = state.allocate();
                state.operations[i].set_id(id);
            }
        }
        state.revision += 1;
        Ok(())
    }

    pub fn get(&self, id: OperationId) -> Option<GradingOperation> {
        self.state.read().operations.iter().find(|op| op.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incremented on every mutation.
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    pub fn snapshot(&self) -> Vec<GradingOperation> {
        self.state.read().operations.clone()
    }

    pub fn apply(&self, frame: &Frame, ctx: ApplyContext<'_>) -> (Frame, ApplyReport) {
        let state = self.state.read();
        let (out, mut report) = apply_operations(&state.operations, frame, ctx);
        report.revision = state.revision;
        (out, report)
    }

    /// Sample the enabled operations on an N³ lattice.
    ///
    /// Masked operations are spatial and cannot be baked; they are skipped
    /// and reported like any other failing operation.
    pub fn bake(
        &self,
        size: usize,
        ctx: ApplyContext<'_>,
        stop: impl Stop + Sync,
    ) -> GradeResult<(Lut3D, ApplyReport)> {
        let state = self.state.read();
        let mut report = ApplyReport { revision: state.revision, ..ApplyReport::default() };
        let mut steps: Vec<(Prepared<'_>, f32)> = Vec::new();

        for op in &state.operations {
            if !op.is_enabled() || op.opacity() <= 0.0 {
                continue;
            }
            if let Some(mask) = op.mask() {
                let error = GradeError::Validation(format!("masked operation cannot be baked (mask '{mask}')"));
                report.skip(op, error);
                continue;
            }
            match op.kind().prepare(ctx.luts) {
                Ok(prepared) => {
                    steps.push((prepared, op.opacity()));
                    report.applied.push(op.id());
                }
                Err(error) => report.skip(op, error),
            }
        }

        let lut = generate(
            size,
            |rgb| steps.iter().fold(rgb, |px, (step, opacity)| lerp(px, step.apply(px), *opacity)),
            stop,
        )?;
        Ok((lut, report))
    }
}

#[cfg(test)]
mod tests {
    use enough::Unstoppable;

    use super::*;
    use crate::color_management::profile::ProfileId;
    use crate::frame::SampleEncoding;
    use crate::grading::operation::{ContrastParams, ExposureParams, LutParams};

    fn ramp() -> Frame {
        let pixels = (0..16)
            .map(|i| {
                let v = i as f32 / 15.0;
                [v, v * 0.5, 1.0 - v]
            })
            .collect();
        Frame::new(4, 4, pixels, ProfileId::Srgb, SampleEncoding::Encoded).unwrap()
    }

    fn contrast(c: f32) -> OperationKind {
        OperationKind::Contrast(ContrastParams::new(c))
    }

    #[test]
    fn test_zero_opacity_leaves_frame_unchanged() {
        let stack = OperationStack::new();
        let op = GradingOperation::new(contrast(2.0)).unwrap().with_opacity(0.0).unwrap();
        stack.add(op);
        let frame = ramp();
        let (out, _) = stack.apply(&frame, ApplyContext::default());
        assert_eq!(out.pixels, frame.pixels);
    }

    #[test]
    fn test_identity_contrast_then_contrast_equals_single() {
        let two = OperationStack::new();
        two.push(contrast(1.0)).unwrap();
        two.push(contrast(2.0)).unwrap();
        let one = OperationStack::new();
        one.push(contrast(2.0)).unwrap();

        let frame = ramp();
        let (a, _) = two.apply(&frame, ApplyContext::default());
        let (b, _) = one.apply(&frame, ApplyContext::default());
        assert_eq!(a.pixels, b.pixels);
    }

    #[test]
    fn test_half_opacity_blends() {
        let stack = OperationStack::new();
        let op = GradingOperation::new(OperationKind::Exposure(ExposureParams { stops: 1.0 }))
            .unwrap()
            .with_opacity(0.5)
            .unwrap();
        stack.add(op);
        let frame = Frame::filled(1, 1, [0.2; 3], ProfileId::Srgb, SampleEncoding::Linear);
        let (out, report) = stack.apply(&frame, ApplyContext::default());
        assert!((out.pixels[0][0] - 0.3).abs() < 1e-6, "{:.8}", out.pixels[0][0]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_failing_operation_is_skipped_and_reported() {
        let stack = OperationStack::new();
        let missing = stack
            .push(OperationKind::Lut(LutParams { lut_name: "absent".into(), intensity: 1.0 }))
            .unwrap();
        let exposure = stack.push(OperationKind::Exposure(ExposureParams { stops: 1.0 })).unwrap();

        let frame = Frame::filled(2, 2, [0.25; 3], ProfileId::Srgb, SampleEncoding::Linear);
        let (out, report) = stack.apply(&frame, ApplyContext::default());
        assert_eq!(out.pixels[0], [0.5; 3]);
        assert_eq!(report.applied, vec![exposure]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, missing);
        assert_eq!(report.skipped[0].kind, "lut");
    }

    #[test]
    fn test_disabled_operation_is_ignored() {
        let stack = OperationStack::new();
        let id = stack.push(contrast(2.0)).unwrap();
        stack.set_enabled(id, false).unwrap();
        let frame = ramp();
        assert_eq!(stack.apply(&frame, ApplyContext::default()).0.pixels, frame.pixels);
    }

    #[test]
    fn test_ids_are_stable_and_monotonic() {
        let stack = OperationStack::new();
        let a = stack.push(contrast(1.1)).unwrap();
        let b = stack.push(contrast(1.2)).unwrap();
        assert!(stack.remove(a).is_some());
        assert!(stack.remove(a).is_none());
        let c = stack.push(contrast(1.3)).unwrap();
        assert!(c > b);
        let ids: Vec<_> = stack.snapshot().iter().map(|op| op.id()).collect();
        assert_eq!(ids, vec![b, c]);
    }

    #[test]
    fn test_mutations_bump_revision() {
        let stack = OperationStack::new();
        let r0 = stack.revision();
        let id = stack.push(contrast(1.1)).unwrap();
        stack.set_opacity(id, 0.5).unwrap();
        assert!(stack.set_opacity(id, 2.0).is_err());
        assert!(stack.set_enabled(OperationId(99), true).is_err());
        assert_eq!(stack.revision(), r0 + 2);
        stack.clear();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_restore_keeps_ids_and_rejects_duplicates() {
        let source = OperationStack::new();
        source.push(contrast(1.1)).unwrap();
        source.push(contrast(1.2)).unwrap();
        let ops = source.snapshot();

        let target = OperationStack::new();
        target.restore(ops.clone()).unwrap();
        assert_eq!(target.snapshot(), ops);
        let next = target.push(contrast(1.3)).unwrap();
        assert_eq!(next, OperationId(3));

        let mut dup = ops.clone();
        dup.push(ops[0].clone());
        assert!(matches!(target.restore(dup), Err(GradeError::Validation(_))));
    }

    #[test]
    fn test_concurrent_applies() {
        let stack = Arc::new(OperationStack::new());
        stack.push(contrast(1.5)).unwrap();
        let frame = Arc::new(ramp());
        let expected = stack.apply(&frame, ApplyContext::default()).0;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stack = Arc::clone(&stack);
                let frame = Arc::clone(&frame);
                std::thread::spawn(move || stack.apply(&frame, ApplyContext::default()).0)
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().pixels, expected.pixels);
        }
    }

    #[test]
    fn test_bake_matches_apply() {
        let stack = OperationStack::new();
        stack.push(contrast(1.4)).unwrap();
        stack.push(OperationKind::Exposure(ExposureParams { stops: -0.5 })).unwrap();
        let (lut, report) = stack.bake(33, ApplyContext::default(), Unstoppable).unwrap();
        assert!(report.is_clean());

        let frame = Frame::filled(1, 1, [0.5, 0.5, 0.5], ProfileId::Srgb, SampleEncoding::Encoded);
        let direct = stack.apply(&frame, ApplyContext::default()).0.pixels[0];
        let baked = lut.apply([0.5, 0.5, 0.5]);
        for i in 0..3 {
            assert!((direct[i] - baked[i]).abs() < 1e-5, "channel {i}: {:.8} vs {:.8}", direct[i], baked[i]);
        }
    }

    #[test]
    fn test_empty_stack_bakes_identity() {
        let (lut, _) = OperationStack::new().bake(17, ApplyContext::default(), Unstoppable).unwrap();
        assert_eq!(lut.data, Lut3D::identity(17).unwrap().data);
    }

    struct HalfMask;

    impl MaskResolver for HalfMask {
        fn resolve_mask(&self, _name: &str, width: u32, height: u32) -> GradeResult<Arc<[f32]>> {
            let n = (width * height) as usize;
            Ok((0..n).map(|i| if i < n / 2 { 1.0 } else { 0.0 }).collect())
        }
    }

    #[test]
    fn test_mask_limits_operation() {
        let stack = OperationStack::new();
        let op = GradingOperation::new(OperationKind::Exposure(ExposureParams { stops: 1.0 }))
            .unwrap()
            .with_mask("left");
        stack.add(op);
        let frame = Frame::filled(2, 1, [0.25; 3], ProfileId::Srgb, SampleEncoding::Linear);

        let (_, report) = stack.apply(&frame, ApplyContext::default());
        assert_eq!(report.skipped.len(), 1);

        let ctx = ApplyContext { luts: None, masks: Some(&HalfMask) };
        let (out, report) = stack.apply(&frame, ctx);
        assert!(report.is_clean());
        assert_eq!(out.pixels[0], [0.5; 3]);
        assert_eq!(out.pixels[1], [0.25; 3]);
    }
}
