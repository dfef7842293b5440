//! Typed grading operations.
//!
//! Each [`OperationKind`] variant carries its own parameter struct, checked
//! once when the operation is built. Serialized form:
//!
//! ```json
//! { "id": 3, "kind": { "type": "contrast", "params": { "contrast": 1.2 } },
//!   "enabled": true, "opacity": 1.0 }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::curves::{CurveParams, apply_tone_curve};
use super::hsl::{HslParams, apply_hsl};
use super::sliders::{self, DEFAULT_PIVOT};
use super::wheels::{Cdl, WheelParams};
use crate::color_management::matrix::ConversionMatrix;
use crate::color_management::white_balance::white_balance_matrix;
use crate::error::{GradeError, GradeResult};
use crate::lut::{Lut, LutResolver};

/// Stable operation id, allocated by the owning stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

fn one() -> f32 {
    1.0
}

fn default_pivot() -> f32 {
    DEFAULT_PIVOT
}

fn default_tone_width() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> GradeResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(GradeError::Validation(format!(
            "{name} must be in [{min}, {max}], got {value}"
        )));
    }
    Ok(())
}

/// Reference to a cached LUT by name, blended at `intensity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LutParams {
    pub lut_name: String,
    #[serde(default = "one")]
    pub intensity: f32,
}

/// Per-channel `out = in × gain + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbParams {
    #[serde(default = "RgbParams::unit")]
    pub gain: [f32; 3],
    #[serde(default)]
    pub offset: [f32; 3],
}

impl RgbParams {
    fn unit() -> [f32; 3] {
        [1.0; 3]
    }
}

impl Default for RgbParams {
    fn default() -> Self {
        Self { gain: [1.0; 3], offset: [0.0; 3] }
    }
}

/// Pivoted power contrast followed by an additive brightness offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastParams {
    #[serde(default = "one")]
    pub contrast: f32,
    #[serde(default)]
    pub brightness: f32,
    #[serde(default = "default_pivot")]
    pub pivot: f32,
}

impl ContrastParams {
    pub fn new(contrast: f32) -> Self {
        Self { contrast, ..Self::default() }
    }
}

impl Default for ContrastParams {
    fn default() -> Self {
        Self { contrast: 1.0, brightness: 0.0, pivot: DEFAULT_PIVOT }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowsHighlightsParams {
    #[serde(default)]
    pub shadows_amount: f32,
    #[serde(default)]
    pub highlights_amount: f32,
    #[serde(default = "default_tone_width")]
    pub shadows_tone_width: f32,
    #[serde(default = "default_tone_width")]
    pub highlights_tone_width: f32,
}

impl Default for ShadowsHighlightsParams {
    fn default() -> Self {
        Self {
            shadows_amount: 0.0,
            highlights_amount: 0.0,
            shadows_tone_width: 0.5,
            highlights_tone_width: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationParams {
    #[serde(default = "one")]
    pub saturation: f32,
    /// 0 = Rec. 709 luma reference, 1 = equal-weight.
    #[serde(default)]
    pub luma_mix: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureParams {
    pub stops: f32,
}

/// Temperature and tint, each roughly `[-1, 1]`, as a Bradford shift of D65.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WhiteBalanceParams {
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub tint: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VibranceParams {
    #[serde(default = "one")]
    pub vibrance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum OperationKind {
    Wheel(WheelParams),
    Curve(CurveParams),
    Lut(LutParams),
    Hsl(HslParams),
    Rgb(RgbParams),
    Contrast(ContrastParams),
    ShadowsHighlights(ShadowsHighlightsParams),
    Saturation(SaturationParams),
    Exposure(ExposureParams),
    WhiteBalance(WhiteBalanceParams),
    Vibrance(VibranceParams),
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Wheel(_) => "wheel",
            Self::Curve(_) => "curve",
            Self::Lut(_) => "lut",
            Self::Hsl(_) => "hsl",
            Self::Rgb(_) => "rgb",
            Self::Contrast(_) => "contrast",
            Self::ShadowsHighlights(_) => "shadows_highlights",
            Self::Saturation(_) => "saturation",
            Self::Exposure(_) => "exposure",
            Self::WhiteBalance(_) => "white_balance",
            Self::Vibrance(_) => "vibrance",
        }
    }

    /// Check every parameter against its allowed range.
    pub fn validate(&self) -> GradeResult<()> {
        match self {
            Self::Wheel(p) => p.validate(),
            Self::Curve(p) => p.validate(),
            Self::Lut(p) => {
                if p.lut_name.trim().is_empty() {
                    return Err(GradeError::Validation("LUT operation needs a LUT name".to_string()));
                }
                check_range("LUT intensity", p.intensity, 0.0, 1.0)
            }
            Self::Hsl(p) => p.validate(),
            Self::Rgb(p) => {
                for c in 0..3 {
                    check_range("RGB gain", p.gain[c], 0.0, 4.0)?;
                    check_range("RGB offset", p.offset[c], -1.0, 1.0)?;
                }
                Ok(())
            }
            Self::Contrast(p) => {
                if !(p.contrast.is_finite() && p.contrast > 0.0 && p.contrast <= 4.0) {
                    return Err(GradeError::Validation(format!(
                        "contrast must be in (0, 4], got {}",
                        p.contrast
                    )));
                }
                check_range("brightness", p.brightness, -1.0, 1.0)?;
                if !(p.pivot.is_finite() && p.pivot > 0.0 && p.pivot <= 1.0) {
                    return Err(GradeError::Validation(format!(
                        "contrast pivot must be in (0, 1], got {}",
                        p.pivot
                    )));
                }
                Ok(())
            }
            Self::ShadowsHighlights(p) => {
                check_range("shadows amount", p.shadows_amount, -1.0, 1.0)?;
                check_range("highlights amount", p.highlights_amount, -1.0, 1.0)?;
                for (name, w) in [
                    ("shadows tone width", p.shadows_tone_width),
                    ("highlights tone width", p.highlights_tone_width),
                ] {
                    if !(w.is_finite() && w > 0.0 && w <= 1.0) {
                        return Err(GradeError::Validation(format!("{name} must be in (0, 1], got {w}")));
                    }
                }
                Ok(())
            }
            Self::Saturation(p) => {
                check_range("saturation", p.saturation, 0.0, 4.0)?;
                check_range("luma mix", p.luma_mix, 0.0, 1.0)
            }
            Self::Exposure(p) => check_range("exposure", p.stops, -10.0, 10.0),
            Self::WhiteBalance(p) => {
                check_range("temperature", p.temperature, -1.0, 1.0)?;
                check_range("tint", p.tint, -1.0, 1.0)
            }
            Self::Vibrance(p) => check_range("vibrance", p.vibrance, 0.0, 2.0),
        }
    }

    /// Resolve external references and precompute per-operation constants.
    pub(crate) fn prepare(&self, luts: Option<&dyn LutResolver>) -> GradeResult<Prepared<'_>> {
        Ok(match self {
            Self::Wheel(p) => Prepared::Cdl(p.to_cdl()),
            Self::Lut(p) => {
                let resolver = luts.ok_or_else(|| {
                    GradeError::Configuration(format!("no LUT source for '{}'", p.lut_name))
                })?;
                Prepared::Lut { lut: resolver.resolve(&p.lut_name)?, intensity: p.intensity }
            }
            Self::WhiteBalance(p) => Prepared::Matrix(white_balance_matrix(p.temperature, p.tint)?),
            other => Prepared::Direct(other),
        })
    }
}

/// An operation ready for per-pixel evaluation.
pub(crate) enum Prepared<'a> {
    Cdl(Cdl),
    Lut { lut: Arc<Lut>, intensity: f32 },
    Matrix(ConversionMatrix),
    Direct(&'a OperationKind),
}

impl Prepared<'_> {
    pub(crate) fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        match self {
            Self::Cdl(cdl) => cdl.apply(rgb),
            Self::Lut { lut, intensity } => lerp(rgb, lut.apply(rgb), *intensity),
            Self::Matrix(m) => m.apply_f32(rgb),
            Self::Direct(kind) => match kind {
                OperationKind::Curve(p) => apply_tone_curve(rgb, p),
                OperationKind::Hsl(p) => apply_hsl(rgb, p),
                OperationKind::Rgb(p) => sliders::apply_gain_offset(rgb, p.gain, p.offset),
                OperationKind::Contrast(p) => {
                    let out = sliders::apply_contrast(rgb, p.contrast, p.pivot);
                    if p.brightness == 0.0 { out } else { out.map(|v| v + p.brightness) }
                }
                OperationKind::ShadowsHighlights(p) => sliders::apply_shadows_highlights(
                    rgb,
                    p.shadows_amount,
                    p.highlights_amount,
                    p.shadows_tone_width,
                    p.highlights_tone_width,
                ),
                OperationKind::Saturation(p) => {
                    sliders::apply_saturation_hue(rgb, p.saturation, 0.0, p.luma_mix)
                }
                OperationKind::Exposure(p) => sliders::apply_exposure(rgb, p.stops),
                OperationKind::Vibrance(p) => sliders::apply_vibrance(rgb, p.vibrance),
                // Prepared into their own variants.
                OperationKind::Wheel(p) => p.to_cdl().apply(rgb),
                OperationKind::Lut(_) | OperationKind::WhiteBalance(_) => rgb,
            },
        }
    }
}

/// `a + (b − a) × t`, exact at both ends.
#[inline]
pub(crate) fn lerp(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    if t >= 1.0 {
        return b;
    }
    if t <= 0.0 {
        return a;
    }
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// One entry of a grading stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingOperation {
    #[serde(default)]
    id: OperationId,
    kind: OperationKind,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "one")]
    opacity: f32,
    /// Name of a mask supplied by the host through a [`MaskResolver`](super::stack::MaskResolver).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mask: Option<String>,
}

impl GradingOperation {
    /// Build an enabled, fully opaque operation. Curve points are sorted
    /// before validation.
    pub fn new(mut kind: OperationKind) -> GradeResult<Self> {
        if let OperationKind::Curve(curve) = &mut kind {
            curve.normalize();
        }
        kind.validate()?;
        Ok(Self {
            id: OperationId::default(),
            kind,
            enabled: true,
            opacity: 1.0,
            mask: None,
        })
    }

    pub fn with_opacity(mut self, opacity: f32) -> GradeResult<Self> {
        validate_opacity(opacity)?;
        self.opacity = opacity;
        Ok(self)
    }

    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: OperationId) {
        self.id = id;
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub(crate) fn set_opacity(&mut self, opacity: f32) -> GradeResult<()> {
        validate_opacity(opacity)?;
        self.opacity = opacity;
        Ok(())
    }

    pub fn mask(&self) -> Option<&str> {
        self.mask.as_deref()
    }

    /// Re-check a deserialized operation.
    pub fn validate(&self) -> GradeResult<()> {
        validate_opacity(self.opacity)?;
        self.kind.validate()
    }
}

fn validate_opacity(opacity: f32) -> GradeResult<()> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(GradeError::Validation(format!("opacity must be in [0, 1], got {opacity}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::curves::CurveChannel;
    use crate::lut::LutCache;

    const EPSILON: f32 = 1e-6;

    fn apply(kind: &OperationKind, rgb: [f32; 3]) -> [f32; 3] {
        kind.prepare(None).unwrap().apply(rgb)
    }

    #[test]
    fn test_new_validates_parameters() {
        let bad = OperationKind::Contrast(ContrastParams::new(0.0));
        assert!(matches!(GradingOperation::new(bad), Err(GradeError::Validation(_))));
        let bad = OperationKind::Exposure(ExposureParams { stops: f32::NAN });
        assert!(GradingOperation::new(bad).is_err());
        let op = GradingOperation::new(OperationKind::Contrast(ContrastParams::new(1.5))).unwrap();
        assert!(op.with_opacity(1.5).is_err());
    }

    #[test]
    fn test_new_sorts_curve_points() {
        let curve = CurveParams::new(CurveChannel::Rgb, vec![[1.0, 1.0], [0.0, 0.0], [0.5, 0.6]]);
        let op = GradingOperation::new(OperationKind::Curve(curve)).unwrap();
        let OperationKind::Curve(c) = op.kind() else { panic!("expected curve") };
        assert_eq!(c.points[0], [0.0, 0.0]);
        assert_eq!(c.points[2], [1.0, 1.0]);
    }

    #[test]
    fn test_contrast_then_brightness() {
        let kind = OperationKind::Contrast(ContrastParams { contrast: 1.0, brightness: 0.1, pivot: 0.5 });
        let out = apply(&kind, [0.2, 0.4, 0.6]);
        for (i, expected) in [0.3, 0.5, 0.7].iter().enumerate() {
            assert!((out[i] - expected).abs() < EPSILON, "channel {i}: {:.8} vs {:.8}", out[i], expected);
        }
    }

    #[test]
    fn test_rgb_gain_offset() {
        let kind = OperationKind::Rgb(RgbParams { gain: [2.0, 1.0, 0.5], offset: [0.0, 0.1, 0.0] });
        let out = apply(&kind, [0.25, 0.25, 0.5]);
        assert!((out[0] - 0.5).abs() < EPSILON);
        assert!((out[1] - 0.35).abs() < EPSILON);
        assert!((out[2] - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_lut_operation_needs_resolver() {
        let kind = OperationKind::Lut(LutParams { lut_name: "look".into(), intensity: 1.0 });
        assert!(matches!(kind.prepare(None), Err(GradeError::Configuration(_))));

        let cache = LutCache::default();
        let invert = crate::lut::generate(5, |rgb| rgb.map(|v| 1.0 - v), enough::Unstoppable).unwrap();
        cache.insert("look", Lut::ThreeD(invert)).unwrap();
        let prepared = kind.prepare(Some(&cache)).unwrap();
        let out = prepared.apply([0.0, 1.0, 0.0]);
        assert_eq!(out, [1.0, 0.0, 1.0]);

        let half = OperationKind::Lut(LutParams { lut_name: "look".into(), intensity: 0.5 });
        let out = half.prepare(Some(&cache)).unwrap().apply([0.0, 1.0, 0.0]);
        for v in out {
            assert!((v - 0.5).abs() < EPSILON);
        }
    }

    #[test]
    fn test_white_balance_warms() {
        let kind = OperationKind::WhiteBalance(WhiteBalanceParams { temperature: 0.5, tint: 0.0 });
        let out = apply(&kind, [0.5; 3]);
        assert!(out[0] > out[2], "{out:?}");
    }

    #[test]
    fn test_lerp_is_exact_at_ends() {
        let a = [0.1, 0.2, 0.3];
        let b = [0.7, 0.8, 0.9];
        assert_eq!(lerp(a, b, 0.0), a);
        assert_eq!(lerp(a, b, 1.0), b);
    }

    #[test]
    fn test_json_shape() {
        let op = GradingOperation::new(OperationKind::Exposure(ExposureParams { stops: 1.0 })).unwrap();
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"]["type"], "exposure");
        assert_eq!(json["kind"]["params"]["stops"], 1.0);
        let back: GradingOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
