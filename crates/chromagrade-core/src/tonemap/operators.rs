//! Global tone-mapping operators.
//!
//! Input samples are linear with 1.0 = 10000 cd/m². Output samples are
//! linear with 1.0 = the target peak. Clamping to `[0, 1]` happens in the
//! mapper after saturation preservation.
//!
//! Curve operators (Filmic, ACES, Hable) work per channel on values relative
//! to the target peak. Luminance operators (Reinhard, Drago) remap luminance
//! and scale RGB by the ratio `L' / L`.

use rayon::prelude::*;

use super::metadata::HdrMetadata;
use super::settings::ToneMappingSettings;
use crate::color_management::transfer::PQ_MAX_LUMINANCE;

/// Offset keeping logs and ratios finite.
pub(crate) const LOG_EPSILON: f64 = 1e-8;

/// Narkowicz fit of the ACES RRT+ODT.
const ACES_A: f64 = 2.51;
const ACES_B: f64 = 0.03;
const ACES_C: f64 = 2.43;
const ACES_D: f64 = 0.59;
const ACES_E: f64 = 0.14;

/// Everything an operator needs besides the pixels.
#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
    pub width: usize,
    pub height: usize,
    pub luma: [f64; 3],
    pub metadata: &'a HdrMetadata,
    pub settings: &'a ToneMappingSettings,
}

impl MapContext<'_> {
    /// Factor taking normalized input to target-relative units, exposure included.
    pub fn relative_gain(&self) -> f64 {
        PQ_MAX_LUMINANCE / self.settings.target_peak_luminance * self.settings.exposure_gain()
    }
}

/// Non-negative weighted luminance.
#[inline]
pub(crate) fn luminance(px: [f32; 3], luma: [f64; 3]) -> f64 {
    (luma[0] * px[0] as f64 + luma[1] * px[1] as f64 + luma[2] * px[2] as f64).max(0.0)
}

/// Geometric mean `exp(mean(ln(L + ε)))`.
pub(crate) fn log_average(lum: &[f64]) -> f64 {
    if lum.is_empty() {
        return LOG_EPSILON;
    }
    let sum: f64 = lum.par_iter().map(|&l| (l.max(0.0) + LOG_EPSILON).ln()).sum();
    (sum / lum.len() as f64).exp()
}

/// `px × gain × (l_out / l_in)`.
#[inline]
pub(crate) fn scale_pixel(px: [f32; 3], gain: f64, l_in: f64, l_out: f64) -> [f32; 3] {
    let k = gain * l_out / (l_in + LOG_EPSILON);
    [
        (px[0] as f64 * k) as f32,
        (px[1] as f64 * k) as f32,
        (px[2] as f64 * k) as f32,
    ]
}

/// Reinhard global operator keyed to the log-average luminance.
///
/// ```text
/// key   = exp(mean(ln(L + ε)))
/// scale = (target_peak / 10000) / key
/// L'    = L·scale / (1 + L·scale)
/// ```
pub fn reinhard(pixels: &[[f32; 3]], ctx: &MapContext<'_>) -> Vec<[f32; 3]> {
    let gain = ctx.settings.exposure_gain();
    let lum: Vec<f64> = pixels.par_iter().map(|&px| luminance(px, ctx.luma) * gain).collect();
    let key = log_average(&lum);
    let scale = (ctx.settings.target_peak_luminance / PQ_MAX_LUMINANCE) / key;

    pixels
        .par_iter()
        .zip(lum.par_iter())
        .map(|(&px, &l)| {
            let ls = l * scale;
            scale_pixel(px, gain, l, ls / (1.0 + ls))
        })
        .collect()
}

/// Six-constant filmic curve, unnormalized.
pub fn filmic(pixels: &[[f32; 3]], ctx: &MapContext<'_>) -> Vec<[f32; 3]> {
    let gain = ctx.relative_gain();
    let curve = ctx.settings.curve;
    pixels
        .par_iter()
        .map(|px| px.map(|v| curve.eval((v as f64 * gain).max(0.0)) as f32))
        .collect()
}

/// Filmic curve normalized so the white point `W` maps to 1.0.
pub fn hable(pixels: &[[f32; 3]], ctx: &MapContext<'_>) -> Vec<[f32; 3]> {
    let gain = ctx.relative_gain();
    let curve = ctx.settings.curve;
    let white = curve.eval(curve.white_point);
    pixels
        .par_iter()
        .map(|px| px.map(|v| (curve.eval((v as f64 * gain).max(0.0)) / white) as f32))
        .collect()
}

/// ACES filmic approximation `x(ax + b) / (x(cx + d) + e)`.
pub fn aces(pixels: &[[f32; 3]], ctx: &MapContext<'_>) -> Vec<[f32; 3]> {
    let gain = ctx.relative_gain();
    pixels
        .par_iter()
        .map(|px| px.map(|v| aces_curve((v as f64 * gain).max(0.0)) as f32))
        .collect()
}

#[inline]
pub(crate) fn aces_curve(x: f64) -> f64 {
    (x * (ACES_A * x + ACES_B)) / (x * (ACES_C * x + ACES_D) + ACES_E)
}

/// Drago adaptive logarithmic mapping, keyed to the log-average luminance.
///
/// ```text
/// Lw     = L / key,   Lw_max = max(L_max, peak) / key
/// L'     = ln(Lw + 1) / (log10(Lw_max + 1) · ln(2 + 8·(Lw / Lw_max)^(ln b / ln 0.5)))
/// ```
///
/// `L' = 1` at `Lw = Lw_max`.
///
/// # Reference
/// Drago et al. (2003), Adaptive Logarithmic Mapping for Displaying High
/// Contrast Scenes
pub fn drago(pixels: &[[f32; 3]], ctx: &MapContext<'_>) -> Vec<[f32; 3]> {
    let gain = ctx.settings.exposure_gain();
    let lum: Vec<f64> = pixels.par_iter().map(|&px| luminance(px, ctx.luma) * gain).collect();
    let key = log_average(&lum);

    let frame_max = lum.par_iter().cloned().reduce(|| 0.0, f64::max);
    let declared_max = ctx.metadata.max_luminance / PQ_MAX_LUMINANCE * gain;
    let lw_max = (frame_max.max(declared_max) / key).max(LOG_EPSILON);
    let exponent = ctx.settings.drago_bias.ln() / 0.5_f64.ln();
    let denom_max = (lw_max + 1.0).log10();

    pixels
        .par_iter()
        .zip(lum.par_iter())
        .map(|(&px, &l)| {
            let lw = l / key;
            let bias = 2.0 + 8.0 * (lw / lw_max).powf(exponent);
            let mapped = (lw + 1.0).ln() / (denom_max * bias.ln());
            scale_pixel(px, gain, l, mapped)
        })
        .collect()
}
