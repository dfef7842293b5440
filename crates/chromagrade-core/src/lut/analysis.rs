//! Characterize what a LUT does to neutrals, saturation and tone.

use serde::{Deserialize, Serialize};

use super::Lut;

/// Mean HSV saturation change over off-axis samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SaturationChange {
    pub average_change: f64,
    pub max_increase: f64,
    pub max_decrease: f64,
}

/// Standard deviation of a gray ramp before and after the LUT.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContrastChange {
    pub original: f64,
    pub processed: f64,
    pub ratio: f64,
}

/// Power-law fit of the gray response, overall and per tonal third.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GammaEstimate {
    pub overall: f64,
    pub shadows: f64,
    pub midtones: f64,
    pub highlights: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LutAnalysis {
    /// Mean `output − input` per channel over five neutral grays.
    pub neutral_shift: [f64; 3],
    pub saturation: SaturationChange,
    pub contrast: ContrastChange,
    pub gamma: GammaEstimate,
}

const NEUTRAL_SAMPLES: usize = 5;
const RAMP_STEPS: usize = 256;
const HUE_STEP: usize = 32;

impl LutAnalysis {
    pub fn of(lut: &Lut) -> Self {
        let ramp: Vec<(f64, f64)> = (0..RAMP_STEPS)
            .map(|i| {
                let v = i as f32 / (RAMP_STEPS - 1) as f32;
                (v as f64, lut.apply([v; 3])[0] as f64)
            })
            .collect();

        Self {
            neutral_shift: neutral_shift(lut),
            saturation: saturation_change(lut),
            contrast: contrast_change(&ramp),
            gamma: gamma_estimate(&ramp),
        }
    }

    /// `true` when the LUT leaves grays on the neutral axis within `tolerance`.
    pub fn is_neutral(&self, tolerance: f64) -> bool {
        self.neutral_shift.iter().all(|d| d.abs() <= tolerance)
    }
}

fn neutral_shift(lut: &Lut) -> [f64; 3] {
    let mut sum = [0.0; 3];
    for i in 0..NEUTRAL_SAMPLES {
        let v = i as f32 / (NEUTRAL_SAMPLES - 1) as f32;
        let out = lut.apply([v; 3]);
        for c in 0..3 {
            sum[c] += out[c] as f64 - v as f64;
        }
    }
    sum.map(|s| s / NEUTRAL_SAMPLES as f64)
}

fn hsv_saturation(rgb: [f32; 3]) -> f64 {
    let max = rgb[0].max(rgb[1]).max(rgb[2]) as f64;
    let min = rgb[0].min(rgb[1]).min(rgb[2]) as f64;
    if max > 0.0 { (max - min) / max } else { 0.0 }
}

fn saturation_change(lut: &Lut) -> SaturationChange {
    let mut count = 0usize;
    let mut total = 0.0;
    let mut max_increase = f64::NEG_INFINITY;
    let mut max_decrease = f64::NEG_INFINITY;

    for r in (0..256).step_by(HUE_STEP) {
        for g in (0..256).step_by(HUE_STEP) {
            for b in (0..256).step_by(HUE_STEP) {
                if r == g && g == b {
                    continue;
                }
                let rgb = [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0];
                let delta = hsv_saturation(lut.apply(rgb)) - hsv_saturation(rgb);
                total += delta;
                max_increase = max_increase.max(delta);
                max_decrease = max_decrease.max(-delta);
                count += 1;
            }
        }
    }

    SaturationChange {
        average_change: total / count as f64,
        max_increase,
        max_decrease,
    }
}

fn std_dev(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    (values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
}

fn contrast_change(ramp: &[(f64, f64)]) -> ContrastChange {
    let original = std_dev(ramp.iter().map(|p| p.0));
    let processed = std_dev(ramp.iter().map(|p| p.1));
    ContrastChange {
        original,
        processed,
        ratio: if original > 0.0 { processed / original } else { 1.0 },
    }
}

/// Least-squares slope of `ln(out)` against `ln(in)`. Non-positive samples are skipped.
fn fit_gamma(points: &[(f64, f64)]) -> f64 {
    let logs: Vec<(f64, f64)> = points
        .iter()
        .filter(|(x, y)| *x > 0.0 && *y > 0.0)
        .map(|(x, y)| (x.ln(), y.ln()))
        .collect();
    if logs.len() < 2 {
        return 1.0;
    }
    let n = logs.len() as f64;
    let mx = logs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = logs.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = logs.iter().map(|p| (p.0 - mx) * (p.0 - mx)).sum();
    let sxy: f64 = logs.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    if sxx > 0.0 { sxy / sxx } else { 1.0 }
}

fn gamma_estimate(ramp: &[(f64, f64)]) -> GammaEstimate {
    let third = ramp.len() / 3;
    GammaEstimate {
        overall: fit_gamma(ramp),
        shadows: fit_gamma(&ramp[..third]),
        midtones: fit_gamma(&ramp[third..2 * third]),
        highlights: fit_gamma(&ramp[2 * third..]),
    }
}
