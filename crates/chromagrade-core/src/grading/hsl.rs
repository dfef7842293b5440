//! HSL conversion and the hue/saturation/lightness adjustment.

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};

/// `hue_shift` is a fraction of a full turn in `[-1, 1]`; saturation and
/// lightness are multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HslParams {
    #[serde(default)]
    pub hue_shift: f32,
    #[serde(default = "one")]
    pub saturation: f32,
    #[serde(default = "one")]
    pub lightness: f32,
}

fn one() -> f32 {
    1.0
}

impl Default for HslParams {
    fn default() -> Self {
        Self { hue_shift: 0.0, saturation: 1.0, lightness: 1.0 }
    }
}

impl HslParams {
    pub fn validate(&self) -> GradeResult<()> {
        if !(-1.0..=1.0).contains(&self.hue_shift) {
            return Err(GradeError::Validation(format!(
                "hue shift must be in [-1, 1], got {}",
                self.hue_shift
            )));
        }
        for (name, v) in [("saturation", self.saturation), ("lightness", self.lightness)] {
            if !v.is_finite() || v < 0.0 {
                return Err(GradeError::Validation(format!(
                    "HSL {name} must be a non-negative multiplier, got {v}"
                )));
            }
        }
        Ok(())
    }

    pub fn is_identity(&self) -> bool {
        self.hue_shift == 0.0 && self.saturation == 1.0 && self.lightness == 1.0
    }
}

/// Shift hue and scale saturation and lightness. S and L are clamped to `[0, 1]`.
pub fn apply_hsl(rgb: [f32; 3], params: &HslParams) -> [f32; 3] {
    if params.is_identity() {
        return rgb;
    }
    let (h, s, l) = rgb_to_hsl(rgb);
    let h = (h + params.hue_shift * 360.0).rem_euclid(360.0);
    let s = (s * params.saturation).clamp(0.0, 1.0);
    let l = (l * params.lightness).clamp(0.0, 1.0);
    hsl_to_rgb(h, s, l)
}

/// Convert RGB to HSL (hue in degrees, saturation and lightness in 0..1).
pub fn rgb_to_hsl(rgb: [f32; 3]) -> (f32, f32, f32) {
    let [r, g, b] = rgb;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lum = (max + min) * 0.5;

    if (max - min).abs() < 1e-10 {
        return (0.0, 0.0, lum);
    }

    let delta = max - min;
    let sat = if lum > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let hue = if (max - r).abs() < 1e-10 {
        ((g - b) / delta) % 6.0
    } else if (max - g).abs() < 1e-10 {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    let hue = hue * 60.0;
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    (hue, sat, lum)
}

/// Convert HSL to RGB.
pub fn hsl_to_rgb(hue: f32, sat: f32, lum: f32) -> [f32; 3] {
    if sat.abs() < 1e-10 {
        return [lum, lum, lum];
    }

    let q = if lum < 0.5 {
        lum * (1.0 + sat)
    } else {
        lum + sat - lum * sat
    };
    let p = 2.0 * lum - q;
    let h = hue / 360.0;

    [
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    ]
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}
