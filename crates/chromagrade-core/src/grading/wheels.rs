//! Lift/Gamma/Gain/Offset color wheels.
//!
//! Three tonal wheels (shadows, midtones, highlights) are reduced to an
//! extended ASC CDL with a separate lift term:
//!
//! ```text
//!   combined_gain   = gain[c] × gain[master]
//!   combined_lift   = lift[c] + lift[master]
//!   combined_offset = offset[c] + offset[master]
//!   combined_gamma  = gamma[c] × gamma[master]
//!
//!   x   = in × (combined_gain − combined_lift) + combined_lift + combined_offset
//!   out = pow(max(x, 0), 1 / combined_gamma)
//! ```
//!
//! Black maps to `lift`, white maps to `gain`, and gamma bends the midtones
//! between them.

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};

/// One tonal wheel. `hue` is in degrees, `saturation` in `[0, 1]` sets how
/// far the puck sits from center, and `level` in `[-1, 1]` is the master ring.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Wheel {
    #[serde(default)]
    pub hue: f32,
    #[serde(default)]
    pub saturation: f32,
    #[serde(default)]
    pub level: f32,
}

impl Wheel {
    pub fn level(level: f32) -> Self {
        Self { level, ..Self::default() }
    }

    pub fn tint(hue: f32, saturation: f32) -> Self {
        Self { hue, saturation, level: 0.0 }
    }

    /// Zero-sum RGB direction for the puck position, at most 0.2 per channel.
    fn direction(&self) -> [f32; 3] {
        if self.saturation == 0.0 {
            return [0.0; 3];
        }
        let h = self.hue.to_radians();
        let third = std::f32::consts::TAU / 3.0;
        let scale = 0.2 * self.saturation;
        [h.cos() * scale, (h - third).cos() * scale, (h - 2.0 * third).cos() * scale]
    }

    fn validate(&self, name: &str) -> GradeResult<()> {
        if !self.hue.is_finite() {
            return Err(GradeError::Validation(format!("{name} hue must be finite")));
        }
        if !(0.0..=1.0).contains(&self.saturation) {
            return Err(GradeError::Validation(format!(
                "{name} saturation must be in [0, 1], got {}",
                self.saturation
            )));
        }
        if !(-1.0..=1.0).contains(&self.level) {
            return Err(GradeError::Validation(format!(
                "{name} level must be in [-1, 1], got {}",
                self.level
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelParams {
    #[serde(default)]
    pub shadows: Wheel,
    #[serde(default)]
    pub midtones: Wheel,
    #[serde(default)]
    pub highlights: Wheel,
}

/// CDL coefficients, each `[R, G, B, Master]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cdl {
    pub lift: [f32; 4],
    pub gamma: [f32; 4],
    pub gain: [f32; 4],
    pub offset: [f32; 4],
}

impl Default for Cdl {
    fn default() -> Self {
        Self {
            lift: [0.0; 4],
            gamma: [1.0; 4],
            gain: [1.0; 4],
            offset: [0.0; 4],
        }
    }
}

impl Cdl {
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        apply_cdl(rgb, &self.lift, &self.gamma, &self.gain, &self.offset)
    }
}

impl WheelParams {
    pub fn validate(&self) -> GradeResult<()> {
        self.shadows.validate("shadows")?;
        self.midtones.validate("midtones")?;
        self.highlights.validate("highlights")
    }

    /// Shadows drive lift, midtones drive gamma, highlights drive gain.
    pub fn to_cdl(&self) -> Cdl {
        let s = self.shadows.direction();
        let m = self.midtones.direction();
        let h = self.highlights.direction();
        Cdl {
            lift: [s[0], s[1], s[2], self.shadows.level],
            gamma: [m[0].exp2(), m[1].exp2(), m[2].exp2(), self.midtones.level.exp2()],
            gain: [1.0 + h[0], 1.0 + h[1], 1.0 + h[2], 1.0 + self.highlights.level],
            offset: [0.0; 4],
        }
    }
}

/// Apply ASC CDL transform with lift separation.
///
/// Each parameter is `[R, G, B, Master]` where master multiplies (gain, gamma)
/// or adds (lift, offset) to per-channel values.
pub fn apply_cdl(
    rgb: [f32; 3],
    lift: &[f32; 4],
    gamma: &[f32; 4],
    gain: &[f32; 4],
    offset: &[f32; 4],
) -> [f32; 3] {
    let mut out = [0.0_f32; 3];
    for c in 0..3 {
        let combined_gain = gain[c] * gain[3];
        let combined_lift = lift[c] + lift[3];
        let combined_offset = offset[c] + offset[3];
        let combined_gamma = gamma[c] * gamma[3];

        let x = rgb[c] * (combined_gain - combined_lift) + combined_lift + combined_offset;

        // Clamp to zero before power to avoid NaN from negative bases
        let clamped = x.max(0.0);

        // gamma > 1 brightens midtones, gamma < 1 darkens them
        out[c] = if combined_gamma > 0.0 && combined_gamma != 1.0 {
            clamped.powf(1.0 / combined_gamma)
        } else {
            clamped
        };
    }
    out
}
