//! White balance adjustment via chromaticity shift.
//!
//! Temperature shifts the destination white along the Planckian locus tangent
//! (blue-yellow axis) in CIE xy; tint shifts it perpendicular to the locus
//! (green-magenta axis). The shift is applied as a Bradford adaptation in the
//! Rec.709 linear space.
//!
//! # Reference
//! - Hernández-Andrés et al. (1999), Planckian locus approximation
//! - McCamy, C. S. (1992), Correlated color temperature as an explicit function
//!   of chromaticity coordinates

use super::matrix::{ConversionMatrix, bradford, rgb_to_xyz};
use super::profile::{Chromaticity, Illuminant, Primaries};
use crate::error::GradeResult;

/// Planckian locus tangent at D65, in xy.
const TANGENT: (f64, f64) = (0.3585, 0.1501);
const TEMP_SCALE: f64 = 0.05;
const TINT_SCALE: f64 = 0.05;

/// Build the linear Rec.709 matrix for a temperature/tint pair.
///
/// - `temperature`: 0.0 = neutral. Positive warms (toward yellow), negative
///   cools (toward blue). Roughly −1.0..=1.0.
/// - `tint`: 0.0 = neutral. Positive shifts toward magenta, negative toward green.
///
/// # Algorithm
/// 1. Offset D65 along the locus tangent by `temperature`
/// 2. Offset perpendicular to the tangent by `tint`
/// 3. Compose RGB→XYZ, Bradford(D65 → shifted), XYZ→RGB
pub fn white_balance_matrix(temperature: f32, tint: f32) -> GradeResult<ConversionMatrix> {
    if temperature.abs() < 1e-7 && tint.abs() < 1e-7 {
        return Ok(ConversionMatrix::identity());
    }

    let reference = Illuminant::D65.chromaticity();
    let (perp_x, perp_y) = (-TANGENT.1, TANGENT.0);

    let t = temperature as f64 * TEMP_SCALE;
    let p = tint as f64 * TINT_SCALE;
    let target = Chromaticity::new(
        reference.x + TANGENT.0 * t + perp_x * p,
        reference.y + TANGENT.1 * t + perp_y * p,
    );

    let to_xyz = rgb_to_xyz(&Primaries::REC709)?;
    let from_xyz = to_xyz.inverse()?;
    let cat = bradford(reference, target)?;
    Ok(to_xyz.then(&cat).then(&from_xyz))
}

/// Apply white balance to a single linear Rec.709 pixel.
///
/// Both values at 0.0 produce no change (identity).
pub fn apply_white_balance(rgb: [f32; 3], temperature: f32, tint: f32) -> GradeResult<[f32; 3]> {
    if temperature.abs() < 1e-7 && tint.abs() < 1e-7 {
        return Ok(rgb);
    }
    Ok(white_balance_matrix(temperature, tint)?.apply_f32(rgb))
}

/// Correlated color temperature of an xy chromaticity (McCamy's cubic),
/// clamped to 1000–40000 K.
///
/// ```text
/// n   = (x − 0.3320) / (y − 0.1858)
/// CCT = −449 n³ + 3525 n² − 6823.3 n + 5520.33
/// ```
pub fn correlated_color_temperature(xy: Chromaticity) -> f64 {
    let n = (xy.x - 0.3320) / (xy.y - 0.1858);
    let cct = -449.0 * n.powi(3) + 3525.0 * n.powi(2) - 6823.3 * n + 5520.33;
    cct.clamp(1000.0, 40_000.0)
}
