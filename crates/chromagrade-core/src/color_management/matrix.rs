//! 3x3 color matrices: RGB↔XYZ derivation and Bradford chromatic adaptation.
//!
//! # Reference
//! - SMPTE RP 177-1993: Derivation of Basic Television Color Equations
//! - Lindbloom, Bruce J.: Bradford chromatic adaptation

use glam::{DMat3, DVec3};

use super::profile::{Chromaticity, Primaries};
use crate::error::{GradeError, GradeResult};

/// Matrices with |det| below this are treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-10;

/// Bradford cone response matrix (row-major).
const BRADFORD: [[f64; 3]; 3] = [
    [0.8951, 0.2664, -0.1614],
    [-0.7502, 1.7135, 0.0367],
    [0.0389, -0.0685, 1.0296],
];

/// A 3x3 float64 matrix for linear color conversions.
///
/// Stored as a column-major [`DMat3`]; [`from_rows`](Self::from_rows) takes
/// the row-major layout used in published tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionMatrix(pub DMat3);

impl ConversionMatrix {
    /// Returns the identity matrix (no-op transform).
    pub fn identity() -> Self {
        Self(DMat3::IDENTITY)
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self(DMat3::from_cols_array_2d(&rows).transpose())
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        self.0.transpose().to_cols_array_2d()
    }

    pub fn determinant(&self) -> f64 {
        self.0.determinant()
    }

    /// Fails with [`GradeError::Numerical`] when the matrix is (near-)singular.
    pub fn check_invertible(&self) -> GradeResult<()> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return Err(GradeError::Numerical(format!(
                "singular color matrix (det = {det:e})"
            )));
        }
        Ok(())
    }

    pub fn inverse(&self) -> GradeResult<Self> {
        self.check_invertible()?;
        Ok(Self(self.0.inverse()))
    }

    /// `other ∘ self`: apply `self` first, then `other`.
    pub fn then(&self, other: &Self) -> Self {
        Self(other.0 * self.0)
    }

    /// Apply this matrix to an RGB or XYZ triplet.
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        (self.0 * DVec3::from_array(v)).to_array()
    }

    pub fn apply_f32(&self, v: [f32; 3]) -> [f32; 3] {
        let out = self.apply([v[0] as f64, v[1] as f64, v[2] as f64]);
        [out[0] as f32, out[1] as f32, out[2] as f32]
    }

    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.0.abs_diff_eq(DMat3::IDENTITY, tolerance)
    }
}

/// Derive the RGB→XYZ matrix for a set of primaries.
///
/// ```text
/// P = [XYZ_r XYZ_g XYZ_b]     (columns, Y = 1)
/// S = P⁻¹ · XYZ_white
/// RGB→XYZ = P · diag(S)
/// ```
pub fn rgb_to_xyz(primaries: &Primaries) -> GradeResult<ConversionMatrix> {
    let p = DMat3::from_cols(
        DVec3::from_array(primaries.red.to_xyz()),
        DVec3::from_array(primaries.green.to_xyz()),
        DVec3::from_array(primaries.blue.to_xyz()),
    );
    let p = ConversionMatrix(p);
    p.check_invertible()?;

    let white = DVec3::from_array(primaries.white.to_xyz());
    let s = p.0.inverse() * white;
    let m = DMat3::from_cols(p.0.x_axis * s.x, p.0.y_axis * s.y, p.0.z_axis * s.z);
    tracing::debug!("derived RGB→XYZ matrix, scale = {s:?}");
    Ok(ConversionMatrix(m))
}

pub fn xyz_to_rgb(primaries: &Primaries) -> GradeResult<ConversionMatrix> {
    rgb_to_xyz(primaries)?.inverse()
}

/// Bradford adaptation from `src` white to `dst` white, in XYZ.
///
/// ```text
/// M_adapt = M⁻¹ · diag(ρβγ_dst / ρβγ_src) · M
/// ```
pub fn bradford(src: Chromaticity, dst: Chromaticity) -> GradeResult<ConversionMatrix> {
    let m = ConversionMatrix::from_rows(BRADFORD);
    let m_inv = m.inverse()?;

    let src_cone = m.0 * DVec3::from_array(src.to_xyz());
    let dst_cone = m.0 * DVec3::from_array(dst.to_xyz());
    if src_cone.min_element().abs() < SINGULAR_EPSILON {
        return Err(GradeError::Numerical(
            "source white has a zero cone response".into(),
        ));
    }
    let scale = DMat3::from_diagonal(dst_cone / src_cone);
    Ok(ConversionMatrix(m_inv.0 * scale * m.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color_management::profile::Illuminant;

    const EPSILON: f64 = 1e-4;

    #[test]
    fn test_srgb_to_xyz_matches_matrix_derived_from_d65_xy() {
        let m = rgb_to_xyz(&Primaries::REC709).unwrap().to_rows();
        // Exact for white xy (0.3127, 0.3290). The four-digit IEC table uses
        // XYZ white (0.95047, 1, 1.08883) and differs by 2.3e-4 in Z.
        let expected = [
            [0.412391, 0.357584, 0.180481],
            [0.212639, 0.715169, 0.072192],
            [0.019331, 0.119195, 0.950532],
        ];
        for r in 0..3 {
            for c in 0..3 {
                assert!(
                    (m[r][c] - expected[r][c]).abs() < EPSILON,
                    "m[{r}][{c}]: {:.6} vs {:.6}",
                    m[r][c],
                    expected[r][c]
                );
            }
        }
    }

    #[test]
    fn test_rgb_white_maps_to_reference_white() {
        let m = rgb_to_xyz(&Primaries::REC2020).unwrap();
        let xyz = m.apply([1.0, 1.0, 1.0]);
        let white = Illuminant::D65.chromaticity().to_xyz();
        for i in 0..3 {
            assert!((xyz[i] - white[i]).abs() < 1e-9, "component {i}");
        }
    }

    #[test]
    fn test_collinear_primaries_are_singular() {
        let primaries = Primaries::new(
            (0.2, 0.2),
            (0.3, 0.3),
            (0.4, 0.4),
            Illuminant::D65.chromaticity(),
        );
        let err = rgb_to_xyz(&primaries).unwrap_err();
        assert!(matches!(err, GradeError::Numerical(_)));
    }

    #[test]
    fn test_bradford_same_white_is_identity() {
        let d65 = Illuminant::D65.chromaticity();
        let m = bradford(d65, d65).unwrap();
        assert!(m.is_identity(1e-9));
    }

    #[test]
    fn test_bradford_maps_source_white_to_destination_white() {
        let d65 = Illuminant::D65.chromaticity();
        let d50 = Illuminant::D50.chromaticity();
        let m = bradford(d65, d50).unwrap();
        let out = m.apply(d65.to_xyz());
        let expected = d50.to_xyz();
        for i in 0..3 {
            assert!(
                (out[i] - expected[i]).abs() < 1e-9,
                "component {i}: {:.10} vs {:.10}",
                out[i],
                expected[i]
            );
        }
    }

    #[test]
    fn test_then_composes_in_application_order() {
        let scale = ConversionMatrix::from_rows([[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let swap = ConversionMatrix::from_rows([[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let composed = scale.then(&swap);
        assert_eq!(composed.apply([1.0, 0.0, 0.0]), [0.0, 2.0, 0.0]);
    }
}
