//! Spline-based tone curves.
//!
//! Implements Catmull-Rom spline interpolation for smooth curves through
//! user-defined control points, applied to luma, a single channel, or all
//! three channels at once.
//!
//! # Algorithm
//! Catmull-Rom splines (1974) provide C1 continuity through control points.
//! For each segment between P1 and P2, with neighbors P0 and P3:
//! ```text
//! q(t) = 0.5 × ((2×P1) + (-P0 + P2)×t + (2×P0 - 5×P1 + 4×P2 - P3)×t² + (-P0 + 3×P1 - 3×P2 + P3)×t³)
//! ```
//!
//! # Complexity
//! - Evaluate: O(log N) binary search + O(1) interpolation
//! - Bake to 1D LUT: O(N × size)

use serde::{Deserialize, Serialize};

use super::sliders::luma;
use crate::error::{GradeError, GradeResult};
use crate::lut::Lut1D;

/// Evaluates cubic Catmull-Rom spline curves from control points.
///
/// Control points are `[x, y]` pairs sorted by x-coordinate.
/// The curve passes through all control points with smooth interpolation.
///
/// # Performance
/// Borrows control points to avoid heap allocations in hot paths
/// (e.g. per-pixel evaluation during LUT generation).
pub struct CurveEvaluator<'a> {
    /// Control points as `[x, y]` pairs, sorted by x.
    pub control_points: &'a [[f32; 2]],
}

impl CurveEvaluator<'_> {
    /// Evaluate the curve at position `t`.
    ///
    /// Values outside the control point range are clamped to the
    /// first/last control point's y-value.
    ///
    /// Returns `t` (identity) if fewer than 2 control points.
    pub fn evaluate(&self, t: f32) -> f32 {
        let pts = &self.control_points;
        if pts.len() < 2 {
            return t;
        }

        if t <= pts[0][0] {
            return pts[0][1];
        }
        if t >= pts[pts.len() - 1][0] {
            return pts[pts.len() - 1][1];
        }

        // Binary search for the segment containing t
        let mut lo = 0;
        let mut hi = pts.len() - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if pts[mid][0] <= t {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let p1 = pts[lo];
        let p2 = pts[hi];

        // Virtual endpoints: mirror at boundaries
        let p0 = if lo > 0 {
            pts[lo - 1]
        } else {
            [2.0 * p1[0] - p2[0], 2.0 * p1[1] - p2[1]]
        };
        let p3 = if hi < pts.len() - 1 {
            pts[hi + 1]
        } else {
            [2.0 * p2[0] - p1[0], 2.0 * p2[1] - p1[1]]
        };

        let segment_t = (t - p1[0]) / (p2[0] - p1[0]);
        catmull_rom(p0[1], p1[1], p2[1], p3[1], segment_t)
    }
}

/// Catmull-Rom cubic interpolation between P1 and P2.
fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

/// Which signal a tone curve drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveChannel {
    /// Rec. 709 luma; RGB is scaled by the luma ratio so hue is kept.
    Luma,
    Red,
    Green,
    Blue,
    /// Same curve on every channel.
    #[default]
    Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveParams {
    #[serde(default)]
    pub channel: CurveChannel,
    pub points: Vec<[f32; 2]>,
}

impl CurveParams {
    pub const MAX_POINTS: usize = 64;

    pub fn new(channel: CurveChannel, points: Vec<[f32; 2]>) -> Self {
        Self { channel, points }
    }

    /// Sort points by x. Validation still rejects duplicate x.
    pub fn normalize(&mut self) {
        self.points.sort_by(|a, b| a[0].total_cmp(&b[0]));
    }

    pub fn validate(&self) -> GradeResult<()> {
        if self.points.len() < 2 {
            return Err(GradeError::Validation(format!(
                "curve needs at least 2 points, got {}",
                self.points.len()
            )));
        }
        if self.points.len() > Self::MAX_POINTS {
            return Err(GradeError::Validation(format!(
                "curve has {} points, at most {} allowed",
                self.points.len(),
                Self::MAX_POINTS
            )));
        }
        for p in &self.points {
            if !(0.0..=1.0).contains(&p[0]) || !p[1].is_finite() {
                return Err(GradeError::Validation(format!(
                    "curve point ({}, {}) needs x in [0, 1] and finite y",
                    p[0], p[1]
                )));
            }
        }
        if self.points.windows(2).any(|w| w[1][0] <= w[0][0]) {
            return Err(GradeError::Validation(
                "curve points must have strictly increasing x".to_string(),
            ));
        }
        Ok(())
    }

    pub fn evaluator(&self) -> CurveEvaluator<'_> {
        CurveEvaluator { control_points: &self.points }
    }

    /// Bake the curve into a 1D LUT of `size` entries.
    pub fn bake(&self, size: usize) -> GradeResult<Lut1D> {
        let eval = self.evaluator();
        Lut1D::from_fn(size, |x| eval.evaluate(x))
    }
}

/// Apply a tone curve to one pixel.
pub fn apply_tone_curve(rgb: [f32; 3], params: &CurveParams) -> [f32; 3] {
    let eval = params.evaluator();
    match params.channel {
        CurveChannel::Rgb => rgb.map(|v| eval.evaluate(v)),
        CurveChannel::Red => [eval.evaluate(rgb[0]), rgb[1], rgb[2]],
        CurveChannel::Green => [rgb[0], eval.evaluate(rgb[1]), rgb[2]],
        CurveChannel::Blue => [rgb[0], rgb[1], eval.evaluate(rgb[2])],
        CurveChannel::Luma => {
            let y = luma(rgb);
            let mapped = eval.evaluate(y);
            if y > 1e-6 {
                let ratio = mapped / y;
                rgb.map(|v| v * ratio)
            } else {
                rgb.map(|v| v + (mapped - y))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn s_curve(channel: CurveChannel) -> CurveParams {
        CurveParams::new(channel, vec![[0.0, 0.0], [0.25, 0.15], [0.75, 0.85], [1.0, 1.0]])
    }

    #[test]
    fn test_catmull_rom_endpoints() {
        let v = catmull_rom(0.0, 0.25, 0.75, 1.0, 0.0);
        assert!((v - 0.25).abs() < EPSILON);
        let v = catmull_rom(0.0, 0.25, 0.75, 1.0, 1.0);
        assert!((v - 0.75).abs() < EPSILON);
    }

    #[test]
    fn test_curve_evaluator_identity_with_two_points() {
        let points = [[0.0, 0.0], [1.0, 1.0]];
        let eval = CurveEvaluator { control_points: &points };
        assert!((eval.evaluate(0.0) - 0.0).abs() < EPSILON);
        assert!((eval.evaluate(0.5) - 0.5).abs() < 0.01);
        assert!((eval.evaluate(1.0) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_curve_evaluator_fewer_than_two_points_is_identity() {
        let eval = CurveEvaluator { control_points: &[] };
        assert!((eval.evaluate(0.5) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_curve_passes_through_points() {
        let curve = s_curve(CurveChannel::Rgb);
        let eval = curve.evaluator();
        for p in &curve.points {
            assert!((eval.evaluate(p[0]) - p[1]).abs() < EPSILON, "{p:?}");
        }
    }

    #[test]
    fn test_single_channel_curve_leaves_others() {
        let out = apply_tone_curve([0.25, 0.25, 0.25], &s_curve(CurveChannel::Green));
        assert_eq!(out[0], 0.25);
        assert_eq!(out[2], 0.25);
        assert!((out[1] - 0.15).abs() < EPSILON);
    }

    #[test]
    fn test_luma_curve_keeps_channel_ratios() {
        let rgb = [0.4, 0.2, 0.1];
        let out = apply_tone_curve(rgb, &s_curve(CurveChannel::Luma));
        assert!((out[0] / out[1] - 2.0).abs() < 1e-4);
        assert!((out[1] / out[2] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_validate_rejects_unsorted_after_normalize_duplicate() {
        let mut curve = CurveParams::new(CurveChannel::Rgb, vec![[1.0, 1.0], [0.0, 0.0]]);
        assert!(curve.validate().is_err());
        curve.normalize();
        assert!(curve.validate().is_ok());

        let dup = CurveParams::new(CurveChannel::Rgb, vec![[0.0, 0.0], [0.5, 0.4], [0.5, 0.6]]);
        assert!(matches!(dup.validate(), Err(GradeError::Validation(_))));
    }

    #[test]
    fn test_bake_matches_evaluator() {
        let curve = s_curve(CurveChannel::Rgb);
        let lut = curve.bake(1024).unwrap();
        let direct = curve.evaluator().evaluate(0.6);
        let baked = lut.apply([0.6; 3])[0];
        assert!((direct - baked).abs() < 1e-3, "{direct:.6} vs {baked:.6}");
    }
}
