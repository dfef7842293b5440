//! Statistical color matching between two frames.
//!
//! Every method returns the target's pixels in the target's color space and
//! encoding.
//!
//! - **Histogram**: per-channel 256-bin CDF matching. Each target bin is
//!   moved to the reference bin with the nearest cumulative frequency; the
//!   sub-bin residual of each sample is kept, so a frame matched to itself
//!   comes back unchanged.
//! - **Lab statistics**: in CIE L\*a\*b\*, each channel is normalized by the
//!   target's mean and standard deviation, then rescaled by the reference's.
//! - **Geometric**: in linear light, each channel is scaled by the ratio of
//!   reference and target geometric means.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color_management::convert::ColorSpaceConverter;
use crate::color_management::lab::{lab_to_linear_srgb, linear_srgb_to_lab};
use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};
use crate::frame::{Frame, SampleEncoding};
use crate::scopes::histogram::{self, BINS, bin_of};

const LOG_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    #[default]
    Histogram,
    LabStatistics,
    Geometric,
}

/// Per-channel mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: [f64; 3],
    pub std_dev: [f64; 3],
}

impl ChannelStats {
    pub fn of(pixels: &[[f32; 3]]) -> Self {
        let n = pixels.len() as f64;
        if pixels.is_empty() {
            return Self::default();
        }
        let (sum, sum_sq) = pixels
            .par_iter()
            .fold(
                || ([0.0_f64; 3], [0.0_f64; 3]),
                |(mut s, mut q), px| {
                    for c in 0..3 {
                        let v = px[c] as f64;
                        s[c] += v;
                        q[c] += v * v;
                    }
                    (s, q)
                },
            )
            .reduce(
                || ([0.0_f64; 3], [0.0_f64; 3]),
                |a, b| {
                    (
                        [a.0[0] + b.0[0], a.0[1] + b.0[1], a.0[2] + b.0[2]],
                        [a.1[0] + b.1[0], a.1[1] + b.1[1], a.1[2] + b.1[2]],
                    )
                },
            );
        let mean = sum.map(|s| s / n);
        let std_dev = [0, 1, 2].map(|c| (sum_sq[c] / n - mean[c] * mean[c]).max(0.0).sqrt());
        Self { mean, std_dev }
    }
}

/// Per-channel geometric mean, `exp(mean(ln(v + ε)))`.
pub fn geometric_mean(pixels: &[[f32; 3]]) -> [f64; 3] {
    if pixels.is_empty() {
        return [0.0; 3];
    }
    let sum = pixels
        .par_iter()
        .fold(
            || [0.0_f64; 3],
            |mut acc, px| {
                for c in 0..3 {
                    acc[c] += (px[c].max(0.0) as f64 + LOG_EPSILON).ln();
                }
                acc
            },
        )
        .reduce(|| [0.0_f64; 3], |a, b| [a[0] + b[0], a[1] + b[1], a[2] + b[2]]);
    let n = pixels.len() as f64;
    sum.map(|s| (s / n).exp())
}

/// Nearest-CDF bin remap for one channel: `table[target_bin] = reference_bin`.
fn cdf_table(reference: &[f64], target: &[f64]) -> Vec<usize> {
    target
        .iter()
        .map(|&t| {
            let mut best = 0;
            let mut best_diff = f64::INFINITY;
            for (j, &r) in reference.iter().enumerate() {
                let diff = (r - t).abs();
                if diff < best_diff {
                    best = j;
                    best_diff = diff;
                }
            }
            best
        })
        .collect()
}

pub struct ColorMatcher<'a> {
    converter: &'a ColorSpaceConverter,
}

impl<'a> ColorMatcher<'a> {
    pub fn new(converter: &'a ColorSpaceConverter) -> Self {
        Self { converter }
    }

    /// Match `target` toward `reference`.
    pub fn apply(&self, reference: &Frame, target: &Frame, method: MatchMethod) -> GradeResult<Frame> {
        if reference.is_empty() || target.is_empty() {
            return Err(GradeError::Validation("color matching needs non-empty frames".to_string()));
        }
        tracing::debug!("Matching {}x{} frame with {method:?}", target.width, target.height);
        match method {
            MatchMethod::Histogram => self.histogram(reference, target),
            MatchMethod::LabStatistics => self.lab_statistics(reference, target),
            MatchMethod::Geometric => self.geometric(reference, target),
        }
    }

    fn to_linear(&self, frame: &Frame) -> GradeResult<Frame> {
        let mut linear = self.converter.convert(frame, &frame.color_space, &ProfileId::LinearSrgb)?;
        linear.encoding = SampleEncoding::Linear;
        Ok(linear)
    }

    /// Re-express linear sRGB pixels in `like`'s color space and encoding.
    fn from_linear(&self, pixels: Vec<[f32; 3]>, like: &Frame) -> GradeResult<Frame> {
        let linear = Frame::new(like.width, like.height, pixels, ProfileId::LinearSrgb, like.encoding)?;
        let mut out = self.converter.convert(&linear, &ProfileId::LinearSrgb, &like.color_space)?;
        out.bit_depth = like.bit_depth;
        Ok(out)
    }

    fn histogram(&self, reference: &Frame, target: &Frame) -> GradeResult<Frame> {
        let ref_hist = if reference.color_space != target.color_space || reference.encoding != target.encoding {
            let linear = self.to_linear(reference)?;
            let shape = Frame::filled(
                reference.width,
                reference.height,
                [0.0; 3],
                target.color_space.clone(),
                target.encoding,
            );
            histogram::compute(&self.from_linear(linear.pixels, &shape)?)
        } else {
            histogram::compute(reference)
        };
        let tgt_hist = histogram::compute(target);
        let tables: Vec<Vec<usize>> = (0..3).map(|c| cdf_table(&ref_hist.cdf(c), &tgt_hist.cdf(c))).collect();

        let scale = (BINS - 1) as f32;
        Ok(target.map_pixels(|px| {
            let mut out = px;
            for c in 0..3 {
                let bin = bin_of(px[c]);
                let mapped = tables[c][bin];
                if mapped != bin {
                    out[c] = px[c] + (mapped as f32 - bin as f32) / scale;
                }
            }
            out
        }))
    }

    fn lab_statistics(&self, reference: &Frame, target: &Frame) -> GradeResult<Frame> {
        let to_lab = |frame: &Frame| -> GradeResult<Vec<[f32; 3]>> {
            Ok(self.to_linear(frame)?.pixels.par_iter().map(|&px| linear_srgb_to_lab(px)).collect())
        };
        let ref_lab = to_lab(reference)?;
        let tgt_lab = to_lab(target)?;
        let ref_stats = ChannelStats::of(&ref_lab);
        let tgt_stats = ChannelStats::of(&tgt_lab);

        let pixels = tgt_lab
            .par_iter()
            .map(|lab| {
                let mut out = [0.0_f32; 3];
                for c in 0..3 {
                    let z = (lab[c] as f64 - tgt_stats.mean[c]) / (tgt_stats.std_dev[c] + LOG_EPSILON);
                    out[c] = (z * ref_stats.std_dev[c] + ref_stats.mean[c]) as f32;
                }
                out[0] = out[0].clamp(0.0, 100.0);
                lab_to_linear_srgb(out)
            })
            .collect();
        self.from_linear(pixels, target)
    }

    fn geometric(&self, reference: &Frame, target: &Frame) -> GradeResult<Frame> {
        let ref_linear = self.to_linear(reference)?;
        let tgt_linear = self.to_linear(target)?;
        let ref_mean = geometric_mean(&ref_linear.pixels);
        let tgt_mean = geometric_mean(&tgt_linear.pixels);
        let ratio = [0, 1, 2].map(|c| ref_mean[c] / (tgt_mean[c] + LOG_EPSILON));
        if ratio.iter().any(|r| !r.is_finite()) {
            return Err(GradeError::Numerical(format!("geometric mean ratio {ratio:?} is not finite")));
        }
        let pixels = tgt_linear
            .pixels
            .par_iter()
            .map(|px| [0, 1, 2].map(|c| (px[c] as f64 * ratio[c]) as f32))
            .collect();
        self.from_linear(pixels, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(space: ProfileId, encoding: SampleEncoding, gain: f32) -> Frame {
        let pixels = (0..64)
            .map(|i| {
                let v = i as f32 / 63.0;
                [v * gain, (1.0 - v) * gain, (0.25 + v * 0.5) * gain]
            })
            .collect();
        Frame::new(8, 8, pixels, space, encoding).unwrap()
    }

    #[test]
    fn test_histogram_self_match_is_identity() {
        let converter = ColorSpaceConverter::new();
        let frame = gradient(ProfileId::Srgb, SampleEncoding::Encoded, 0.9);
        let out = ColorMatcher::new(&converter).apply(&frame, &frame, MatchMethod::Histogram).unwrap();
        assert_eq!(out.pixels, frame.pixels);
    }

    #[test]
    fn test_histogram_moves_toward_reference() {
        let converter = ColorSpaceConverter::new();
        let reference = gradient(ProfileId::Srgb, SampleEncoding::Encoded, 1.0);
        let target = gradient(ProfileId::Srgb, SampleEncoding::Encoded, 0.5);
        let out = ColorMatcher::new(&converter).apply(&reference, &target, MatchMethod::Histogram).unwrap();
        let before = target.mean_rgb();
        let after = out.mean_rgb();
        let goal = reference.mean_rgb();
        for c in 0..3 {
            assert!((after[c] - goal[c]).abs() < (before[c] - goal[c]).abs() + 1e-6, "channel {c}");
        }
    }

    #[test]
    fn test_lab_statistics_matches_means() {
        let converter = ColorSpaceConverter::new();
        let reference = Frame::filled(4, 4, [0.6, 0.3, 0.2], ProfileId::LinearSrgb, SampleEncoding::Linear);
        let target = gradient(ProfileId::LinearSrgb, SampleEncoding::Linear, 0.8);
        let out = ColorMatcher::new(&converter).apply(&reference, &target, MatchMethod::LabStatistics).unwrap();
        let lab = |px: [f32; 3]| linear_srgb_to_lab(px);
        let want = lab([0.6, 0.3, 0.2]);
        let got = ChannelStats::of(&out.pixels.iter().map(|&p| lab(p)).collect::<Vec<_>>());
        for c in 0..3 {
            assert!((got.mean[c] - want[c] as f64).abs() < 0.5, "channel {c}: {:.4} vs {:.4}", got.mean[c], want[c]);
        }
    }

    #[test]
    fn test_geometric_scales_to_reference() {
        let converter = ColorSpaceConverter::new();
        let reference = Frame::filled(2, 2, [0.4; 3], ProfileId::LinearSrgb, SampleEncoding::Linear);
        let target = Frame::filled(2, 2, [0.2; 3], ProfileId::LinearSrgb, SampleEncoding::Linear);
        let out = ColorMatcher::new(&converter).apply(&reference, &target, MatchMethod::Geometric).unwrap();
        for c in 0..3 {
            assert!((out.pixels[0][c] - 0.4).abs() < 1e-5, "channel {c}: {:.8}", out.pixels[0][c]);
        }
        assert_eq!(out.color_space, ProfileId::LinearSrgb);
    }

    #[test]
    fn test_result_stays_in_target_space() {
        let converter = ColorSpaceConverter::new();
        let reference = gradient(ProfileId::Rec2020, SampleEncoding::Encoded, 1.0);
        let target = gradient(ProfileId::Srgb, SampleEncoding::Encoded, 0.7);
        for method in [MatchMethod::Histogram, MatchMethod::LabStatistics, MatchMethod::Geometric] {
            let out = ColorMatcher::new(&converter).apply(&reference, &target, method).unwrap();
            assert_eq!(out.color_space, ProfileId::Srgb, "{method:?}");
            assert_eq!(out.encoding, SampleEncoding::Encoded);
        }
    }

    #[test]
    fn test_empty_frames_rejected() {
        let converter = ColorSpaceConverter::new();
        let empty = Frame::filled(0, 0, [0.0; 3], ProfileId::Srgb, SampleEncoding::Encoded);
        let frame = gradient(ProfileId::Srgb, SampleEncoding::Encoded, 1.0);
        let result = ColorMatcher::new(&converter).apply(&frame, &empty, MatchMethod::Histogram);
        assert!(matches!(result, Err(GradeError::Validation(_))));
    }
}
