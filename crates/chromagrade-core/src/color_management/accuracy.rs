//! Whole-frame color statistics.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::convert::ColorSpaceConverter;
use super::matrix::rgb_to_xyz;
use super::profile::{Chromaticity, ProfileId};
use super::transfer::get_transfer;
use super::white_balance::correlated_color_temperature;
use crate::error::GradeResult;
use crate::frame::{Frame, SampleEncoding};

/// Summary statistics describing a frame's color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStatistics {
    /// Per-channel mean of the stored samples.
    pub mean_rgb: [f32; 3],
    /// Per-channel population standard deviation.
    pub std_rgb: [f32; 3],
    pub min_rgb: [f32; 3],
    pub max_rgb: [f32; 3],
    /// Fraction of non-black pixels whose chromaticity lies inside the
    /// reference profile's gamut triangle.
    pub gamut_coverage: f64,
    /// CCT of the mean linear color, in kelvin.
    pub color_temperature: f64,
    /// `20·log10(max / min)` over positive linear luminance, in dB.
    pub dynamic_range_db: f64,
}

#[derive(Clone, Copy)]
struct Accum {
    sum: [f64; 3],
    sum_sq: [f64; 3],
    min: [f32; 3],
    max: [f32; 3],
    xyz_sum: [f64; 3],
    inside: usize,
    chromatic: usize,
    lum_min: f64,
    lum_max: f64,
}

impl Accum {
    fn empty() -> Self {
        Self {
            sum: [0.0; 3],
            sum_sq: [0.0; 3],
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
            xyz_sum: [0.0; 3],
            inside: 0,
            chromatic: 0,
            lum_min: f64::INFINITY,
            lum_max: 0.0,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for c in 0..3 {
            self.sum[c] += other.sum[c];
            self.sum_sq[c] += other.sum_sq[c];
            self.min[c] = self.min[c].min(other.min[c]);
            self.max[c] = self.max[c].max(other.max[c]);
            self.xyz_sum[c] += other.xyz_sum[c];
        }
        self.inside += other.inside;
        self.chromatic += other.chromatic;
        self.lum_min = self.lum_min.min(other.lum_min);
        self.lum_max = self.lum_max.max(other.lum_max);
        self
    }
}

impl ColorSpaceConverter {
    /// Analyze `frame` (expressed in its tagged color space) against the
    /// gamut of `reference`.
    pub fn analyze_accuracy(&self, frame: &Frame, reference: &ProfileId) -> GradeResult<ColorStatistics> {
        let source = self.profile(&frame.color_space)?;
        let reference = self.profile(reference)?;
        let to_xyz = rgb_to_xyz(&source.primaries)?;
        let decode = if frame.encoding == SampleEncoding::Encoded {
            get_transfer(source.transfer)?
        } else {
            None
        };
        let gamut = reference.primaries;

        let acc = frame
            .pixels
            .par_iter()
            .fold(Accum::empty, |mut acc, px| {
                for c in 0..3 {
                    let v = px[c] as f64;
                    acc.sum[c] += v;
                    acc.sum_sq[c] += v * v;
                    acc.min[c] = acc.min[c].min(px[c]);
                    acc.max[c] = acc.max[c].max(px[c]);
                }
                let mut linear = [px[0] as f64, px[1] as f64, px[2] as f64];
                if let Some(tf) = &decode {
                    linear = linear.map(|v| tf.to_linear(v));
                }
                let xyz = to_xyz.apply(linear);
                for c in 0..3 {
                    acc.xyz_sum[c] += xyz[c];
                }
                let total = xyz[0] + xyz[1] + xyz[2];
                if xyz[1] > 1e-6 && total > 1e-9 {
                    acc.chromatic += 1;
                    if gamut.contains(Chromaticity::new(xyz[0] / total, xyz[1] / total)) {
                        acc.inside += 1;
                    }
                    acc.lum_min = acc.lum_min.min(xyz[1]);
                    acc.lum_max = acc.lum_max.max(xyz[1]);
                }
                acc
            })
            .reduce(Accum::empty, Accum::merge);

        let n = frame.pixel_count().max(1) as f64;
        let mut mean_rgb = [0.0_f32; 3];
        let mut std_rgb = [0.0_f32; 3];
        for c in 0..3 {
            let mean = acc.sum[c] / n;
            mean_rgb[c] = mean as f32;
            std_rgb[c] = (acc.sum_sq[c] / n - mean * mean).max(0.0).sqrt() as f32;
        }

        let xyz_total = acc.xyz_sum[0] + acc.xyz_sum[1] + acc.xyz_sum[2];
        let color_temperature = if xyz_total > 1e-9 {
            correlated_color_temperature(Chromaticity::new(
                acc.xyz_sum[0] / xyz_total,
                acc.xyz_sum[1] / xyz_total,
            ))
        } else {
            6500.0
        };

        let dynamic_range_db = if acc.lum_max > 0.0 && acc.lum_min.is_finite() {
            (20.0 * (acc.lum_max / acc.lum_min).log10()).max(0.0)
        } else {
            0.0
        };

        let gamut_coverage = if acc.chromatic > 0 {
            acc.inside as f64 / acc.chromatic as f64
        } else {
            0.0
        };

        if frame.is_empty() {
            return Ok(ColorStatistics {
                mean_rgb,
                std_rgb,
                min_rgb: [0.0; 3],
                max_rgb: [0.0; 3],
                gamut_coverage,
                color_temperature,
                dynamic_range_db,
            });
        }

        Ok(ColorStatistics {
            mean_rgb,
            std_rgb,
            min_rgb: acc.min,
            max_rgb: acc.max,
            gamut_coverage,
            color_temperature,
            dynamic_range_db,
        })
    }
}
