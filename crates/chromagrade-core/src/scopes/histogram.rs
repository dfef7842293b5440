//! RGB + luminance histogram computation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::grading::sliders::luma;

pub const BINS: usize = 256;

/// Histogram data for R, G, B, and luminance channels (256 bins each).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramData {
    /// Bin counts for `[R, G, B, Luma]` channels. Each `Vec` has 256 entries.
    pub bins: [Vec<u32>; 4],
    /// Peak bin value across all channels (for normalization).
    pub peak: u32,
}

/// Bin index of a sample, clamped to `[0, 1]` first.
#[inline]
pub fn bin_of(value: f32) -> usize {
    (value.clamp(0.0, 1.0) * (BINS - 1) as f32).round() as usize
}

impl HistogramData {
    pub fn total(&self) -> u64 {
        self.bins[0].iter().map(|&c| c as u64).sum()
    }

    /// Normalized cumulative distribution of `channel` (0..=3).
    /// Every entry is 0 for an empty histogram.
    pub fn cdf(&self, channel: usize) -> Vec<f64> {
        let total = self.total() as f64;
        let mut running = 0u64;
        self.bins[channel]
            .iter()
            .map(|&c| {
                running += c as u64;
                if total > 0.0 { running as f64 / total } else { 0.0 }
            })
            .collect()
    }
}

/// Compute the histogram of a frame in parallel.
pub fn compute(frame: &Frame) -> HistogramData {
    let empty = || [vec![0u32; BINS], vec![0u32; BINS], vec![0u32; BINS], vec![0u32; BINS]];
    let bins = frame
        .pixels
        .par_iter()
        .fold(empty, |mut acc, px| {
            acc[0][bin_of(px[0])] += 1;
            acc[1][bin_of(px[1])] += 1;
            acc[2][bin_of(px[2])] += 1;
            acc[3][bin_of(luma(*px))] += 1;
            acc
        })
        .reduce(empty, |mut a, b| {
            for (ca, cb) in a.iter_mut().zip(b.iter()) {
                for (x, y) in ca.iter_mut().zip(cb) {
                    *x += y;
                }
            }
            a
        });
    let peak = bins.iter().flatten().copied().max().unwrap_or(0);
    HistogramData { bins, peak }
}
