//! Waveform (luma) scope computation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::grading::sliders::luma;

/// Default waveform display height in rows.
pub const DEFAULT_HEIGHT: u32 = 256;

/// Waveform scope data: plots luma vs. horizontal position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformData {
    /// Width of the waveform display in columns (= frame width).
    pub width: u32,
    /// Height of the waveform display in rows.
    pub height: u32,
    /// Density, `width × height`, row-major, top row = 1.0.
    pub density: Vec<u32>,
}

/// Count, per source column, how many pixels land on each level row.
pub(crate) fn column_density<F>(frame: &Frame, height: u32, value: F) -> Vec<u32>
where
    F: Fn([f32; 3]) -> f32 + Sync,
{
    let width = frame.width as usize;
    let total = width * height as usize;
    if width == 0 || frame.height == 0 {
        return vec![0; total];
    }
    let height_f = (height - 1) as f32;
    frame
        .pixels
        .par_chunks(width)
        .fold(
            || vec![0u32; total],
            |mut acc, row| {
                for (x, px) in row.iter().enumerate() {
                    let level = (value(*px).clamp(0.0, 1.0) * height_f) as usize;
                    let y = (height as usize - 1) - level;
                    acc[y * width + x] += 1;
                }
                acc
            },
        )
        .reduce(
            || vec![0u32; total],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}

/// Compute the luma waveform of a frame.
pub fn compute(frame: &Frame) -> WaveformData {
    let height = DEFAULT_HEIGHT;
    WaveformData {
        width: frame.width,
        height,
        density: column_density(frame, height, luma),
    }
}
