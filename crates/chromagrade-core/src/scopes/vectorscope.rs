//! Vectorscope (chromaticity) scope computation.
//!
//! Plots color saturation and hue on a circular display by projecting
//! each pixel's chrominance onto a 2D grid using Cb/Cr (blue-difference
//! and red-difference chroma) axes.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::grading::sliders::luma;

/// Default vectorscope grid resolution.
pub const DEFAULT_RESOLUTION: u32 = 256;

/// Vectorscope data. Plots color saturation and hue on a circular display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorscopeData {
    /// Resolution of the square vectorscope grid.
    pub resolution: u32,
    /// Density values for each grid cell. Length = resolution².
    pub density: Vec<u32>,
}

impl VectorscopeData {
    pub fn center_index(&self) -> usize {
        let c = ((self.resolution - 1) / 2) as usize;
        c * self.resolution as usize + c
    }
}

/// Grid cell of one pixel. Neutral colors land at the center.
#[inline]
fn cell(px: [f32; 3], resolution: u32) -> usize {
    let y = luma(px);
    // Cb/Cr chroma (normalized to [-0.5, 0.5] range)
    let cb = (px[2] - y) * 0.5;
    let cr = (px[0] - y) * 0.5;

    let max = (resolution - 1) as f32;
    let gx = ((cb + 0.5) * max).clamp(0.0, max) as usize;
    let gy = ((cr + 0.5) * max).clamp(0.0, max) as usize;
    gy * resolution as usize + gx
}

/// Compute vectorscope from a frame.
///
/// Projects each pixel onto a 2D Cb/Cr chrominance plane:
/// - Cb = B − Y (blue-difference)
/// - Cr = R − Y (red-difference)
pub fn compute(frame: &Frame) -> VectorscopeData {
    let resolution = DEFAULT_RESOLUTION;
    let total = (resolution * resolution) as usize;
    let density = frame
        .pixels
        .par_iter()
        .fold(
            || vec![0u32; total],
            |mut acc, px| {
                acc[cell(*px, resolution)] += 1;
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
        );

    VectorscopeData { resolution, density }
}
