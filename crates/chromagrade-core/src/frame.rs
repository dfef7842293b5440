//! Frame buffers exchanged with the engine.
//!
//! A [`Frame`] is always three-channel, stored as `f32` RGB triples in
//! row-major order. The color-space tag and the [`SampleEncoding`] say how to
//! interpret the values; the engine never guesses.

use image::{Rgb32FImage, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};

/// Supported bit depths for source frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitDepth {
    /// 8-bit unsigned integer.
    U8,
    /// 10-bit unsigned integer.
    U10,
    /// 12-bit unsigned integer.
    U12,
    /// 16-bit unsigned integer.
    U16,
    /// 16-bit floating point.
    F16,
    /// 32-bit floating point.
    F32,
}

impl BitDepth {
    /// Largest integer code value, or `None` for float depths.
    pub const fn max_code_value(self) -> Option<u32> {
        match self {
            Self::U8 => Some(255),
            Self::U10 => Some(1023),
            Self::U12 => Some(4095),
            Self::U16 => Some(65535),
            Self::F16 | Self::F32 => None,
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "8-bit"),
            Self::U10 => write!(f, "10-bit"),
            Self::U12 => write!(f, "12-bit"),
            Self::U16 => write!(f, "16-bit"),
            Self::F16 => write!(f, "16-bit float"),
            Self::F32 => write!(f, "32-bit float"),
        }
    }
}

impl From<u8> for BitDepth {
    fn from(bits: u8) -> Self {
        match bits {
            10 => Self::U10,
            12 => Self::U12,
            16 => Self::U16,
            32 => Self::F32,
            _ => Self::U8,
        }
    }
}

/// Whether sample values are scene/display linear or transfer-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleEncoding {
    Linear,
    Encoded,
}

/// Three-channel frame buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGB samples, row-major. Length = width × height.
    pub pixels: Vec<[f32; 3]>,
    /// Bit depth of the data this frame was decoded from.
    pub bit_depth: BitDepth,
    /// Color space the samples are expressed in.
    pub color_space: ProfileId,
    /// Representation of the samples.
    pub encoding: SampleEncoding,
}

impl Frame {
    /// Channel count. Frames are always RGB.
    pub const CHANNELS: usize = 3;

    /// Build a float frame, checking that the pixel count matches the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        pixels: Vec<[f32; 3]>,
        color_space: ProfileId,
        encoding: SampleEncoding,
    ) -> GradeResult<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(GradeError::Validation(format!(
                "frame {width}x{height} needs {expected} pixels, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            bit_depth: BitDepth::F32,
            color_space,
            encoding,
        })
    }

    /// A frame where every pixel has the same value.
    pub fn filled(
        width: u32,
        height: u32,
        rgb: [f32; 3],
        color_space: ProfileId,
        encoding: SampleEncoding,
    ) -> Self {
        Self {
            width,
            height,
            pixels: vec![rgb; width as usize * height as usize],
            bit_depth: BitDepth::F32,
            color_space,
            encoding,
        }
    }

    /// Build a frame from interleaved 8-bit RGB, normalizing to `[0, 1]`.
    pub fn from_u8(
        width: u32,
        height: u32,
        data: &[u8],
        color_space: ProfileId,
        encoding: SampleEncoding,
    ) -> GradeResult<Self> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(GradeError::Validation(format!(
                "8-bit buffer for {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        let pixels = data
            .par_chunks_exact(Self::CHANNELS)
            .map(|c| {
                [
                    c[0] as f32 / 255.0,
                    c[1] as f32 / 255.0,
                    c[2] as f32 / 255.0,
                ]
            })
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
            bit_depth: BitDepth::U8,
            color_space,
            encoding,
        })
    }

    /// Build a frame from interleaved `f32` RGB.
    pub fn from_f32(
        width: u32,
        height: u32,
        data: &[f32],
        color_space: ProfileId,
        encoding: SampleEncoding,
    ) -> GradeResult<Self> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(GradeError::Validation(format!(
                "float buffer for {width}x{height} needs {expected} samples, got {}",
                data.len()
            )));
        }
        let pixels = bytemuck::cast_slice::<f32, [f32; 3]>(data).to_vec();
        Self::new(width, height, pixels, color_space, encoding)
    }

    /// Interleaved view of the samples.
    pub fn as_flat(&self) -> &[f32] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Quantize to interleaved 8-bit RGB, clamping to `[0, 1]`.
    pub fn to_u8(&self) -> Vec<u8> {
        self.as_flat()
            .par_iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// A frame with this frame's metadata and new samples.
    pub fn with_pixels(&self, pixels: Vec<[f32; 3]>) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels,
            bit_depth: self.bit_depth,
            color_space: self.color_space.clone(),
            encoding: self.encoding,
        }
    }

    /// Apply `f` to every pixel in parallel, producing a new frame.
    pub fn map_pixels<F>(&self, f: F) -> Self
    where
        F: Fn([f32; 3]) -> [f32; 3] + Sync + Send,
    {
        self.with_pixels(self.pixels.par_iter().map(|&px| f(px)).collect())
    }

    /// Mean RGB over the whole frame.
    pub fn mean_rgb(&self) -> [f32; 3] {
        if self.pixels.is_empty() {
            return [0.0; 3];
        }
        let sum = self
            .pixels
            .par_iter()
            .fold(
                || [0.0_f64; 3],
                |mut acc, px| {
                    for c in 0..3 {
                        acc[c] += px[c] as f64;
                    }
                    acc
                },
            )
            .reduce(|| [0.0_f64; 3], |a, b| [a[0] + b[0], a[1] + b[1], a[2] + b[2]]);
        let n = self.pixels.len() as f64;
        [(sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32]
    }

    /// Wrap an `image` float buffer.
    pub fn from_rgb32f(image: &Rgb32FImage, color_space: ProfileId, encoding: SampleEncoding) -> Self {
        let (width, height) = image.dimensions();
        let pixels = image.pixels().map(|p| p.0).collect();
        Self {
            width,
            height,
            pixels,
            bit_depth: BitDepth::F32,
            color_space,
            encoding,
        }
    }

    /// Wrap an `image` 8-bit buffer.
    pub fn from_rgb8(image: &RgbImage, color_space: ProfileId, encoding: SampleEncoding) -> Self {
        let (width, height) = image.dimensions();
        let pixels = image
            .pixels()
            .map(|p| [p.0[0] as f32 / 255.0, p.0[1] as f32 / 255.0, p.0[2] as f32 / 255.0])
            .collect();
        Self {
            width,
            height,
            pixels,
            bit_depth: BitDepth::U8,
            color_space,
            encoding,
        }
    }

    /// Copy into an `image` float buffer.
    pub fn to_rgb32f(&self) -> GradeResult<Rgb32FImage> {
        Rgb32FImage::from_raw(self.width, self.height, self.as_flat().to_vec()).ok_or_else(|| {
            GradeError::Validation(format!(
                "pixel buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }
}
