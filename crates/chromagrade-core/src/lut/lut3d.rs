//! 3D lookup tables: storage and interpolation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};
use crate::frame::Frame;

/// How a LUT is sampled between grid points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Closest grid point. Fast preview path; must be requested explicitly.
    Nearest,
    /// 8-corner weighted blend.
    #[default]
    Trilinear,
    /// 4-corner blend inside one of six tetrahedra.
    Tetrahedral,
}

impl Interpolation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Trilinear => "trilinear",
            Self::Tetrahedral => "tetrahedral",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nearest" => Some(Self::Nearest),
            "trilinear" => Some(Self::Trilinear),
            "tetrahedral" => Some(Self::Tetrahedral),
            _ => None,
        }
    }
}

/// A 3D lookup table for fast color transform application.
///
/// Entries are stored red-fastest, the `.cube` file order:
/// `index = r + N·(g + N·b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut3D {
    /// Grid size per axis (typically 17, 33 or 65).
    pub size: usize,
    /// Output RGB per grid point. Length = size³.
    pub data: Vec<[f32; 3]>,
    /// Minimum domain values per channel.
    pub domain_min: [f32; 3],
    /// Maximum domain values per channel.
    pub domain_max: [f32; 3],
    pub title: Option<String>,
    /// Ordered `key: value` comments carried through load/save.
    pub metadata: Vec<(String, String)>,
    pub input_space: Option<ProfileId>,
    pub output_space: Option<ProfileId>,
    pub interpolation: Interpolation,
}

impl Lut3D {
    /// Largest grid edge accepted, the `.cube` format ceiling.
    pub const MAX_SIZE: usize = 256;

    /// Reject grid edges outside `[2, MAX_SIZE]`.
    pub fn check_size(size: usize) -> GradeResult<()> {
        if (2..=Self::MAX_SIZE).contains(&size) {
            Ok(())
        } else {
            Err(GradeError::Validation(format!(
                "3D LUT size must be in [2, {}], got {size}",
                Self::MAX_SIZE
            )))
        }
    }

    /// Wrap grid data, checking the size range and `data.len() == size³`.
    pub fn new(size: usize, data: Vec<[f32; 3]>) -> GradeResult<Self> {
        Self::check_size(size)?;
        let expected = size * size * size;
        if data.len() != expected {
            return Err(GradeError::Validation(format!(
                "3D LUT of size {size} needs {expected} entries, got {}",
                data.len()
            )));
        }
        Ok(Self {
            size,
            data,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
            title: None,
            metadata: Vec::new(),
            input_space: None,
            output_space: None,
            interpolation: Interpolation::Trilinear,
        })
    }

    /// Pass-through LUT.
    pub fn identity(size: usize) -> GradeResult<Self> {
        Self::check_size(size)?;
        let n = (size - 1) as f32;
        let data = (0..size * size * size)
            .map(|i| {
                let r = i % size;
                let g = (i / size) % size;
                let b = i / (size * size);
                [r as f32 / n, g as f32 / n, b as f32 / n]
            })
            .collect();
        Self::new(size, data)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_domain(mut self, min: [f32; 3], max: [f32; 3]) -> Self {
        self.domain_min = min;
        self.domain_max = max;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_spaces(mut self, input: ProfileId, output: ProfileId) -> Self {
        self.input_space = Some(input);
        self.output_space = Some(output);
        self
    }

    /// Append a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn entry_count(&self) -> usize {
        self.size * self.size * self.size
    }

    /// `true` when the data length matches the declared size.
    pub fn is_consistent(&self) -> bool {
        self.size >= 2 && self.data.len() == self.entry_count()
    }

    #[inline]
    pub fn index(&self, r: usize, g: usize, b: usize) -> usize {
        r + self.size * (g + self.size * b)
    }

    #[inline]
    fn get(&self, r: usize, g: usize, b: usize) -> [f64; 3] {
        let v = self.data[self.index(r, g, b)];
        [v[0] as f64, v[1] as f64, v[2] as f64]
    }

    /// Apply with this LUT's own interpolation mode.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        self.apply_with(rgb, self.interpolation)
    }

    pub fn apply_with(&self, rgb: [f32; 3], interpolation: Interpolation) -> [f32; 3] {
        match interpolation {
            Interpolation::Nearest => self.apply_nearest(rgb),
            Interpolation::Trilinear => self.apply_trilinear(rgb),
            Interpolation::Tetrahedral => self.apply_tetrahedral(rgb),
        }
    }

    /// Apply to every pixel in parallel.
    pub fn apply_frame(&self, frame: &Frame) -> Frame {
        frame.map_pixels(|px| self.apply(px))
    }

    /// Apply to every pixel, blending `intensity` of the result over the input.
    pub fn apply_frame_blended(&self, frame: &Frame, intensity: f32) -> GradeResult<Frame> {
        if !(0.0..=1.0).contains(&intensity) {
            return Err(GradeError::Validation(format!(
                "LUT intensity must be in [0, 1], got {intensity}"
            )));
        }
        if intensity >= 1.0 {
            return Ok(self.apply_frame(frame));
        }
        Ok(frame.map_pixels(|px| {
            let out = self.apply(px);
            [
                px[0] + (out[0] - px[0]) * intensity,
                px[1] + (out[1] - px[1]) * intensity,
                px[2] + (out[2] - px[2]) * intensity,
            ]
        }))
    }

    /// Grid coordinates of `rgb` in `[0, N−1]`, clamped to the domain.
    fn grid_coords(&self, rgb: [f32; 3]) -> [f64; 3] {
        let n = (self.size - 1) as f64;
        let mut out = [0.0; 3];
        for c in 0..3 {
            let lo = self.domain_min[c] as f64;
            let hi = self.domain_max[c] as f64;
            let t = if hi > lo { (rgb[c] as f64 - lo) / (hi - lo) } else { 0.0 };
            out[c] = if t.is_finite() { t.clamp(0.0, 1.0) * n } else { 0.0 };
        }
        out
    }

    /// Lower cell index and fractional offset per axis.
    fn cell(&self, rgb: [f32; 3]) -> ([usize; 3], [f64; 3]) {
        let coords = self.grid_coords(rgb);
        let mut idx = [0usize; 3];
        let mut frac = [0.0; 3];
        for c in 0..3 {
            let i = (coords[c].floor() as usize).min(self.size - 2);
            idx[c] = i;
            frac[c] = coords[c] - i as f64;
        }
        (idx, frac)
    }

    fn apply_nearest(&self, rgb: [f32; 3]) -> [f32; 3] {
        let coords = self.grid_coords(rgb);
        let r = coords[0].round() as usize;
        let g = coords[1].round() as usize;
        let b = coords[2].round() as usize;
        self.data[self.index(r, g, b)]
    }

    fn apply_trilinear(&self, rgb: [f32; 3]) -> [f32; 3] {
        let ([ri, gi, bi], [rf, gf, bf]) = self.cell(rgb);

        let c000 = self.get(ri, gi, bi);
        let c100 = self.get(ri + 1, gi, bi);
        let c010 = self.get(ri, gi + 1, bi);
        let c110 = self.get(ri + 1, gi + 1, bi);
        let c001 = self.get(ri, gi, bi + 1);
        let c101 = self.get(ri + 1, gi, bi + 1);
        let c011 = self.get(ri, gi + 1, bi + 1);
        let c111 = self.get(ri + 1, gi + 1, bi + 1);

        let mut out = [0.0_f32; 3];
        for i in 0..3 {
            let c00 = lerp(c000[i], c100[i], rf);
            let c10 = lerp(c010[i], c110[i], rf);
            let c01 = lerp(c001[i], c101[i], rf);
            let c11 = lerp(c011[i], c111[i], rf);
            let c0 = lerp(c00, c10, gf);
            let c1 = lerp(c01, c11, gf);
            out[i] = lerp(c0, c1, bf) as f32;
        }
        out
    }

    fn apply_tetrahedral(&self, rgb: [f32; 3]) -> [f32; 3] {
        let ([ri, gi, bi], [rf, gf, bf]) = self.cell(rgb);

        let c000 = self.get(ri, gi, bi);
        let c100 = self.get(ri + 1, gi, bi);
        let c010 = self.get(ri, gi + 1, bi);
        let c110 = self.get(ri + 1, gi + 1, bi);
        let c001 = self.get(ri, gi, bi + 1);
        let c101 = self.get(ri + 1, gi, bi + 1);
        let c011 = self.get(ri, gi + 1, bi + 1);
        let c111 = self.get(ri + 1, gi + 1, bi + 1);

        let mut out = [0.0_f32; 3];
        for i in 0..3 {
            let v = if rf > gf {
                if gf > bf {
                    c000[i] + rf * (c100[i] - c000[i]) + gf * (c110[i] - c100[i]) + bf * (c111[i] - c110[i])
                } else if rf > bf {
                    c000[i] + rf * (c100[i] - c000[i]) + bf * (c101[i] - c100[i]) + gf * (c111[i] - c101[i])
                } else {
                    c000[i] + bf * (c001[i] - c000[i]) + rf * (c101[i] - c001[i]) + gf * (c111[i] - c101[i])
                }
            } else if gf > bf {
                if rf > bf {
                    c000[i] + gf * (c010[i] - c000[i]) + rf * (c110[i] - c010[i]) + bf * (c111[i] - c110[i])
                } else {
                    c000[i] + gf * (c010[i] - c000[i]) + bf * (c011[i] - c010[i]) + rf * (c111[i] - c011[i])
                }
            } else {
                c000[i] + bf * (c001[i] - c000[i]) + gf * (c011[i] - c001[i]) + rf * (c111[i] - c011[i])
            };
            out[i] = v as f32;
        }
        out
    }

    /// Compose: the result applies `self`, then `next`.
    pub fn then(&self, next: &Lut3D) -> GradeResult<Self> {
        let data = self.data.par_iter().map(|&v| next.apply(v)).collect();
        let mut out = Self::new(self.size, data)?;
        out.domain_min = self.domain_min;
        out.domain_max = self.domain_max;
        out.input_space = self.input_space.clone();
        out.output_space = next.output_space.clone();
        out.interpolation = self.interpolation;
        Ok(out)
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}
