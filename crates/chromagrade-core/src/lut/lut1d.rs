//! Per-channel 1D lookup tables.

use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};
use crate::frame::Frame;

/// A 1D LUT: one curve per channel, sampled at `size` evenly spaced inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut1D {
    pub size: usize,
    /// Output RGB per sample.
    pub data: Vec<[f32; 3]>,
    pub domain_min: [f32; 3],
    pub domain_max: [f32; 3],
    pub title: Option<String>,
    pub metadata: Vec<(String, String)>,
    pub input_space: Option<ProfileId>,
    pub output_space: Option<ProfileId>,
}

impl Lut1D {
    pub const MAX_SIZE: usize = 65_536;

    pub fn check_size(size: usize) -> GradeResult<()> {
        if (2..=Self::MAX_SIZE).contains(&size) {
            Ok(())
        } else {
            Err(GradeError::Validation(format!(
                "1D LUT size must be in [2, {}], got {size}",
                Self::MAX_SIZE
            )))
        }
    }

    pub fn new(size: usize, data: Vec<[f32; 3]>) -> GradeResult<Self> {
        Self::check_size(size)?;
        if data.len() != size {
            return Err(GradeError::Validation(format!(
                "1D LUT of size {size} needs {size} entries, got {}",
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
        })
    }

    pub fn identity(size: usize) -> GradeResult<Self> {
        Self::from_fn(size, |x| x)
    }

    /// Sample `f` on `[0, 1]` for every channel.
    pub fn from_fn(size: usize, f: impl Fn(f32) -> f32) -> GradeResult<Self> {
        Self::check_size(size)?;
        let n = (size - 1) as f32;
        let data = (0..size)
            .map(|i| {
                let v = f(i as f32 / n);
                [v; 3]
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

    pub fn is_consistent(&self) -> bool {
        self.size >= 2 && self.data.len() == self.size
    }

    /// Linear interpolation per channel, clamped to the domain.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let n = (self.size - 1) as f64;
        let mut out = [0.0_f32; 3];
        for c in 0..3 {
            let lo = self.domain_min[c] as f64;
            let hi = self.domain_max[c] as f64;
            let t = if hi > lo { (rgb[c] as f64 - lo) / (hi - lo) } else { 0.0 };
            let pos = if t.is_finite() { t.clamp(0.0, 1.0) * n } else { 0.0 };
            let i = (pos.floor() as usize).min(self.size - 2);
            let f = pos - i as f64;
            let a = self.data[i][c] as f64;
            let b = self.data[i + 1][c] as f64;
            out[c] = (a + f * (b - a)) as f32;
        }
        out
    }

    pub fn apply_frame(&self, frame: &Frame) -> Frame {
        frame.map_pixels(|px| self.apply(px))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_identity_passes_through() {
        let lut = Lut1D::identity(1024).unwrap();
        for v in [0.0, 0.1, 0.5, 0.777, 1.0] {
            let out = lut.apply([v; 3]);
            assert!((out[0] - v).abs() < EPSILON, "{:.8} vs {:.8}", out[0], v);
        }
    }

    #[test]
    fn test_channels_are_independent() {
        let data = vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.5]];
        let lut = Lut1D::new(2, data).unwrap();
        let out = lut.apply([0.5, 0.5, 1.0]);
        let expected = [0.5, 0.5, 0.5];
        for i in 0..3 {
            assert!((out[i] - expected[i]).abs() < EPSILON, "channel {i}: {:.8} vs {:.8}", out[i], expected[i]);
        }
    }

    #[test]
    fn test_gamma_curve() {
        let lut = Lut1D::from_fn(4096, |x| x.powf(1.0 / 2.2)).unwrap();
        let out = lut.apply([0.18; 3]);
        assert!((out[0] - 0.18_f32.powf(1.0 / 2.2)).abs() < 1e-4);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        assert!(Lut1D::new(4, vec![[0.0; 3]; 3]).is_err());
        assert!(Lut1D::identity(1).is_err());
    }
}
