//! Space-to-space conversion of frames and pixels.
//!
//! # Pipeline
//! ```text
//!   src ──→ decode TF ──→ RGB→XYZ ──→ Bradford (if whites differ) ──→ XYZ→RGB ──→ encode TF ──→ clamp [0, 1]
//! ```
//!
//! The three matrices are folded into one RGB→RGB matrix per profile pair
//! and cached. Frames tagged [`SampleEncoding::Linear`] skip both transfer
//! function stages, so the output keeps the input's representation.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::matrix::{ConversionMatrix, bradford, rgb_to_xyz, xyz_to_rgb};
use super::profile::{ColorProfile, ProfileId, ProfileRegistry};
use super::transfer::get_transfer;
use crate::error::GradeResult;
use crate::frame::{Frame, SampleEncoding};

/// How out-of-gamut colors and white point differences are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderingIntent {
    /// Adapt white points, clip out-of-gamut values.
    #[default]
    RelativeColorimetric,
    /// Keep absolute XYZ, no white point adaptation.
    AbsoluteColorimetric,
    /// Adapt white points and desaturate out-of-gamut colors toward their
    /// luminance until they fit, preserving hue.
    Perceptual,
}

/// Rec.709 luminance weights.
const LUMA_REC709: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// Converts frames between registered color profiles.
#[derive(Debug, Default)]
pub struct ColorSpaceConverter {
    registry: ProfileRegistry,
    matrices: Mutex<HashMap<(ProfileId, ProfileId, RenderingIntent), ConversionMatrix>>,
}

impl ColorSpaceConverter {
    /// Converter over the built-in profiles.
    pub fn new() -> Self {
        Self::with_registry(ProfileRegistry::with_builtins())
    }

    pub fn with_registry(registry: ProfileRegistry) -> Self {
        Self {
            registry,
            matrices: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Register a profile. Cached matrices involving it are dropped.
    pub fn register_profile(&mut self, profile: ColorProfile) {
        let id = profile.id.clone();
        self.registry.register(profile);
        self.matrices
            .get_mut()
            .retain(|(from, to, _), _| *from != id && *to != id);
    }

    pub fn profile(&self, id: &ProfileId) -> GradeResult<&ColorProfile> {
        self.registry.get(id)
    }

    /// Linear RGB→RGB matrix from `from` to `to` with white point adaptation.
    pub fn conversion_matrix(&self, from: &ProfileId, to: &ProfileId) -> GradeResult<ConversionMatrix> {
        self.matrix_for(from, to, RenderingIntent::RelativeColorimetric)
    }

    fn matrix_for(
        &self,
        from: &ProfileId,
        to: &ProfileId,
        intent: RenderingIntent,
    ) -> GradeResult<ConversionMatrix> {
        let key = (from.clone(), to.clone(), intent);
        if let Some(m) = self.matrices.lock().get(&key) {
            return Ok(*m);
        }

        let src = self.registry.get(from)?;
        let dst = self.registry.get(to)?;

        let to_xyz = rgb_to_xyz(&src.primaries)?;
        let from_xyz = xyz_to_rgb(&dst.primaries)?;
        let adapt_whites = intent != RenderingIntent::AbsoluteColorimetric
            && src.primaries.white != dst.primaries.white;
        let matrix = if adapt_whites {
            let cat = bradford(src.primaries.white, dst.primaries.white)?;
            to_xyz.then(&cat).then(&from_xyz)
        } else {
            to_xyz.then(&from_xyz)
        };
        matrix.check_invertible()?;

        tracing::debug!("cached conversion matrix {from} → {to} ({intent:?})");
        self.matrices.lock().insert(key, matrix);
        Ok(matrix)
    }

    /// Convert a frame from `from` to `to`.
    ///
    /// Fails with [`GradeError::Configuration`](crate::GradeError::Configuration)
    /// for unknown profiles and [`GradeError::Numerical`](crate::GradeError::Numerical)
    /// for singular primaries.
    pub fn convert(&self, frame: &Frame, from: &ProfileId, to: &ProfileId) -> GradeResult<Frame> {
        self.convert_with_intent(frame, from, to, RenderingIntent::RelativeColorimetric)
    }

    pub fn convert_with_intent(
        &self,
        frame: &Frame,
        from: &ProfileId,
        to: &ProfileId,
        intent: RenderingIntent,
    ) -> GradeResult<Frame> {
        let src = self.registry.get(from)?;
        let dst = self.registry.get(to)?;
        let matrix = self.matrix_for(from, to, intent)?;

        let encoded = frame.encoding == SampleEncoding::Encoded;
        let decode = if encoded { get_transfer(src.transfer)? } else { None };
        let encode = if encoded { get_transfer(dst.transfer)? } else { None };

        let mut out = frame.map_pixels(|px| {
            let mut rgb = [px[0] as f64, px[1] as f64, px[2] as f64];
            if let Some(tf) = &decode {
                rgb = rgb.map(|v| tf.to_linear(v));
            }
            rgb = matrix.apply(rgb);
            if intent == RenderingIntent::Perceptual {
                rgb = compress_to_gamut(rgb);
            }
            if let Some(tf) = &encode {
                rgb = rgb.map(|v| tf.to_encoded(v.max(0.0)));
            }
            rgb.map(|v| v.clamp(0.0, 1.0) as f32)
        });
        out.color_space = to.clone();
        Ok(out)
    }

    /// Convert a single pixel. `encoding` says whether `rgb` carries the
    /// source transfer function.
    pub fn convert_pixel(
        &self,
        rgb: [f32; 3],
        from: &ProfileId,
        to: &ProfileId,
        encoding: SampleEncoding,
    ) -> GradeResult<[f32; 3]> {
        let frame = Frame::filled(1, 1, rgb, from.clone(), encoding);
        let out = self.convert(&frame, from, to)?;
        Ok(out.pixels[0])
    }
}

/// Pull an out-of-gamut linear color toward its luminance until every
/// channel fits `[0, 1]`.
fn compress_to_gamut(rgb: [f64; 3]) -> [f64; 3] {
    let y = (rgb[0] * LUMA_REC709[0] + rgb[1] * LUMA_REC709[1] + rgb[2] * LUMA_REC709[2]).clamp(0.0, 1.0);
    let mut t = 1.0_f64;
    for &c in &rgb {
        let d = c - y;
        if c < 0.0 && d < 0.0 {
            t = t.min(y / -d);
        } else if c > 1.0 && d > 0.0 {
            t = t.min((1.0 - y) / d);
        }
    }
    rgb.map(|c| y + (c - y) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GradeError;

    fn gray_frame(value: f32, space: ProfileId, encoding: SampleEncoding) -> Frame {
        Frame::filled(4, 4, [value, value, value], space, encoding)
    }

    #[test]
    fn test_same_profile_is_identity() {
        let converter = ColorSpaceConverter::new();
        let frame = Frame::new(
            2,
            1,
            vec![[0.2, 0.4, 0.6], [0.9, 0.1, 0.3]],
            ProfileId::Srgb,
            SampleEncoding::Encoded,
        )
        .unwrap();
        let out = converter.convert(&frame, &ProfileId::Srgb, &ProfileId::Srgb).unwrap();
        for (a, b) in frame.pixels.iter().zip(&out.pixels) {
            for i in 0..3 {
                assert!((a[i] - b[i]).abs() < 1e-6, "channel {i}: {:.8} vs {:.8}", a[i], b[i]);
            }
        }
    }

    #[test]
    fn test_srgb_rec709_srgb_gray_roundtrip() {
        let converter = ColorSpaceConverter::new();
        for encoding in [SampleEncoding::Linear, SampleEncoding::Encoded] {
            let frame = gray_frame(0.5, ProfileId::Srgb, encoding);
            let mid = converter.convert(&frame, &ProfileId::Srgb, &ProfileId::Rec709).unwrap();
            let back = converter.convert(&mid, &ProfileId::Rec709, &ProfileId::Srgb).unwrap();
            for px in &back.pixels {
                for i in 0..3 {
                    assert!((px[i] - 0.5).abs() < 1e-3, "{encoding:?} channel {i}: {}", px[i]);
                }
            }
        }
    }

    #[test]
    fn test_rec709_to_rec2020_and_back() {
        let converter = ColorSpaceConverter::new();
        let frame = Frame::new(
            3,
            1,
            vec![[0.8, 0.2, 0.1], [0.1, 0.7, 0.3], [0.25, 0.25, 0.9]],
            ProfileId::Rec709,
            SampleEncoding::Encoded,
        )
        .unwrap();
        let wide = converter.convert(&frame, &ProfileId::Rec709, &ProfileId::Rec2020).unwrap();
        let back = converter.convert(&wide, &ProfileId::Rec2020, &ProfileId::Rec709).unwrap();
        for (a, b) in frame.pixels.iter().zip(&back.pixels) {
            for i in 0..3 {
                assert!((a[i] - b[i]).abs() < 1e-3, "channel {i}: {:.6} vs {:.6}", a[i], b[i]);
            }
        }
    }

    #[test]
    fn test_dci_white_adapts_to_d65_white() {
        let converter = ColorSpaceConverter::new();
        let out = converter
            .convert_pixel([1.0, 1.0, 1.0], &ProfileId::DciP3, &ProfileId::DisplayP3, SampleEncoding::Linear)
            .unwrap();
        for i in 0..3 {
            assert!((out[i] - 1.0).abs() < 1e-4, "channel {i}: {}", out[i]);
        }
    }

    #[test]
    fn test_absolute_intent_keeps_white_shift() {
        let converter = ColorSpaceConverter::new();
        let frame = gray_frame(0.5, ProfileId::DciP3, SampleEncoding::Linear);
        let out = converter
            .convert_with_intent(
                &frame,
                &ProfileId::DciP3,
                &ProfileId::DisplayP3,
                RenderingIntent::AbsoluteColorimetric,
            )
            .unwrap();
        let px = out.pixels[0];
        assert!((px[0] - px[2]).abs() > 1e-3, "DCI white should read as tinted under D65: {px:?}");
    }

    #[test]
    fn test_perceptual_intent_keeps_values_in_range_and_ordered() {
        let converter = ColorSpaceConverter::new();
        let frame = Frame::filled(1, 1, [0.0, 1.0, 0.0], ProfileId::Rec2020, SampleEncoding::Linear);
        let out = converter
            .convert_with_intent(&frame, &ProfileId::Rec2020, &ProfileId::Srgb, RenderingIntent::Perceptual)
            .unwrap();
        let px = out.pixels[0];
        assert!(px.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(px[1] > px[0] && px[1] > px[2], "green must stay dominant: {px:?}");
    }

    #[test]
    fn test_unknown_profile_is_configuration_error() {
        let converter = ColorSpaceConverter::new();
        let frame = gray_frame(0.5, ProfileId::Srgb, SampleEncoding::Linear);
        let err = converter
            .convert(&frame, &ProfileId::Srgb, &ProfileId::Custom("missing".into()))
            .unwrap_err();
        assert!(matches!(err, GradeError::Configuration(_)));
    }

    #[test]
    fn test_output_is_tagged_with_target_profile() {
        let converter = ColorSpaceConverter::new();
        let frame = gray_frame(0.3, ProfileId::Srgb, SampleEncoding::Encoded);
        let out = converter.convert(&frame, &ProfileId::Srgb, &ProfileId::AdobeRgb).unwrap();
        assert_eq!(out.color_space, ProfileId::AdobeRgb);
        assert_eq!(out.encoding, SampleEncoding::Encoded);
    }
}
