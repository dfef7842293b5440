//! Operator dispatch, encoded HDR input, SDR expansion and batches.

use enough::Stop;
use rayon::prelude::*;

use super::local::{durand, mantiuk};
use super::metadata::{HdrFormat, HdrMetadata};
use super::operators::{MapContext, aces, drago, filmic, hable, reinhard};
use super::settings::{ToneMappingMethod, ToneMappingSettings};
use crate::color_management::profile::ProfileId;
use crate::color_management::transfer::{
    HlgTransfer, PQ_MAX_LUMINANCE, PqTransfer, Rec709Transfer, TransferFunction, TransferFunctionId,
    get_transfer,
};
use crate::error::{GradeError, GradeResult};
use crate::frame::{Frame, SampleEncoding};

/// Rec. 709 luminance weights.
pub const LUMA_REC709: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// Rec. 2020 luminance weights.
pub const LUMA_REC2020: [f64; 3] = [0.2627, 0.6780, 0.0593];

/// Luminance weights for the primaries behind a profile id.
pub fn luma_weights(space: &ProfileId) -> [f64; 3] {
    match space {
        ProfileId::Rec2020 | ProfileId::Rec2100Pq | ProfileId::Rec2100Hlg => LUMA_REC2020,
        _ => LUMA_REC709,
    }
}

/// Stateless tone-mapping front end.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToneMapper {
    hlg: HlgTransfer,
}

impl ToneMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-nominal HLG display for [`map_encoded`](Self::map_encoded).
    pub fn with_hlg(hlg: HlgTransfer) -> Self {
        Self { hlg }
    }

    /// Map a linear HDR frame (1.0 = 10000 cd/m²) to linear SDR
    /// (1.0 = target peak), clamped to `[0, 1]`.
    pub fn map(
        &self,
        frame: &Frame,
        metadata: &HdrMetadata,
        settings: &ToneMappingSettings,
    ) -> GradeResult<Frame> {
        if frame.encoding != SampleEncoding::Linear {
            return Err(GradeError::Validation(
                "tone mapping needs a linear frame; use map_encoded for PQ/HLG input".into(),
            ));
        }
        settings.validate()?;
        metadata.validate()?;
        if frame.is_empty() {
            return Ok(frame.clone());
        }

        let ctx = MapContext {
            width: frame.width as usize,
            height: frame.height as usize,
            luma: luma_weights(&frame.color_space),
            metadata,
            settings,
        };
        tracing::debug!(
            "tone mapping {}x{} with {} to {} cd/m²",
            frame.width,
            frame.height,
            settings.method.label(),
            settings.target_peak_luminance
        );

        let mapped = match settings.method {
            ToneMappingMethod::Reinhard => reinhard(&frame.pixels, &ctx),
            ToneMappingMethod::Filmic => filmic(&frame.pixels, &ctx),
            ToneMappingMethod::Aces => aces(&frame.pixels, &ctx),
            ToneMappingMethod::Hable => hable(&frame.pixels, &ctx),
            ToneMappingMethod::Drago => drago(&frame.pixels, &ctx),
            ToneMappingMethod::Durand => durand(&frame.pixels, &ctx),
            ToneMappingMethod::Mantiuk => mantiuk(&frame.pixels, &ctx),
        };

        let weight = settings.preserve_saturation as f32;
        let pixels = frame
            .pixels
            .par_iter()
            .zip(mapped.into_par_iter())
            .map(|(&original, mapped)| {
                blend_saturation(original, mapped, weight).map(|v| {
                    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
                })
            })
            .collect();
        Ok(frame.with_pixels(pixels))
    }

    /// Decode a PQ/HLG (or other) encoded frame, map it, and encode the
    /// result with the Rec. 709 OETF.
    ///
    /// The decode follows `metadata.transfer`. Non-HDR transfers treat
    /// decoded 1.0 as `metadata.max_luminance`.
    pub fn map_encoded(
        &self,
        frame: &Frame,
        metadata: &HdrMetadata,
        settings: &ToneMappingSettings,
    ) -> GradeResult<Frame> {
        if frame.encoding != SampleEncoding::Encoded {
            return Err(GradeError::Validation("map_encoded needs an encoded frame".into()));
        }
        let linear = self.decode_to_normalized(frame, metadata)?;
        let mapped = self.map(&linear, metadata, settings)?;

        let oetf = Rec709Transfer;
        let mut out = mapped.map_pixels(|px| px.map(|v| oetf.to_encoded(v as f64) as f32));
        out.encoding = SampleEncoding::Encoded;
        out.color_space = match frame.color_space {
            ProfileId::Rec2020 | ProfileId::Rec2100Pq | ProfileId::Rec2100Hlg => ProfileId::Rec2020,
            _ => ProfileId::Rec709,
        };
        Ok(out)
    }

    fn decode_to_normalized(&self, frame: &Frame, metadata: &HdrMetadata) -> GradeResult<Frame> {
        let mut linear = match metadata.transfer {
            TransferFunctionId::Pq => {
                let pq = PqTransfer;
                frame.map_pixels(|px| px.map(|v| pq.to_linear(v as f64) as f32))
            }
            TransferFunctionId::Hlg => {
                let hlg = self.hlg;
                frame.map_pixels(|px| {
                    let nits = hlg.eotf_rgb([px[0] as f64, px[1] as f64, px[2] as f64]);
                    nits.map(|n| (n / PQ_MAX_LUMINANCE) as f32)
                })
            }
            other => {
                let scale = metadata.max_luminance / PQ_MAX_LUMINANCE;
                match get_transfer(other)? {
                    Some(tf) => frame.map_pixels(|px| px.map(|v| (tf.to_linear(v as f64) * scale) as f32)),
                    None => frame.map_pixels(|px| px.map(|v| (v as f64 * scale) as f32)),
                }
            }
        };
        linear.encoding = SampleEncoding::Linear;
        Ok(linear)
    }

    /// Inverse tone mapping: SDR to linear HDR (1.0 = 10000 cd/m²).
    ///
    /// Encoded input is decoded with a pure power of
    /// `settings.target_system_gamma` (BT.1886 display), then SDR white is
    /// placed at `target_peak` cd/m².
    pub fn expand_sdr(
        &self,
        frame: &Frame,
        target_peak: f64,
        settings: &ToneMappingSettings,
    ) -> GradeResult<Frame> {
        if !(target_peak > 0.0 && target_peak <= PQ_MAX_LUMINANCE) {
            return Err(GradeError::Validation(format!(
                "target peak must be in (0, 10000] cd/m², got {target_peak}"
            )));
        }
        settings.validate()?;

        let gamma = settings.target_system_gamma;
        let scale = target_peak / PQ_MAX_LUMINANCE;
        let decode = frame.encoding == SampleEncoding::Encoded;
        let mut out = frame.map_pixels(|px| {
            px.map(|v| {
                let v = (v as f64).clamp(0.0, 1.0);
                let linear = if decode { v.powf(gamma) } else { v };
                (linear * scale) as f32
            })
        });
        out.encoding = SampleEncoding::Linear;
        Ok(out)
    }

    /// Measure mastering metadata from a linear HDR frame.
    pub fn analyze_metadata(&self, frame: &Frame, format: HdrFormat) -> GradeResult<HdrMetadata> {
        HdrMetadata::analyze(frame, format, luma_weights(&frame.color_space))
    }

    /// Map many frames in parallel. `stop` is checked before each frame.
    /// Output order matches input order.
    pub fn map_batch(
        &self,
        frames: &[Frame],
        metadata: &HdrMetadata,
        settings: &ToneMappingSettings,
        stop: impl Stop + Sync,
    ) -> GradeResult<Vec<Frame>> {
        frames
            .par_iter()
            .map(|frame| {
                stop.check()?;
                match frame.encoding {
                    SampleEncoding::Linear => self.map(frame, metadata, settings),
                    SampleEncoding::Encoded => self.map_encoded(frame, metadata, settings),
                }
            })
            .collect()
    }
}

/// Blend HSV saturation of `mapped` toward that of `original` by `weight`,
/// keeping the mapped hue and value.
fn blend_saturation(original: [f32; 3], mapped: [f32; 3], weight: f32) -> [f32; 3] {
    let saturation = |c: [f32; 3]| {
        let c = c.map(|v| v.max(0.0));
        let max = c[0].max(c[1]).max(c[2]);
        let min = c[0].min(c[1]).min(c[2]);
        if max > 0.0 { (max - min) / max } else { 0.0 }
    };

    let s_map = saturation(mapped);
    if s_map <= 1e-7 {
        return mapped;
    }
    let s_orig = saturation(original);
    let target = (weight * s_orig + (1.0 - weight) * s_map).clamp(0.0, 1.0);
    if (target - s_map).abs() < 1e-7 {
        return mapped;
    }

    let v = mapped[0].max(mapped[1]).max(mapped[2]);
    let k = target / s_map;
    mapped.map(|c| v - (v - c.max(0.0)) * k)
}

#[cfg(test)]
mod tests {
    use enough::{StopReason, Unstoppable};

    use super::*;

    const EPSILON: f32 = 1e-3;

    struct ImmediateCancel;

    impl Stop for ImmediateCancel {
        fn check(&self) -> Result<(), StopReason> {
            Err(StopReason::Cancelled)
        }
    }

    fn pq_flat(nits: f64) -> Frame {
        let e = PqTransfer.encode_nits(nits) as f32;
        Frame::filled(8, 8, [e; 3], ProfileId::Rec2100Pq, SampleEncoding::Encoded)
    }

    #[test]
    fn test_pq_1000_nits_reinhard_to_100() {
        let mapper = ToneMapper::new();
        let out = mapper
            .map_encoded(&pq_flat(1000.0), &HdrMetadata::default(), &ToneMappingSettings::default())
            .unwrap();
        let expected = 4.5 * (0.01 / 1.01);
        let mean = out.mean_rgb();
        for i in 0..3 {
            assert!(
                (mean[i] as f64 - expected).abs() < 1e-3,
                "channel {i}: {:.6} vs {:.6}",
                mean[i],
                expected
            );
        }
        assert_eq!(out.color_space, ProfileId::Rec2020);
        assert_eq!(out.encoding, SampleEncoding::Encoded);
    }

    #[test]
    fn test_every_method_stays_within_target_peak() {
        let mapper = ToneMapper::new();
        let pixels: Vec<[f32; 3]> = (0..64)
            .map(|i| {
                let t = i as f32 / 63.0;
                [t, t * 0.5, 0.02 + t * 0.1]
            })
            .collect();
        let frame = Frame::new(8, 8, pixels, ProfileId::Rec2020, SampleEncoding::Linear).unwrap();
        for method in ToneMappingMethod::ALL {
            let out = mapper
                .map(&frame, &HdrMetadata::with_peak(10_000.0), &ToneMappingSettings::with_method(method))
                .unwrap();
            for px in &out.pixels {
                let l = LUMA_REC2020[0] as f32 * px[0] + LUMA_REC2020[1] as f32 * px[1] + LUMA_REC2020[2] as f32 * px[2];
                assert!(l <= 1.0 + EPSILON, "{method:?}: {l}");
                assert!(px.iter().all(|v| (0.0..=1.0).contains(v)));
            }
        }
    }

    #[test]
    fn test_metadata_analyzed_from_flat_frame_feeds_map() {
        let mapper = ToneMapper::new();
        for level in [0.0, 0.1] {
            let frame = Frame::filled(4, 4, [level; 3], ProfileId::Rec2020, SampleEncoding::Linear);
            let meta = mapper.analyze_metadata(&frame, HdrFormat::Hdr10).unwrap();
            let out = mapper.map(&frame, &meta, &ToneMappingSettings::default()).unwrap();
            assert_eq!(out.pixels.len(), 16);
            assert!(out.pixels.iter().flatten().all(|v| (0.0..=1.0).contains(v)), "level {level}");
        }
    }

    #[test]
    fn test_map_rejects_encoded_frame() {
        let err = ToneMapper::new()
            .map(&pq_flat(100.0), &HdrMetadata::default(), &ToneMappingSettings::default())
            .unwrap_err();
        assert!(matches!(err, GradeError::Validation(_)));
    }

    #[test]
    fn test_hlg_input_decodes_through_ootf() {
        let mapper = ToneMapper::new();
        let frame = Frame::filled(2, 2, [0.75; 3], ProfileId::Rec2100Hlg, SampleEncoding::Encoded);
        let meta = HdrMetadata {
            format: HdrFormat::Hlg,
            transfer: TransferFunctionId::Hlg,
            ..HdrMetadata::default()
        };
        let out = mapper.map_encoded(&frame, &meta, &ToneMappingSettings::default()).unwrap();
        let v = out.pixels[0][0];
        assert!(v > 0.0 && v < 1.0, "{v}");
    }

    #[test]
    fn test_expand_sdr_places_white_at_peak() {
        let mapper = ToneMapper::new();
        let frame = Frame::filled(2, 2, [1.0; 3], ProfileId::Rec709, SampleEncoding::Encoded);
        let out = mapper.expand_sdr(&frame, 1000.0, &ToneMappingSettings::default()).unwrap();
        assert!((out.pixels[0][0] - 0.1).abs() < 1e-6);
        assert_eq!(out.encoding, SampleEncoding::Linear);
        assert!(mapper.expand_sdr(&frame, 0.0, &ToneMappingSettings::default()).is_err());
    }

    #[test]
    fn test_saturation_blend_restores_original_saturation() {
        let original = [0.8, 0.4, 0.2];
        let mapped = [0.5, 0.45, 0.4];
        let out = blend_saturation(original, mapped, 1.0);
        let s = |c: [f32; 3]| (c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])) / c[0].max(c[1]).max(c[2]);
        assert!((s(out) - s(original)).abs() < 1e-5);
        assert!((out[0] - 0.5).abs() < 1e-6, "value must be kept");
        assert_eq!(blend_saturation(original, mapped, 0.0), mapped);
    }

    #[test]
    fn test_saturation_weight_above_one_extrapolates() {
        let original = [0.8, 0.6, 0.4];
        let mapped = [0.5, 0.45, 0.4];
        let out = blend_saturation(original, mapped, 1.5);
        let s = |c: [f32; 3]| (c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])) / c[0].max(c[1]).max(c[2]);
        // 1.5 * 0.5 - 0.5 * 0.2
        assert!((s(out) - 0.65).abs() < 1e-5, "{}", s(out));
        assert!(s(out) > s(original));
    }

    #[test]
    fn test_batch_cancellation() {
        let mapper = ToneMapper::new();
        let frames = vec![pq_flat(400.0), pq_flat(800.0)];
        let ok = mapper
            .map_batch(&frames, &HdrMetadata::default(), &ToneMappingSettings::default(), Unstoppable)
            .unwrap();
        assert_eq!(ok.len(), 2);
        let err = mapper
            .map_batch(&frames, &HdrMetadata::default(), &ToneMappingSettings::default(), ImmediateCancel)
            .unwrap_err();
        assert!(matches!(err, GradeError::Cancelled(StopReason::Cancelled)));
    }
}
