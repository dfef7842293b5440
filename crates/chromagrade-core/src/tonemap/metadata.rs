//! HDR mastering metadata.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color_management::profile::Primaries;
use crate::color_management::transfer::{PQ_MAX_LUMINANCE, PQ_MIN_LUMINANCE, TransferFunctionId};
use crate::error::{GradeError, GradeResult};
use crate::frame::{Frame, SampleEncoding};

/// Signalling format of the HDR stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HdrFormat {
    Sdr,
    /// Static SMPTE ST 2086 metadata.
    #[default]
    Hdr10,
    /// Dynamic per-scene metadata.
    Hdr10Plus,
    DolbyVision,
    Hlg,
}

impl HdrFormat {
    /// Transfer function the format implies.
    pub fn transfer(self) -> TransferFunctionId {
        match self {
            Self::Sdr => TransferFunctionId::Rec709,
            Self::Hlg => TransferFunctionId::Hlg,
            Self::Hdr10 | Self::Hdr10Plus | Self::DolbyVision => TransferFunctionId::Pq,
        }
    }
}

/// Mastering display and content light levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HdrMetadata {
    pub format: HdrFormat,
    /// Mastering display primaries and white point.
    pub mastering_primaries: Primaries,
    /// cd/m²
    pub max_luminance: f64,
    /// cd/m²
    pub min_luminance: f64,
    /// Maximum content light level, cd/m².
    pub max_cll: f64,
    /// Maximum frame-average light level, cd/m².
    pub max_fall: f64,
    pub transfer: TransferFunctionId,
    pub target_primaries: Option<Primaries>,
}

impl Default for HdrMetadata {
    fn default() -> Self {
        Self {
            format: HdrFormat::Hdr10,
            mastering_primaries: Primaries::REC709,
            max_luminance: 1000.0,
            min_luminance: PQ_MIN_LUMINANCE,
            max_cll: 0.0,
            max_fall: 0.0,
            transfer: TransferFunctionId::Pq,
            target_primaries: None,
        }
    }
}

impl HdrMetadata {
    /// Metadata for a given peak, everything else at defaults.
    pub fn with_peak(max_luminance: f64) -> Self {
        Self {
            max_luminance,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> GradeResult<()> {
        if !(self.max_luminance.is_finite() && self.max_luminance > 0.0) {
            return Err(GradeError::Validation(format!(
                "max_luminance must be positive, got {}",
                self.max_luminance
            )));
        }
        if !(self.min_luminance >= 0.0 && self.min_luminance < self.max_luminance) {
            return Err(GradeError::Validation(format!(
                "min_luminance {} must be in [0, {})",
                self.min_luminance, self.max_luminance
            )));
        }
        Ok(())
    }

    /// Measure light levels of a linear HDR frame (1.0 = 10000 cd/m²).
    ///
    /// Luminance uses `luma` weights. `min_luminance` is the smallest
    /// positive luminance. The result always validates: a frame with no
    /// luminance range gets the PQ floor as its minimum, and one with no
    /// light above that floor keeps the default mastering peak.
    pub fn analyze(frame: &Frame, format: HdrFormat, luma: [f64; 3]) -> GradeResult<Self> {
        if frame.encoding != SampleEncoding::Linear {
            return Err(GradeError::Validation(
                "metadata analysis needs a linear frame".into(),
            ));
        }
        if frame.is_empty() {
            return Ok(Self {
                format,
                transfer: format.transfer(),
                ..Self::default()
            });
        }

        #[derive(Clone, Copy)]
        struct Levels {
            max_lum: f64,
            min_lum: f64,
            max_channel: f64,
            sum_lum: f64,
        }

        let empty = || Levels {
            max_lum: 0.0,
            min_lum: f64::INFINITY,
            max_channel: 0.0,
            sum_lum: 0.0,
        };

        let levels = frame
            .pixels
            .par_iter()
            .fold(empty, |mut acc, px| {
                let l = (luma[0] * px[0] as f64 + luma[1] * px[1] as f64 + luma[2] * px[2] as f64).max(0.0);
                acc.max_lum = acc.max_lum.max(l);
                if l > 0.0 {
                    acc.min_lum = acc.min_lum.min(l);
                }
                acc.max_channel = acc.max_channel.max(px[0].max(px[1]).max(px[2]) as f64);
                acc.sum_lum += l;
                acc
            })
            .reduce(empty, |a, b| Levels {
                max_lum: a.max_lum.max(b.max_lum),
                min_lum: a.min_lum.min(b.min_lum),
                max_channel: a.max_channel.max(b.max_channel),
                sum_lum: a.sum_lum + b.sum_lum,
            });

        let mut max_luminance = levels.max_lum * PQ_MAX_LUMINANCE;
        if max_luminance <= PQ_MIN_LUMINANCE {
            max_luminance = Self::default().max_luminance;
        }
        let mut min_luminance = if levels.min_lum.is_finite() {
            levels.min_lum * PQ_MAX_LUMINANCE
        } else {
            PQ_MIN_LUMINANCE
        };
        if min_luminance >= max_luminance {
            min_luminance = PQ_MIN_LUMINANCE;
        }

        Ok(Self {
            format,
            max_luminance,
            min_luminance,
            max_cll: levels.max_channel * PQ_MAX_LUMINANCE,
            max_fall: levels.sum_lum / frame.pixel_count() as f64 * PQ_MAX_LUMINANCE,
            transfer: format.transfer(),
            ..Self::default()
        })
    }
}
