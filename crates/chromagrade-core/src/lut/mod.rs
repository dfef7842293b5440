//! Lookup-table engine: 1D/3D LUTs, `.cube`/`.3dl` interchange, generation,
//! analysis and a bounded named cache.
//!
//! 3D data is stored red-fastest everywhere in memory. The `.3dl` codec
//! reorders to and from its blue-fastest file layout.

pub mod analysis;
pub mod cache;
pub mod cube;
pub mod generate;
pub mod info;
pub mod looks;
pub mod lut1d;
pub mod lut3d;
pub mod three_dl;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};
use crate::frame::Frame;

pub use analysis::LutAnalysis;
pub use cache::{LutCache, LutResolver};
pub use generate::{color_space_lut, generate};
pub use info::{LutInfo, convert_batch, convert_format, probe_info};
pub use looks::{LOOKS, look};
pub use lut1d::Lut1D;
pub use lut3d::{Interpolation, Lut3D};

/// On-disk LUT format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LutFormat {
    Cube,
    #[serde(rename = "3dl")]
    ThreeDl,
}

impl LutFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Cube => "cube",
            Self::ThreeDl => "3dl",
        }
    }

    /// Format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> GradeResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "cube" => Ok(Self::Cube),
            "3dl" => Ok(Self::ThreeDl),
            _ => Err(GradeError::Configuration(format!(
                "unsupported LUT format: {}",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LutKind {
    #[serde(rename = "1d")]
    OneD,
    #[serde(rename = "3d")]
    ThreeD,
}

/// Everything a LUT file declares before its data.
#[derive(Debug, Clone, PartialEq)]
pub struct LutHeader {
    pub kind: LutKind,
    pub size: usize,
    pub title: Option<String>,
    pub metadata: Vec<(String, String)>,
    pub input_space: Option<ProfileId>,
    pub output_space: Option<ProfileId>,
    pub interpolation: Interpolation,
    pub domain_min: [f32; 3],
    pub domain_max: [f32; 3],
}

/// A loaded or generated LUT.
#[derive(Debug, Clone, PartialEq)]
pub enum Lut {
    OneD(Lut1D),
    ThreeD(Lut3D),
}

impl Lut {
    pub fn kind(&self) -> LutKind {
        match self {
            Self::OneD(_) => LutKind::OneD,
            Self::ThreeD(_) => LutKind::ThreeD,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::OneD(l) => l.size,
            Self::ThreeD(l) => l.size,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::OneD(l) => l.title.as_deref(),
            Self::ThreeD(l) => l.title.as_deref(),
        }
    }

    pub fn metadata(&self) -> &[(String, String)] {
        match self {
            Self::OneD(l) => &l.metadata,
            Self::ThreeD(l) => &l.metadata,
        }
    }

    pub fn input_space(&self) -> Option<&ProfileId> {
        match self {
            Self::OneD(l) => l.input_space.as_ref(),
            Self::ThreeD(l) => l.input_space.as_ref(),
        }
    }

    pub fn output_space(&self) -> Option<&ProfileId> {
        match self {
            Self::OneD(l) => l.output_space.as_ref(),
            Self::ThreeD(l) => l.output_space.as_ref(),
        }
    }

    /// 1D LUTs always interpolate linearly.
    pub fn interpolation(&self) -> Interpolation {
        match self {
            Self::OneD(_) => Interpolation::Trilinear,
            Self::ThreeD(l) => l.interpolation,
        }
    }

    pub fn domain(&self) -> ([f32; 3], [f32; 3]) {
        match self {
            Self::OneD(l) => (l.domain_min, l.domain_max),
            Self::ThreeD(l) => (l.domain_min, l.domain_max),
        }
    }

    pub fn data(&self) -> &[[f32; 3]] {
        match self {
            Self::OneD(l) => &l.data,
            Self::ThreeD(l) => &l.data,
        }
    }

    /// Whether the entry count matches the declared size.
    pub fn is_consistent(&self) -> bool {
        match self {
            Self::OneD(l) => l.is_consistent(),
            Self::ThreeD(l) => l.is_consistent(),
        }
    }

    pub fn header(&self) -> LutHeader {
        let (domain_min, domain_max) = self.domain();
        LutHeader {
            kind: self.kind(),
            size: self.size(),
            title: self.title().map(str::to_string),
            metadata: self.metadata().to_vec(),
            input_space: self.input_space().cloned(),
            output_space: self.output_space().cloned(),
            interpolation: self.interpolation(),
            domain_min,
            domain_max,
        }
    }

    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        match self {
            Self::OneD(l) => l.apply(rgb),
            Self::ThreeD(l) => l.apply(rgb),
        }
    }

    /// Apply to a frame, blending `intensity ∈ [0, 1]` of the result over the input.
    pub fn apply_frame(&self, frame: &Frame, intensity: f32) -> GradeResult<Frame> {
        if !(0.0..=1.0).contains(&intensity) {
            return Err(GradeError::Validation(format!(
                "LUT intensity must be in [0, 1], got {intensity}"
            )));
        }
        match self {
            Self::ThreeD(l) => l.apply_frame_blended(frame, intensity),
            Self::OneD(l) if intensity >= 1.0 => Ok(l.apply_frame(frame)),
            Self::OneD(l) => Ok(frame.map_pixels(|px| {
                let out = l.apply(px);
                [
                    px[0] + (out[0] - px[0]) * intensity,
                    px[1] + (out[1] - px[1]) * intensity,
                    px[2] + (out[2] - px[2]) * intensity,
                ]
            })),
        }
    }
}

impl From<Lut1D> for Lut {
    fn from(lut: Lut1D) -> Self {
        Self::OneD(lut)
    }
}

impl From<Lut3D> for Lut {
    fn from(lut: Lut3D) -> Self {
        Self::ThreeD(lut)
    }
}

/// Load a LUT, picking the codec from the file extension.
pub fn load(path: impl AsRef<Path>) -> GradeResult<Lut> {
    let path = path.as_ref();
    let lut = match LutFormat::from_path(path)? {
        LutFormat::Cube => cube::read(path)?,
        LutFormat::ThreeDl => three_dl::read(path)?,
    };
    tracing::info!("Loaded {:?} LUT {} (size {})", lut.kind(), path.display(), lut.size());
    Ok(lut)
}

/// Save a LUT, picking the codec from the file extension.
pub fn save(lut: &Lut, path: impl AsRef<Path>) -> GradeResult<()> {
    let path = path.as_ref();
    match LutFormat::from_path(path)? {
        LutFormat::Cube => cube::write(path, lut)?,
        LutFormat::ThreeDl => three_dl::write(path, lut)?,
    }
    tracing::info!("Saved LUT {} (size {})", path.display(), lut.size());
    Ok(())
}
