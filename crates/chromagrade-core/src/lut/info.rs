//! LUT descriptors, header probing and format conversion.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::lut3d::Interpolation;
use super::{Lut, LutFormat, LutHeader, LutKind, cube, three_dl};
use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};

/// Describes a LUT without carrying its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LutInfo {
    pub name: String,
    /// `None` for LUTs generated in memory.
    #[serde(default)]
    pub format: Option<LutFormat>,
    pub kind: LutKind,
    pub size: usize,
    #[serde(default)]
    pub input_space: Option<ProfileId>,
    #[serde(default)]
    pub output_space: Option<ProfileId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
}

impl LutInfo {
    pub fn from_header(name: impl Into<String>, header: LutHeader) -> Self {
        Self {
            name: name.into(),
            format: None,
            kind: header.kind,
            size: header.size,
            input_space: header.input_space,
            output_space: header.output_space,
            title: header.title,
            interpolation: header.interpolation,
            path: None,
            metadata: header.metadata,
        }
    }

    pub fn from_lut(name: impl Into<String>, lut: &Lut) -> Self {
        Self::from_header(name, lut.header())
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>, format: LutFormat) -> Self {
        self.path = Some(path.into());
        self.format = Some(format);
        self
    }
}

/// File stem used as the default LUT name.
pub(crate) fn default_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("lut")
        .to_string()
}

/// Read a LUT file's header. `.cube` stops at the first data line.
pub fn probe_info(path: impl AsRef<Path>) -> GradeResult<LutInfo> {
    let path = path.as_ref();
    let format = LutFormat::from_path(path)?;
    let header = match format {
        LutFormat::Cube => cube::read_header(path)?,
        LutFormat::ThreeDl => three_dl::read_header(path)?,
    };
    Ok(LutInfo::from_header(default_name(path), header).with_source(path, format))
}

/// Rewrite `input` into the format implied by `output`'s extension.
pub fn convert_format(input: impl AsRef<Path>, output: impl AsRef<Path>) -> GradeResult<()> {
    let lut = super::load(input)?;
    super::save(&lut, output)
}

/// Convert each input into `output_dir` with the target format's extension.
///
/// One failing file does not stop the batch; each input gets its own result.
pub fn convert_batch(
    inputs: &[PathBuf],
    output_dir: impl AsRef<Path>,
    target: LutFormat,
) -> Vec<(PathBuf, GradeResult<PathBuf>)> {
    let output_dir = output_dir.as_ref();
    let results: Vec<(PathBuf, GradeResult<PathBuf>)> = inputs
        .iter()
        .map(|input| {
            let out = output_dir.join(format!("{}.{}", default_name(input), target.extension()));
            let result = convert_format(input, &out).map(|_| out);
            if let Err(e) = &result {
                tracing::warn!("LUT conversion failed for {}: {e}", input.display());
            }
            (input.clone(), result)
        })
        .collect();
    let converted = results.iter().filter(|(_, r)| r.is_ok()).count();
    tracing::info!("Converted {converted} of {} LUT files", inputs.len());
    results
}

impl std::str::FromStr for LutFormat {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim_start_matches('.') {
            "cube" => Ok(Self::Cube),
            "3dl" => Ok(Self::ThreeDl),
            other => Err(GradeError::Configuration(format!("unknown LUT format '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::{Lut3D, load, save};

    #[test]
    fn test_probe_reads_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warm.cube");
        let lut = Lut3D::identity(5)
            .unwrap()
            .with_title("Warm")
            .with_spaces(ProfileId::Rec709, ProfileId::Rec709)
            .with_metadata("author", "grader");
        save(&Lut::ThreeD(lut), &path).unwrap();

        let info = probe_info(&path).unwrap();
        assert_eq!(info.name, "warm");
        assert_eq!(info.format, Some(LutFormat::Cube));
        assert_eq!(info.kind, LutKind::ThreeD);
        assert_eq!(info.size, 5);
        assert_eq!(info.title.as_deref(), Some("Warm"));
        assert_eq!(info.input_space, Some(ProfileId::Rec709));
        assert_eq!(info.metadata, vec![("author".to_string(), "grader".to_string())]);
    }

    #[test]
    fn test_convert_cube_to_3dl_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let cube_path = dir.path().join("grade.cube");
        let dl_path = dir.path().join("grade.3dl");
        let lut = crate::lut::generate(5, |rgb| [rgb[2], rgb[0], rgb[1]], enough::Unstoppable).unwrap();
        save(&Lut::ThreeD(lut.clone()), &cube_path).unwrap();

        convert_format(&cube_path, &dl_path).unwrap();
        let Lut::ThreeD(back) = load(&dl_path).unwrap() else {
            panic!("expected 3D LUT");
        };
        assert_eq!(back.data, lut.data);
    }

    #[test]
    fn test_batch_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.cube");
        save(&Lut::ThreeD(Lut3D::identity(3).unwrap()), &good).unwrap();
        let missing = dir.path().join("missing.cube");

        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();
        let results = convert_batch(&[good, missing], &out_dir, LutFormat::ThreeDl);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(GradeError::Io(_))));
        assert!(out_dir.join("good.3dl").exists());
    }

    #[test]
    fn test_info_json_roundtrip() {
        let info = LutInfo::from_lut("id", &Lut::ThreeD(Lut3D::identity(2).unwrap()));
        let json = serde_json::to_string(&info).unwrap();
        let back: LutInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(".CUBE".parse::<LutFormat>().unwrap(), LutFormat::Cube);
        assert!("csp".parse::<LutFormat>().is_err());
    }
}
