//! Versioned preset documents and the built-in grades.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::operation::{
    ContrastParams, GradingOperation, OperationKind, SaturationParams, ShadowsHighlightsParams,
    VibranceParams, WhiteBalanceParams,
};
use super::stack::OperationStack;
use super::wheels::{Wheel, WheelParams};
use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};
use crate::lut::{Interpolation, LutInfo};

/// Newest preset schema this crate reads and the one it writes.
pub const PRESET_SCHEMA_VERSION: u32 = 1;

/// Global grading adjustments stored alongside a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorGradingSettings {
    pub working_space: ProfileId,
    pub output_space: ProfileId,
    /// Grid size for LUTs baked from the stack.
    pub lut_size: usize,
    pub interpolation: Interpolation,
    /// Clamp graded frames to `[0, 1]`.
    pub auto_clamp: bool,
}

impl Default for ColorGradingSettings {
    fn default() -> Self {
        Self {
            working_space: ProfileId::Rec709,
            output_space: ProfileId::Srgb,
            lut_size: 33,
            interpolation: Interpolation::Trilinear,
            auto_clamp: true,
        }
    }
}

impl ColorGradingSettings {
    pub fn validate(&self) -> GradeResult<()> {
        if !(2..=129).contains(&self.lut_size) {
            return Err(GradeError::Validation(format!(
                "LUT size must be in 2..=129, got {}",
                self.lut_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub schema_version: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub operations: Vec<GradingOperation>,
    #[serde(default)]
    pub adjustments: ColorGradingSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lut: Option<LutInfo>,
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: Option<u32>,
}

impl Preset {
    pub const BUILTIN: [&'static str; 3] = ["cinematic", "vintage", "vibrant"];

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_version: PRESET_SCHEMA_VERSION,
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            operations: Vec::new(),
            adjustments: ColorGradingSettings::default(),
            lut: None,
        }
    }

    /// Snapshot a stack.
    pub fn from_stack(name: impl Into<String>, stack: &OperationStack, adjustments: ColorGradingSettings) -> Self {
        Self {
            operations: stack.snapshot(),
            adjustments,
            ..Self::new(name)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lut(mut self, lut: LutInfo) -> Self {
        self.lut = Some(lut);
        self
    }

    /// Replace `stack`'s contents with this preset's operations.
    pub fn apply_to(&self, stack: &OperationStack) -> GradeResult<()> {
        stack.restore(self.operations.clone())
    }

    pub fn validate(&self) -> GradeResult<()> {
        self.adjustments.validate()?;
        for op in &self.operations {
            op.validate()?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> GradeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a preset document. Documents from a newer schema are refused.
    pub fn from_json(json: &str) -> GradeResult<Self> {
        let probe: VersionProbe = serde_json::from_str(json).map_err(GradeError::malformed_json)?;
        match probe.schema_version {
            None => {
                return Err(GradeError::Configuration("preset has no schema_version".to_string()));
            }
            Some(v) if v > PRESET_SCHEMA_VERSION => {
                return Err(GradeError::Configuration(format!(
                    "preset schema version {v} is newer than supported version {PRESET_SCHEMA_VERSION}"
                )));
            }
            Some(_) => {}
        }
        let preset: Self = serde_json::from_str(json).map_err(GradeError::malformed_json)?;
        preset.validate()?;
        Ok(preset)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> GradeResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Saved preset '{}' to {}", self.name, path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> GradeResult<Self> {
        let path = path.as_ref();
        let preset = Self::from_json(&std::fs::read_to_string(path)?)?;
        tracing::info!(
            "Loaded preset '{}' ({} operations) from {}",
            preset.name,
            preset.operations.len(),
            path.display()
        );
        Ok(preset)
    }

    /// A built-in grade by name.
    pub fn builtin(name: &str) -> GradeResult<Self> {
        let (description, tags, kinds) = match name {
            "cinematic" => (
                "Film-like contrast with restrained saturation",
                ["film", "contrast"],
                vec![
                    OperationKind::Contrast(ContrastParams::new(1.2)),
                    OperationKind::Saturation(SaturationParams { saturation: 0.9, luma_mix: 0.0 }),
                    OperationKind::Vibrance(VibranceParams { vibrance: 1.1 }),
                    OperationKind::ShadowsHighlights(ShadowsHighlightsParams {
                        shadows_amount: -0.2,
                        highlights_amount: 0.1,
                        ..Default::default()
                    }),
                ],
            ),
            "vintage" => (
                "Warm, faded and desaturated",
                ["retro", "warm"],
                vec![
                    OperationKind::Contrast(ContrastParams::new(1.1)),
                    OperationKind::Saturation(SaturationParams { saturation: 0.7, luma_mix: 0.0 }),
                    OperationKind::WhiteBalance(WhiteBalanceParams { temperature: 0.3, tint: 0.0 }),
                    OperationKind::Wheel(WheelParams { shadows: Wheel::level(0.2), ..Default::default() }),
                ],
            ),
            "vibrant" => (
                "Punchy contrast and saturated color",
                ["saturated", "contrast"],
                vec![
                    OperationKind::Contrast(ContrastParams::new(1.3)),
                    OperationKind::Saturation(SaturationParams { saturation: 1.4, luma_mix: 0.0 }),
                    OperationKind::Vibrance(VibranceParams { vibrance: 1.2 }),
                ],
            ),
            other => {
                return Err(GradeError::Configuration(format!("unknown preset '{other}'")));
            }
        };

        let stack = OperationStack::new();
        for kind in kinds {
            stack.push(kind)?;
        }
        Ok(Self::from_stack(name, &stack, ColorGradingSettings::default())
            .with_description(description)
            .with_tags(tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::curves::{CurveChannel, CurveParams};
    use crate::grading::operation::LutParams;
    use crate::lut::{Lut, Lut3D};

    fn rich_preset() -> Preset {
        let stack = OperationStack::new();
        stack
            .push(OperationKind::Curve(CurveParams::new(
                CurveChannel::Luma,
                vec![[0.0, 0.05], [0.5, 0.45], [1.0, 0.95]],
            )))
            .unwrap();
        let id = stack
            .push(OperationKind::Lut(LutParams { lut_name: "teal".into(), intensity: 0.35 }))
            .unwrap();
        stack.set_opacity(id, 0.8).unwrap();
        stack.add(
            GradingOperation::new(OperationKind::Contrast(ContrastParams::new(1.15)))
                .unwrap()
                .with_mask("faces")
                .disabled(),
        );
        let lut = LutInfo::from_lut("teal", &Lut::ThreeD(Lut3D::identity(17).unwrap()));
        Preset::from_stack("Teal & Orange", &stack, ColorGradingSettings::default())
            .with_description("test")
            .with_tags(["a", "b"])
            .with_lut(lut)
    }

    #[test]
    fn test_json_roundtrip_is_exact() {
        let preset = rich_preset();
        let back = Preset::from_json(&preset.to_json().unwrap()).unwrap();
        assert_eq!(back, preset);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("look.json");
        let preset = rich_preset();
        preset.save(&path).unwrap();
        assert_eq!(Preset::load(&path).unwrap(), preset);
    }

    #[test]
    fn test_newer_schema_is_configuration_error() {
        let mut preset = Preset::new("future");
        preset.schema_version = PRESET_SCHEMA_VERSION + 1;
        let json = serde_json::to_string(&preset).unwrap();
        assert!(matches!(Preset::from_json(&json), Err(GradeError::Configuration(_))));
    }

    #[test]
    fn test_malformed_json_reports_line() {
        let err = Preset::from_json("{\n  \"schema_version\": 1,\n  \"name\": \n}").unwrap_err();
        assert!(matches!(err, GradeError::Parse { line: 4, .. }), "{err:?}");
    }

    #[test]
    fn test_invalid_operation_in_document_is_rejected() {
        let json = r#"{
            "schema_version": 1,
            "name": "bad",
            "operations": [
                { "id": 1, "kind": { "type": "exposure", "params": { "stops": 1.0 } }, "opacity": 3.0 }
            ]
        }"#;
        assert!(matches!(Preset::from_json(json), Err(GradeError::Validation(_))));
    }

    #[test]
    fn test_builtins_load_into_stack() {
        for name in Preset::BUILTIN {
            let preset = Preset::builtin(name).unwrap();
            assert!(!preset.operations.is_empty(), "{name}");
            let stack = OperationStack::new();
            preset.apply_to(&stack).unwrap();
            assert_eq!(stack.snapshot(), preset.operations);
        }
        assert!(matches!(Preset::builtin("noir"), Err(GradeError::Configuration(_))));
    }
}
