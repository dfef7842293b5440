//! Engine configuration.
//!
//! Every field has a default, so a document only needs to name the values it
//! overrides. An empty JSON object is a complete configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};
use crate::grading::ColorGradingSettings;
use crate::lut::{Interpolation, LutCache};
use crate::tonemap::ToneMappingSettings;

/// Largest worker pool the engine will build.
pub const MAX_WORKER_THREADS: usize = 256;

/// Configuration for a [`GradingEngine`](crate::engine::GradingEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for batch jobs. 0 lets rayon pick (one per core).
    pub worker_threads: usize,
    /// Named LUTs kept before the oldest is evicted.
    pub lut_cache_capacity: usize,
    /// Graded frames kept before the oldest is evicted. 0 disables the cache.
    pub frame_cache_capacity: usize,
    /// Interpolation given to LUTs the engine generates.
    pub default_interpolation: Interpolation,
    pub grading: ColorGradingSettings,
    pub tone_mapping: ToneMappingSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            lut_cache_capacity: LutCache::DEFAULT_CAPACITY,
            frame_cache_capacity: 1000,
            default_interpolation: Interpolation::Trilinear,
            grading: ColorGradingSettings::default(),
            tone_mapping: ToneMappingSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> GradeResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(GradeError::malformed_json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> GradeResult<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        tracing::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> GradeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> GradeResult<()> {
        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(GradeError::Validation(format!(
                "worker_threads must be at most {MAX_WORKER_THREADS}, got {}",
                self.worker_threads
            )));
        }
        if self.lut_cache_capacity == 0 {
            return Err(GradeError::Validation("lut_cache_capacity must be at least 1".into()));
        }
        self.grading.validate()?;
        self.tone_mapping.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color_management::profile::ProfileId;
    use crate::tonemap::ToneMappingMethod;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.lut_cache_capacity, 32);
        assert_eq!(config.frame_cache_capacity, 1000);
        assert_eq!(config.default_interpolation, Interpolation::Trilinear);
    }

    #[test]
    fn test_partial_document_overrides_named_fields() {
        let json = r#"{
            "worker_threads": 4,
            "default_interpolation": "tetrahedral",
            "grading": { "lut_size": 17 },
            "tone_mapping": { "method": "hable", "target_peak_luminance": 200.0 }
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.default_interpolation, Interpolation::Tetrahedral);
        assert_eq!(config.grading.lut_size, 17);
        assert_eq!(config.grading.working_space, ProfileId::Rec709);
        assert_eq!(config.tone_mapping.method, ToneMappingMethod::Hable);
        assert_eq!(config.tone_mapping.target_peak_luminance, 200.0);
        assert_eq!(config.tone_mapping.target_system_gamma, 2.4);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "lut_cache_capacity": 0 }"#),
            Err(GradeError::Validation(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "grading": { "lut_size": 1 } }"#),
            Err(GradeError::Validation(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "tone_mapping": { "target_peak_luminance": -5.0 } }"#),
            Err(GradeError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_document_reports_line() {
        let json = "{\n  \"worker_threads\": 2,\n  \"lut_cache_capacity\": \"many\"\n}";
        match EngineConfig::from_json_str(json) {
            Err(GradeError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let mut config = EngineConfig::default();
        config.frame_cache_capacity = 8;
        config.grading.auto_clamp = false;
        std::fs::write(&path, config.to_json().unwrap()).unwrap();

        let back = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EngineConfig::from_json_file(dir.path().join("absent.json")),
            Err(GradeError::Io(_))
        ));
    }
}
