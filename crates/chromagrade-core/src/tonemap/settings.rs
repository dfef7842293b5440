//! Tone-mapping settings and named presets.

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};

/// Tone-mapping operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMappingMethod {
    #[default]
    Reinhard,
    Filmic,
    Aces,
    Hable,
    Drago,
    Durand,
    Mantiuk,
}

impl ToneMappingMethod {
    pub const ALL: [Self; 7] = [
        Self::Reinhard,
        Self::Filmic,
        Self::Aces,
        Self::Hable,
        Self::Drago,
        Self::Durand,
        Self::Mantiuk,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Reinhard => "Reinhard",
            Self::Filmic => "Filmic",
            Self::Aces => "ACES",
            Self::Hable => "Hable",
            Self::Drago => "Drago",
            Self::Durand => "Durand",
            Self::Mantiuk => "Mantiuk",
        }
    }

    /// Operators that look at neighbouring pixels.
    pub fn is_local(self) -> bool {
        matches!(self, Self::Durand | Self::Mantiuk)
    }
}

/// Shoulder/linear/toe constants of the six-parameter filmic curve.
///
/// ```text
/// f(x) = (x(Ax + CB) + DE) / (x(Ax + B) + DF) − E/F
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilmicCurve {
    /// A
    pub shoulder_strength: f64,
    /// B
    pub linear_strength: f64,
    /// C
    pub linear_angle: f64,
    /// D
    pub toe_strength: f64,
    /// E
    pub toe_numerator: f64,
    /// F
    pub toe_denominator: f64,
    /// W, the input value mapped to 1.0 by the Hable operator.
    pub white_point: f64,
}

impl Default for FilmicCurve {
    fn default() -> Self {
        Self {
            shoulder_strength: 0.22,
            linear_strength: 0.30,
            linear_angle: 0.10,
            toe_strength: 0.20,
            toe_numerator: 0.01,
            toe_denominator: 0.30,
            white_point: 11.2,
        }
    }
}

impl FilmicCurve {
    pub fn eval(&self, x: f64) -> f64 {
        let a = self.shoulder_strength;
        let b = self.linear_strength;
        let c = self.linear_angle;
        let d = self.toe_strength;
        let e = self.toe_numerator;
        let f = self.toe_denominator;
        (x * (a * x + c * b) + d * e) / (x * (a * x + b) + d * f) - e / f
    }
}

/// Parameters shared by every tone-mapping operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    pub method: ToneMappingMethod,
    /// Display peak in cd/m². Output 1.0 corresponds to this level.
    pub target_peak_luminance: f64,
    /// Display gamma used when expanding SDR material.
    pub target_system_gamma: f64,
    /// Weight of the original HSV saturation after the remap (0 = mapped, 1 = original).
    /// Values above 1 extrapolate.
    pub preserve_saturation: f64,
    /// Gain on the detail layer of the local operators.
    pub preserve_details: f64,
    /// Gradient gain of the Mantiuk operator.
    pub contrast_boost: f64,
    pub curve: FilmicCurve,
    /// Exposure applied before mapping, in stops.
    pub exposure_bias: f64,
    /// Drago bias, in (0, 1).
    pub drago_bias: f64,
    /// Durand bilateral spatial sigma, in pixels.
    pub durand_spatial_sigma: f64,
    /// Durand bilateral range sigma, in log10 units.
    pub durand_range_sigma: f64,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            method: ToneMappingMethod::Reinhard,
            target_peak_luminance: 100.0,
            target_system_gamma: 2.4,
            preserve_saturation: 1.0,
            preserve_details: 1.0,
            contrast_boost: 1.0,
            curve: FilmicCurve::default(),
            exposure_bias: 0.0,
            drago_bias: std::f64::consts::LN_2 / std::f64::consts::LN_10,
            durand_spatial_sigma: 2.0,
            durand_range_sigma: 0.4,
        }
    }
}

/// Names accepted by [`ToneMappingSettings::preset`].
pub const PRESET_NAMES: [&str; 4] = ["cinematic_hdr", "natural_hdr", "vibrant_hdr", "dolby_vision"];

impl ToneMappingSettings {
    /// Settings for the given operator, everything else at defaults.
    pub fn with_method(method: ToneMappingMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Look up a named preset.
    pub fn preset(name: &str) -> GradeResult<Self> {
        let settings = match name {
            "cinematic_hdr" => Self {
                method: ToneMappingMethod::Filmic,
                target_peak_luminance: 100.0,
                preserve_saturation: 1.2,
                preserve_details: 1.1,
                contrast_boost: 1.1,
                ..Self::default()
            },
            "natural_hdr" => Self {
                method: ToneMappingMethod::Reinhard,
                target_peak_luminance: 120.0,
                preserve_saturation: 0.9,
                ..Self::default()
            },
            "vibrant_hdr" => Self {
                method: ToneMappingMethod::Hable,
                target_peak_luminance: 150.0,
                preserve_saturation: 1.5,
                preserve_details: 0.9,
                contrast_boost: 1.2,
                ..Self::default()
            },
            "dolby_vision" => Self {
                method: ToneMappingMethod::Aces,
                ..Self::default()
            },
            other => {
                return Err(GradeError::Configuration(format!(
                    "unknown tone-mapping preset: {other}"
                )));
            }
        };
        Ok(settings)
    }

    /// Reject parameters the operators cannot evaluate.
    pub fn validate(&self) -> GradeResult<()> {
        fn positive(name: &str, v: f64) -> GradeResult<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(GradeError::Validation(format!("{name} must be positive, got {v}")))
            }
        }

        positive("target_peak_luminance", self.target_peak_luminance)?;
        positive("target_system_gamma", self.target_system_gamma)?;
        positive("durand_spatial_sigma", self.durand_spatial_sigma)?;
        positive("durand_range_sigma", self.durand_range_sigma)?;
        positive("curve.white_point", self.curve.white_point)?;
        positive("curve.toe_denominator", self.curve.toe_denominator)?;
        positive("curve.toe_strength", self.curve.toe_strength)?;

        if !(0.0..=2.0).contains(&self.preserve_saturation) {
            return Err(GradeError::Validation(format!(
                "preserve_saturation must be in [0, 2], got {}",
                self.preserve_saturation
            )));
        }
        if !(self.drago_bias > 0.0 && self.drago_bias < 1.0) {
            return Err(GradeError::Validation(format!(
                "drago_bias must be in (0, 1), got {}",
                self.drago_bias
            )));
        }
        if !self.exposure_bias.is_finite() || !self.contrast_boost.is_finite() || !self.preserve_details.is_finite() {
            return Err(GradeError::Validation("non-finite tone-mapping parameter".into()));
        }
        Ok(())
    }

    /// `2^exposure_bias`.
    pub fn exposure_gain(&self) -> f64 {
        self.exposure_bias.exp2()
    }
}
