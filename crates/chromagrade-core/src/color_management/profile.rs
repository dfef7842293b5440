//! Color profiles: primaries, white points and the built-in registry.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::transfer::{TransferFunctionId, get_transfer};
use crate::error::{GradeError, GradeResult};
use crate::frame::BitDepth;

/// CIE 1931 xy chromaticity coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chromaticity {
    pub x: f64,
    pub y: f64,
}

impl Chromaticity {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// XYZ with `Y = 1`.
    pub fn to_xyz(self) -> [f64; 3] {
        [self.x / self.y, 1.0, (1.0 - self.x - self.y) / self.y]
    }
}

/// Standard illuminants used as reference whites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Illuminant {
    /// Tungsten, ~2856K.
    A,
    /// Direct sunlight, ~4874K.
    B,
    /// Average daylight, ~6774K.
    C,
    D50,
    D55,
    D65,
    D75,
    /// Equal energy.
    E,
    /// DCI theatrical projector white.
    Dci,
}

impl Illuminant {
    /// Chromaticity of the 2° standard observer white point.
    pub const fn chromaticity(self) -> Chromaticity {
        match self {
            Self::A => Chromaticity::new(0.44757, 0.40745),
            Self::B => Chromaticity::new(0.34842, 0.35161),
            Self::C => Chromaticity::new(0.31006, 0.31616),
            Self::D50 => Chromaticity::new(0.34567, 0.35850),
            Self::D55 => Chromaticity::new(0.33242, 0.34743),
            Self::D65 => Chromaticity::new(0.3127, 0.3290),
            Self::D75 => Chromaticity::new(0.29902, 0.31485),
            Self::E => Chromaticity::new(1.0 / 3.0, 1.0 / 3.0),
            Self::Dci => Chromaticity::new(0.314, 0.351),
        }
    }
}

/// Red, green and blue primaries plus the reference white.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Primaries {
    pub red: Chromaticity,
    pub green: Chromaticity,
    pub blue: Chromaticity,
    pub white: Chromaticity,
}

impl Primaries {
    pub const fn new(
        red: (f64, f64),
        green: (f64, f64),
        blue: (f64, f64),
        white: Chromaticity,
    ) -> Self {
        Self {
            red: Chromaticity::new(red.0, red.1),
            green: Chromaticity::new(green.0, green.1),
            blue: Chromaticity::new(blue.0, blue.1),
            white,
        }
    }

    /// Whether an xy chromaticity lies inside the primaries' triangle.
    pub fn contains(&self, xy: Chromaticity) -> bool {
        fn edge(a: Chromaticity, b: Chromaticity, p: Chromaticity) -> f64 {
            (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
        }
        let d1 = edge(self.red, self.green, xy);
        let d2 = edge(self.green, self.blue, xy);
        let d3 = edge(self.blue, self.red, xy);
        let has_neg = d1 < -1e-12 || d2 < -1e-12 || d3 < -1e-12;
        let has_pos = d1 > 1e-12 || d2 > 1e-12 || d3 > 1e-12;
        !(has_neg && has_pos)
    }

    /// ITU-R BT.709 / sRGB primaries, D65.
    pub const REC709: Self = Self::new(
        (0.64, 0.33),
        (0.30, 0.60),
        (0.15, 0.06),
        Illuminant::D65.chromaticity(),
    );

    /// ITU-R BT.2020 primaries, D65.
    pub const REC2020: Self = Self::new(
        (0.708, 0.292),
        (0.170, 0.797),
        (0.131, 0.046),
        Illuminant::D65.chromaticity(),
    );

    /// DCI-P3 primaries with the DCI projector white.
    pub const DCI_P3: Self = Self::new(
        (0.680, 0.320),
        (0.265, 0.690),
        (0.150, 0.060),
        Illuminant::Dci.chromaticity(),
    );

    /// P3 primaries with a D65 white.
    pub const DISPLAY_P3: Self = Self::new(
        (0.680, 0.320),
        (0.265, 0.690),
        (0.150, 0.060),
        Illuminant::D65.chromaticity(),
    );

    /// Adobe RGB (1998), D65.
    pub const ADOBE_RGB: Self = Self::new(
        (0.64, 0.33),
        (0.21, 0.71),
        (0.15, 0.06),
        Illuminant::D65.chromaticity(),
    );

    /// Sony S-Gamut3, D65.
    pub const S_GAMUT3: Self = Self::new(
        (0.730, 0.280),
        (0.140, 0.855),
        (0.100, -0.050),
        Illuminant::D65.chromaticity(),
    );

    /// Panasonic V-Gamut, D65.
    pub const V_GAMUT: Self = Self::new(
        (0.730, 0.280),
        (0.165, 0.840),
        (0.100, -0.030),
        Illuminant::D65.chromaticity(),
    );
}

/// Identifies a color profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileId {
    /// sRGB primaries, sRGB transfer.
    Srgb,
    /// sRGB primaries, linear.
    LinearSrgb,
    /// BT.709 primaries and OETF.
    Rec709,
    /// BT.2020 primaries and OETF.
    Rec2020,
    /// BT.2020 primaries, PQ.
    Rec2100Pq,
    /// BT.2020 primaries, HLG.
    Rec2100Hlg,
    /// DCI-P3, gamma 2.4.
    DciP3,
    /// Display P3, sRGB transfer.
    DisplayP3,
    /// Adobe RGB (1998), gamma 2.2.
    AdobeRgb,
    /// Sony S-Gamut3 / S-Log3.
    SGamut3SLog3,
    /// Panasonic V-Gamut / V-Log.
    VGamutVLog,
    /// Host-registered profile.
    Custom(String),
}

impl ProfileId {
    pub fn label(&self) -> &str {
        match self {
            Self::Srgb => "sRGB",
            Self::LinearSrgb => "Linear sRGB",
            Self::Rec709 => "Rec.709",
            Self::Rec2020 => "Rec.2020",
            Self::Rec2100Pq => "Rec.2100 PQ",
            Self::Rec2100Hlg => "Rec.2100 HLG",
            Self::DciP3 => "DCI-P3",
            Self::DisplayP3 => "Display P3",
            Self::AdobeRgb => "Adobe RGB",
            Self::SGamut3SLog3 => "S-Gamut3 / S-Log3",
            Self::VGamutVLog => "V-Gamut / V-Log",
            Self::Custom(name) => name,
        }
    }

    /// Inverse of [`label`](Self::label). Unknown labels become `Custom`.
    pub fn from_label(label: &str) -> Self {
        Self::builtin()
            .iter()
            .find(|id| id.label() == label)
            .cloned()
            .unwrap_or_else(|| Self::Custom(label.to_string()))
    }

    /// Built-in profiles, always present in a fresh registry.
    pub fn builtin() -> &'static [Self] {
        const ALL: [ProfileId; 11] = [
            ProfileId::Srgb,
            ProfileId::LinearSrgb,
            ProfileId::Rec709,
            ProfileId::Rec2020,
            ProfileId::Rec2100Pq,
            ProfileId::Rec2100Hlg,
            ProfileId::DciP3,
            ProfileId::DisplayP3,
            ProfileId::AdobeRgb,
            ProfileId::SGamut3SLog3,
            ProfileId::VGamutVLog,
        ];
        &ALL
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named color space: gamut, encoding and reference white.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorProfile {
    pub id: ProfileId,
    pub name: String,
    pub primaries: Primaries,
    pub transfer: TransferFunctionId,
    /// Reference illuminant. Its chromaticity matches `primaries.white`.
    pub illuminant: Illuminant,
    pub bit_depth: BitDepth,
}

impl ColorProfile {
    /// Build a profile, validating the transfer function parameters and the
    /// chromaticities.
    pub fn new(
        id: ProfileId,
        name: impl Into<String>,
        primaries: Primaries,
        transfer: TransferFunctionId,
        illuminant: Illuminant,
        bit_depth: BitDepth,
    ) -> GradeResult<Self> {
        get_transfer(transfer)?;
        for (label, c) in [
            ("red", primaries.red),
            ("green", primaries.green),
            ("blue", primaries.blue),
            ("white", primaries.white),
        ] {
            if !(c.x.is_finite() && c.y.is_finite()) || c.y.abs() < f64::EPSILON {
                return Err(GradeError::Validation(format!(
                    "{label} chromaticity ({}, {}) is unusable",
                    c.x, c.y
                )));
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            primaries,
            transfer,
            illuminant,
            bit_depth,
        })
    }

    fn builtin(id: ProfileId) -> Self {
        let (primaries, transfer, illuminant, bit_depth) = match id {
            ProfileId::Srgb => (Primaries::REC709, TransferFunctionId::Srgb, Illuminant::D65, BitDepth::U8),
            ProfileId::LinearSrgb => (Primaries::REC709, TransferFunctionId::Linear, Illuminant::D65, BitDepth::F32),
            ProfileId::Rec709 => (Primaries::REC709, TransferFunctionId::Rec709, Illuminant::D65, BitDepth::U10),
            ProfileId::Rec2020 => (Primaries::REC2020, TransferFunctionId::Rec2020, Illuminant::D65, BitDepth::U10),
            ProfileId::Rec2100Pq => (Primaries::REC2020, TransferFunctionId::Pq, Illuminant::D65, BitDepth::U10),
            ProfileId::Rec2100Hlg => (Primaries::REC2020, TransferFunctionId::Hlg, Illuminant::D65, BitDepth::U10),
            ProfileId::DciP3 => (Primaries::DCI_P3, TransferFunctionId::Gamma(2.4), Illuminant::Dci, BitDepth::U12),
            ProfileId::DisplayP3 => (Primaries::DISPLAY_P3, TransferFunctionId::Srgb, Illuminant::D65, BitDepth::U8),
            ProfileId::AdobeRgb => (Primaries::ADOBE_RGB, TransferFunctionId::Gamma(2.2), Illuminant::D65, BitDepth::U8),
            ProfileId::SGamut3SLog3 => (Primaries::S_GAMUT3, TransferFunctionId::SLog3, Illuminant::D65, BitDepth::U10),
            ProfileId::VGamutVLog => (Primaries::V_GAMUT, TransferFunctionId::VLog, Illuminant::D65, BitDepth::U10),
            ProfileId::Custom(_) => (Primaries::REC709, TransferFunctionId::Linear, Illuminant::D65, BitDepth::F32),
        };
        Self {
            name: id.label().to_string(),
            id,
            primaries,
            transfer,
            illuminant,
            bit_depth,
        }
    }
}

/// Lookup table of profiles known to a converter.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<ProfileId, ColorProfile>,
}

impl ProfileRegistry {
    /// Registry preloaded with every [`ProfileId::builtin`] profile.
    pub fn with_builtins() -> Self {
        let profiles = ProfileId::builtin()
            .iter()
            .map(|id| (id.clone(), ColorProfile::builtin(id.clone())))
            .collect();
        Self { profiles }
    }

    /// Insert or replace a profile. Returns the previous entry.
    pub fn register(&mut self, profile: ColorProfile) -> Option<ColorProfile> {
        tracing::debug!("registering color profile {}", profile.id);
        self.profiles.insert(profile.id.clone(), profile)
    }

    /// Fails with [`GradeError::Configuration`] for an unknown id.
    pub fn get(&self, id: &ProfileId) -> GradeResult<&ColorProfile> {
        self.profiles
            .get(id)
            .ok_or_else(|| GradeError::Configuration(format!("unknown color profile: {id}")))
    }

    pub fn contains(&self, id: &ProfileId) -> bool {
        self.profiles.contains_key(id)
    }

    pub fn ids(&self) -> Vec<ProfileId> {
        let mut ids: Vec<_> = self.profiles.keys().cloned().collect();
        ids.sort_by(|a, b| a.label().cmp(b.label()));
        ids
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_all_builtins() {
        let registry = ProfileRegistry::with_builtins();
        for id in ProfileId::builtin() {
            let profile = registry.get(id).unwrap();
            assert_eq!(&profile.id, id);
        }
    }

    #[test]
    fn test_unknown_profile_is_configuration_error() {
        let registry = ProfileRegistry::with_builtins();
        let err = registry.get(&ProfileId::Custom("nope".into())).unwrap_err();
        assert!(matches!(err, GradeError::Configuration(_)));
    }

    #[test]
    fn test_register_custom_profile() {
        let mut registry = ProfileRegistry::with_builtins();
        let id = ProfileId::Custom("warm-monitor".into());
        let profile = ColorProfile::new(
            id.clone(),
            "Warm monitor",
            Primaries::REC709,
            TransferFunctionId::Gamma(2.2),
            Illuminant::D50,
            BitDepth::U8,
        )
        .unwrap();
        assert!(registry.register(profile).is_none());
        assert_eq!(registry.get(&id).unwrap().name, "Warm monitor");
    }

    #[test]
    fn test_profile_rejects_zero_y_chromaticity() {
        let mut primaries = Primaries::REC709;
        primaries.white = Chromaticity::new(0.3, 0.0);
        let result = ColorProfile::new(
            ProfileId::Custom("bad".into()),
            "bad",
            primaries,
            TransferFunctionId::Linear,
            Illuminant::D65,
            BitDepth::F32,
        );
        assert!(matches!(result, Err(GradeError::Validation(_))));
    }

    #[test]
    fn test_label_roundtrip() {
        for id in ProfileId::builtin() {
            assert_eq!(&ProfileId::from_label(id.label()), id);
        }
        assert_eq!(
            ProfileId::from_label("Studio Monitor"),
            ProfileId::Custom("Studio Monitor".into())
        );
    }

    #[test]
    fn test_gamut_triangle_contains_white() {
        assert!(Primaries::REC709.contains(Illuminant::D65.chromaticity()));
        assert!(!Primaries::REC709.contains(Chromaticity::new(0.17, 0.797)));
        assert!(Primaries::REC2020.contains(Chromaticity::new(0.64, 0.33)));
    }
}
