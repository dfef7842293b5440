//! Transfer function (OETF/EOTF) implementations for display, HDR and log curves.
//!
//! Each implementation uses the constants published in its standard and is
//! evaluated in `f64`. Transfer functions convert between non-linear (encoded)
//! and linear light values; every pair is an exact inverse over `[0, 1]`.

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};

/// A transfer function that converts between linear and non-linear encodings.
pub trait TransferFunction: Send + Sync {
    /// Convert from non-linear (encoded) to linear light.
    fn to_linear(&self, encoded: f64) -> f64;

    /// Convert from linear light to non-linear (encoded).
    fn to_encoded(&self, linear: f64) -> f64;
}

/// Identifies a transfer function in profiles, frames and documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransferFunctionId {
    /// No encoding.
    Linear,
    /// IEC 61966-2-1.
    Srgb,
    /// ITU-R BT.709.
    Rec709,
    /// ITU-R BT.2020 (same curve as BT.709, 12-bit precise constants).
    Rec2020,
    /// SMPTE ST 2084 perceptual quantizer.
    Pq,
    /// ARIB STD-B67 / BT.2100 hybrid log-gamma.
    Hlg,
    /// Sony S-Log3.
    SLog3,
    /// Panasonic V-Log.
    VLog,
    /// ARRI LogC3, EI 800.
    LogC3,
    /// Pure power law. The value is the display exponent (2.2, 2.4, 2.6 ...).
    Gamma(f64),
}

impl TransferFunctionId {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::Srgb => "sRGB",
            Self::Rec709 => "Rec.709",
            Self::Rec2020 => "Rec.2020",
            Self::Pq => "ST 2084 (PQ)",
            Self::Hlg => "HLG",
            Self::SLog3 => "Sony S-Log3",
            Self::VLog => "Panasonic V-Log",
            Self::LogC3 => "ARRI LogC3",
            Self::Gamma(_) => "Gamma",
        }
    }

    pub const fn is_hdr(&self) -> bool {
        matches!(self, Self::Pq | Self::Hlg)
    }
}

/// Get the transfer function for an id, if it has a non-linear encoding.
///
/// Returns `Ok(None)` for [`TransferFunctionId::Linear`]. Fails with a
/// validation error for a non-positive gamma exponent.
pub fn get_transfer(id: TransferFunctionId) -> GradeResult<Option<Box<dyn TransferFunction>>> {
    let tf: Box<dyn TransferFunction> = match id {
        TransferFunctionId::Linear => return Ok(None),
        TransferFunctionId::Srgb => Box::new(SrgbTransfer),
        TransferFunctionId::Rec709 => Box::new(Rec709Transfer),
        TransferFunctionId::Rec2020 => Box::new(Rec2020Transfer),
        TransferFunctionId::Pq => Box::new(PqTransfer),
        TransferFunctionId::Hlg => Box::new(HlgTransfer::default()),
        TransferFunctionId::SLog3 => Box::new(SLog3Transfer),
        TransferFunctionId::VLog => Box::new(VLogTransfer),
        TransferFunctionId::LogC3 => Box::new(ArriLogC3Transfer),
        TransferFunctionId::Gamma(g) => Box::new(GammaTransfer::new(g)?),
    };
    Ok(Some(tf))
}

// ---------------------------------------------------------------------------
// sRGB (IEC 61966-2-1)
// ---------------------------------------------------------------------------

/// sRGB transfer function per IEC 61966-2-1.
///
/// ```text
/// to_linear:   V <= 0.04045 → V / 12.92
///              V >  0.04045 → ((V + 0.055) / 1.055) ^ 2.4
///
/// to_encoded:  L <= 0.0031308 → L × 12.92
///              L >  0.0031308 → 1.055 × L^(1/2.4) − 0.055
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SrgbTransfer;

impl TransferFunction for SrgbTransfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        if encoded <= 0.04045 {
            encoded / 12.92
        } else {
            ((encoded + 0.055) / 1.055).powf(2.4)
        }
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        if linear <= 0.0031308 {
            linear * 12.92
        } else {
            1.055 * linear.powf(1.0 / 2.4) - 0.055
        }
    }
}

// ---------------------------------------------------------------------------
// Rec.709 / Rec.2020 (ITU-R BT.709-6, BT.2020-2)
// ---------------------------------------------------------------------------

/// BT.709 OETF with the precise α/β pair from BT.2020.
///
/// ```text
/// to_encoded: L < β → 4.5 × L
///             L ≥ β → α × L^0.45 − (α − 1)
///
/// to_linear:  V < 4.5β → V / 4.5
///             V ≥ 4.5β → ((V + α − 1) / α)^(1/0.45)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Rec709Transfer;

const BT_ALPHA: f64 = 1.099_296_826_809_44;
const BT_BETA: f64 = 0.018_053_968_510_807;

fn bt_oetf(linear: f64) -> f64 {
    if linear < BT_BETA {
        4.5 * linear
    } else {
        BT_ALPHA * linear.powf(0.45) - (BT_ALPHA - 1.0)
    }
}

fn bt_inverse_oetf(encoded: f64) -> f64 {
    if encoded < 4.5 * BT_BETA {
        encoded / 4.5
    } else {
        ((encoded + BT_ALPHA - 1.0) / BT_ALPHA).powf(1.0 / 0.45)
    }
}

impl TransferFunction for Rec709Transfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        bt_inverse_oetf(encoded)
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        bt_oetf(linear)
    }
}

/// BT.2020 OETF. Shares the BT.709 curve; the 10-bit approximations
/// (1.099 / 0.018) are not used.
#[derive(Debug, Clone, Copy)]
pub struct Rec2020Transfer;

impl TransferFunction for Rec2020Transfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        bt_inverse_oetf(encoded)
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        bt_oetf(linear)
    }
}

// ---------------------------------------------------------------------------
// SMPTE ST 2084 (PQ)
// ---------------------------------------------------------------------------

/// Reference peak of the PQ signal in cd/m².
pub const PQ_MAX_LUMINANCE: f64 = 10_000.0;
/// Lowest luminance PQ represents, in cd/m².
pub const PQ_MIN_LUMINANCE: f64 = 0.0001;

/// SMPTE ST 2084 perceptual quantizer.
///
/// Linear values are absolute luminance normalized by 10000 cd/m², so
/// `1.0` linear is 10000 nits and `0.01` is 100 nits.
///
/// # Reference
/// SMPTE ST 2084:2014
///
/// ```text
/// to_encoded: Y = clamp(L, 0, 1)
///             E = ((c1 + c2 × Y^m1) / (1 + c3 × Y^m1))^m2
///
/// to_linear:  E = clamp(E, Lmin / Lmax, 1)
///             Y = (max(E^(1/m2) − c1, 0) / (c2 − c3 × E^(1/m2)))^(1/m1)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PqTransfer;

impl PqTransfer {
    const M1: f64 = 2610.0 / 16384.0;
    const M2: f64 = 2523.0 / 4096.0 * 128.0;
    const C1: f64 = 3424.0 / 4096.0;
    const C2: f64 = 2413.0 / 4096.0 * 32.0;
    const C3: f64 = 2392.0 / 4096.0 * 32.0;

    /// Encode absolute luminance in cd/m².
    pub fn encode_nits(&self, nits: f64) -> f64 {
        self.to_encoded(nits / PQ_MAX_LUMINANCE)
    }

    /// Decode to absolute luminance in cd/m².
    pub fn decode_nits(&self, encoded: f64) -> f64 {
        self.to_linear(encoded) * PQ_MAX_LUMINANCE
    }
}

impl TransferFunction for PqTransfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        let e = encoded.clamp(PQ_MIN_LUMINANCE / PQ_MAX_LUMINANCE, 1.0);
        let ep = e.powf(1.0 / Self::M2);
        let num = (ep - Self::C1).max(0.0);
        let den = Self::C2 - Self::C3 * ep;
        (num / den).powf(1.0 / Self::M1)
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        let y = linear.clamp(0.0, 1.0);
        let ym = y.powf(Self::M1);
        ((Self::C1 + Self::C2 * ym) / (1.0 + Self::C3 * ym)).powf(Self::M2)
    }
}

// ---------------------------------------------------------------------------
// Hybrid Log-Gamma (ARIB STD-B67 / BT.2100)
// ---------------------------------------------------------------------------

/// HLG OETF pair plus the display OOTF parameters.
///
/// `to_encoded`/`to_linear` are the scene-referred OETF and its inverse. The
/// system gamma and reference white only enter through
/// [`eotf_rgb`](Self::eotf_rgb) and [`inverse_eotf_rgb`](Self::inverse_eotf_rgb).
///
/// # Reference
/// ITU-R BT.2100-2, Table 5
///
/// ```text
/// to_encoded: L <= 1/12 → sqrt(3 × L)
///             L >  1/12 → a × ln(12 × L − b) + c
///
/// to_linear:  E <= 1/2 → E² / 3
///             E >  1/2 → (exp((E − c) / a) + b) / 12
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HlgTransfer {
    /// OOTF exponent applied to scene luminance. Nominally 1.2.
    pub system_gamma: f64,
    /// Nominal peak display luminance in cd/m². Nominally 1000.
    pub reference_white: f64,
}

impl HlgTransfer {
    pub const A: f64 = 0.178_832_77;
    pub const B: f64 = 1.0 - 4.0 * Self::A;
    pub const C: f64 = 0.559_910_73;

    pub fn new(system_gamma: f64, reference_white: f64) -> Self {
        Self {
            system_gamma,
            reference_white,
        }
    }

    /// Encoded HLG RGB → display light in cd/m².
    ///
    /// ```text
    /// Fd = Lw × Ys^(γ − 1) × E_scene
    /// ```
    pub fn eotf_rgb(&self, encoded: [f64; 3]) -> [f64; 3] {
        let scene = encoded.map(|e| self.to_linear(e));
        let ys = 0.2627 * scene[0] + 0.6780 * scene[1] + 0.0593 * scene[2];
        let gain = if ys > 0.0 {
            self.reference_white * ys.powf(self.system_gamma - 1.0)
        } else {
            0.0
        };
        scene.map(|s| s * gain)
    }

    /// Display light in cd/m² → encoded HLG RGB.
    pub fn inverse_eotf_rgb(&self, display: [f64; 3]) -> [f64; 3] {
        let yd = 0.2627 * display[0] + 0.6780 * display[1] + 0.0593 * display[2];
        if yd <= 0.0 {
            return [0.0; 3];
        }
        let ys = (yd / self.reference_white).powf(1.0 / self.system_gamma);
        let gain = self.reference_white * ys.powf(self.system_gamma - 1.0);
        display.map(|d| self.to_encoded(d / gain))
    }
}

impl Default for HlgTransfer {
    fn default() -> Self {
        Self::new(1.2, 1000.0)
    }
}

impl TransferFunction for HlgTransfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        let e = encoded.max(0.0);
        if e <= 0.5 {
            e * e / 3.0
        } else {
            (((e - Self::C) / Self::A).exp() + Self::B) / 12.0
        }
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        let l = linear.max(0.0);
        if l <= 1.0 / 12.0 {
            (3.0 * l).sqrt()
        } else {
            Self::A * (12.0 * l - Self::B).ln() + Self::C
        }
    }
}

// ---------------------------------------------------------------------------
// Sony S-Log3
// ---------------------------------------------------------------------------

/// Sony S-Log3 transfer function.
///
/// # Reference
/// Sony Technical Summary for S-Gamut3.Cine/S-Log3 (2014)
///
/// ```text
/// to_encoded: x >= 0.01125 → (420 + log10((x + 0.01) / 0.19) × 261.5) / 1023
///             x <  0.01125 → (x × (171.2102946929 − 95) / 0.01125 + 95) / 1023
///
/// to_linear:  y >= 171.2102946929 / 1023 → 10^((y × 1023 − 420) / 261.5) × 0.19 − 0.01
///             y <  171.2102946929 / 1023 → (y × 1023 − 95) × 0.01125 / (171.2102946929 − 95)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SLog3Transfer;

impl SLog3Transfer {
    const THRESHOLD: f64 = 0.011_25;
    const CODE_AT_THRESHOLD: f64 = 171.210_294_692_9;
    const THRESHOLD_E: f64 = Self::CODE_AT_THRESHOLD / 1023.0;
}

impl TransferFunction for SLog3Transfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        if encoded >= Self::THRESHOLD_E {
            10.0_f64.powf((encoded * 1023.0 - 420.0) / 261.5) * 0.19 - 0.01
        } else {
            (encoded * 1023.0 - 95.0) * Self::THRESHOLD / (Self::CODE_AT_THRESHOLD - 95.0)
        }
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        if linear >= Self::THRESHOLD {
            (420.0 + ((linear + 0.01) / 0.19).log10() * 261.5) / 1023.0
        } else {
            (linear * (Self::CODE_AT_THRESHOLD - 95.0) / Self::THRESHOLD + 95.0) / 1023.0
        }
    }
}

// ---------------------------------------------------------------------------
// Panasonic V-Log
// ---------------------------------------------------------------------------

/// Panasonic V-Log transfer function.
///
/// # Reference
/// Panasonic V-Log/V-Gamut Technical Documentation (2014)
///
/// ```text
/// to_linear:  t <  0.181 → (t − 0.125) / 5.6
///             t >= 0.181 → 10^((t − D) / C) − B
///
/// to_encoded: x <  CUT → 5.6 × x + 0.125
///             x >= CUT → C × log10(x + B) + D
/// ```
#[derive(Debug, Clone, Copy)]
pub struct VLogTransfer;

impl VLogTransfer {
    const B: f64 = 0.00873;
    const C: f64 = 0.241_514;
    const D: f64 = 0.598_206;
    const CUT: f64 = 0.01;
    const CUT_ENCODED: f64 = 5.6 * Self::CUT + 0.125;
}

impl TransferFunction for VLogTransfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        if encoded < Self::CUT_ENCODED {
            (encoded - 0.125) / 5.6
        } else {
            10.0_f64.powf((encoded - Self::D) / Self::C) - Self::B
        }
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        if linear < Self::CUT {
            5.6 * linear + 0.125
        } else {
            Self::C * (linear + Self::B).log10() + Self::D
        }
    }
}

// ---------------------------------------------------------------------------
// ARRI LogC3 (ALEXA classic, EI 800)
// ---------------------------------------------------------------------------

/// ARRI LogC3 transfer function at EI 800.
///
/// # Reference
/// ARRI LogC Curve: Usage in VFX (2017)
///
/// ```text
/// to_linear:  t <= E × CUT + F → (t − F) / E
///             otherwise        → (10^((t − D) / C) − B) / A
///
/// to_encoded: x <= CUT → E × x + F
///             x >  CUT → C × log10(A × x + B) + D
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ArriLogC3Transfer;

impl ArriLogC3Transfer {
    const A: f64 = 5.555_556;
    const B: f64 = 0.052_272;
    const C: f64 = 0.247_190;
    const D: f64 = 0.385_537;
    const E: f64 = 5.367_655;
    const F: f64 = 0.092_809;
    const CUT: f64 = 0.010_591;
    const E_CUT: f64 = Self::E * Self::CUT + Self::F;
}

impl TransferFunction for ArriLogC3Transfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        if encoded <= Self::E_CUT {
            (encoded - Self::F) / Self::E
        } else {
            (10.0_f64.powf((encoded - Self::D) / Self::C) - Self::B) / Self::A
        }
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        if linear <= Self::CUT {
            Self::E * linear + Self::F
        } else {
            Self::C * (Self::A * linear + Self::B).log10() + Self::D
        }
    }
}

// ---------------------------------------------------------------------------
// Pure gamma
// ---------------------------------------------------------------------------

/// Sign-preserving power law with display exponent `gamma`.
#[derive(Debug, Clone, Copy)]
pub struct GammaTransfer {
    gamma: f64,
}

impl GammaTransfer {
    pub fn new(gamma: f64) -> GradeResult<Self> {
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(GradeError::Validation(format!(
                "gamma exponent must be positive, got {gamma}"
            )));
        }
        Ok(Self { gamma })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl TransferFunction for GammaTransfer {
    fn to_linear(&self, encoded: f64) -> f64 {
        encoded.signum() * encoded.abs().powf(self.gamma)
    }

    fn to_encoded(&self, linear: f64) -> f64 {
        linear.signum() * linear.abs().powf(1.0 / self.gamma)
    }
}
