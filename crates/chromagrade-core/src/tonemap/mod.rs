//! HDR → SDR tone mapping.
//!
//! Linear input uses 1.0 = 10000 cd/m² (the PQ reference). Linear output uses
//! 1.0 = the target display peak.

pub mod local;
pub mod mapper;
pub mod metadata;
pub mod operators;
pub mod settings;

pub use mapper::{LUMA_REC709, LUMA_REC2020, ToneMapper, luma_weights};
pub use metadata::{HdrFormat, HdrMetadata};
pub use settings::{FilmicCurve, PRESET_NAMES, ToneMappingMethod, ToneMappingSettings};
