//! Grading tools (wheels, sliders, curves, HSL) and the operation stack
//! that orders and blends them.

pub mod curves;
pub mod hsl;
pub mod operation;
pub mod preset;
pub mod sliders;
pub mod stack;
pub mod wheels;

pub use curves::{CurveChannel, CurveParams};
pub use hsl::HslParams;
pub use operation::{
    ContrastParams, ExposureParams, GradingOperation, LutParams, OperationId, OperationKind, RgbParams,
    SaturationParams, ShadowsHighlightsParams, VibranceParams, WhiteBalanceParams,
};
pub use preset::{ColorGradingSettings, PRESET_SCHEMA_VERSION, Preset};
pub use stack::{ApplyContext, ApplyReport, MaskResolver, OperationStack, SkippedOperation, apply_operations};
pub use wheels::{Wheel, WheelParams};
