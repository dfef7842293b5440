//! Chromagrade Core: color science and grading engine.
//!
//! This crate contains color-space conversion, transfer functions, HDR tone
//! mapping, LUT interchange and generation, color matching, scope analysis
//! and the grading operation stack. No GPU, UI or framework dependencies.

pub mod color_management;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod grading;
pub mod lut;
pub mod matching;
pub mod scopes;
pub mod tonemap;

// Re-exports for convenience.
pub use color_management::{ColorProfile, ColorSpaceConverter, ConversionMatrix, ProfileId, TransferFunctionId};
pub use config::EngineConfig;
// Long-running jobs take an `impl Stop`; pass `Unstoppable` when cancellation is not needed.
pub use enough::{Stop, StopReason, Unstoppable};
pub use engine::{FrameId, GradingEngine};
pub use error::{GradeError, GradeResult};
pub use frame::{BitDepth, Frame, SampleEncoding};
pub use grading::{ApplyReport, GradingOperation, OperationId, OperationKind, OperationStack, Preset};
pub use lut::{Interpolation, Lut, Lut1D, Lut3D, LutCache, LutInfo};
pub use matching::{ColorMatcher, MatchMethod};
pub use scopes::ScopeSet;
pub use tonemap::{HdrMetadata, ToneMapper, ToneMappingMethod, ToneMappingSettings};
