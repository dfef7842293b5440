//! Color management: transfer functions, profiles, matrix derivation and
//! space-to-space conversion.

pub mod accuracy;
pub mod convert;
pub mod lab;
pub mod matrix;
pub mod profile;
pub mod transfer;
pub mod white_balance;

pub use accuracy::ColorStatistics;
pub use convert::{ColorSpaceConverter, RenderingIntent};
pub use matrix::ConversionMatrix;
pub use profile::{Chromaticity, ColorProfile, Illuminant, Primaries, ProfileId, ProfileRegistry};
pub use transfer::{TransferFunction, TransferFunctionId, get_transfer};
