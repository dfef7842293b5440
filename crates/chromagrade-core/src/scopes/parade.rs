//! RGB parade scope computation.
//!
//! Separate waveforms for R, G, B channels displayed side by side.

use serde::{Deserialize, Serialize};

use super::waveform::{DEFAULT_HEIGHT, column_density};
use crate::frame::Frame;

/// Parade scope data: separate waveforms for R, G, B channels side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParadeData {
    /// Width of each channel's waveform display.
    pub width: u32,
    /// Height of each channel's waveform display.
    pub height: u32,
    /// Red channel density data (width × height, row-major).
    pub red: Vec<u32>,
    /// Green channel density data (width × height, row-major).
    pub green: Vec<u32>,
    /// Blue channel density data (width × height, row-major).
    pub blue: Vec<u32>,
}

/// Compute parade from a frame.
///
/// Each channel gets its own waveform plot where x = source column
/// and y = that channel's intensity level.
pub fn compute(frame: &Frame) -> ParadeData {
    let height = DEFAULT_HEIGHT;
    ParadeData {
        width: frame.width,
        height,
        red: column_density(frame, height, |px| px[0]),
        green: column_density(frame, height, |px| px[1]),
        blue: column_density(frame, height, |px| px[2]),
    }
}
