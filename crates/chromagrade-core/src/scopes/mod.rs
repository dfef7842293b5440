//! Scope computation: histogram, waveform, vectorscope and parade.

pub mod histogram;
pub mod parade;
pub mod vectorscope;
pub mod waveform;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub use histogram::HistogramData;
pub use parade::ParadeData;
pub use vectorscope::VectorscopeData;
pub use waveform::WaveformData;

/// Every scope for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeSet {
    pub histogram: HistogramData,
    pub waveform: WaveformData,
    pub parade: ParadeData,
    pub vectorscope: VectorscopeData,
}

impl ScopeSet {
    pub fn compute(frame: &Frame) -> Self {
        let ((histogram, waveform), (parade, vectorscope)) = rayon::join(
            || rayon::join(|| histogram::compute(frame), || waveform::compute(frame)),
            || rayon::join(|| parade::compute(frame), || vectorscope::compute(frame)),
        );
        Self { histogram, waveform, parade, vectorscope }
    }
}
