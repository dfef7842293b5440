//! LUT generation by sampling a color transform on an N³ lattice.

use enough::Stop;
use rayon::prelude::*;

use super::lut3d::Lut3D;
use crate::color_management::convert::ColorSpaceConverter;
use crate::color_management::profile::ProfileId;
use crate::error::GradeResult;
use crate::frame::{Frame, SampleEncoding};

/// Input value of lattice point `(r, g, b)` for a grid of `size`.
#[inline]
pub fn lattice_point(index: usize, size: usize) -> [f32; 3] {
    let n = (size - 1) as f32;
    let r = index % size;
    let g = (index / size) % size;
    let b = index / (size * size);
    [r as f32 / n, g as f32 / n, b as f32 / n]
}

/// Evaluate `transform` at every lattice point in parallel.
///
/// The result is deterministic for a deterministic `transform`. `stop` is
/// checked before each grid point; a stopped job returns
/// [`GradeError::Cancelled`](crate::error::GradeError::Cancelled).
pub fn generate<F>(size: usize, transform: F, stop: impl Stop + Sync) -> GradeResult<Lut3D>
where
    F: Fn([f32; 3]) -> [f32; 3] + Sync,
{
    Lut3D::check_size(size)?;
    let data = (0..size * size * size)
        .into_par_iter()
        .map(|i| {
            stop.check()?;
            Ok(transform(lattice_point(i, size)))
        })
        .collect::<GradeResult<Vec<_>>>()?;
    tracing::debug!("Generated {size}³ LUT");
    Lut3D::new(size, data)
}

/// LUT converting encoded `from` values into encoded `to` values.
pub fn color_space_lut(
    converter: &ColorSpaceConverter,
    from: &ProfileId,
    to: &ProfileId,
    size: usize,
    stop: impl Stop,
) -> GradeResult<Lut3D> {
    Lut3D::check_size(size)?;
    let count = size * size * size;
    let grid: Vec<[f32; 3]> = (0..count).into_par_iter().map(|i| lattice_point(i, size)).collect();
    let frame = Frame::new(count as u32, 1, grid, from.clone(), SampleEncoding::Encoded)?;
    stop.check()?;
    let converted = converter.convert(&frame, from, to)?;
    Ok(Lut3D::new(size, converted.pixels)?
        .with_title(format!("{} to {}", from.label(), to.label()))
        .with_spaces(from.clone(), to.clone()))
}
