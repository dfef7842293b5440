//! Local (spatially varying) tone-mapping operators.
//!
//! Both operators work on log10 luminance relative to the target peak and
//! scale RGB by the ratio of mapped to original luminance. The brightest
//! base level lands on the target peak when it exceeds it; frames that are
//! already below the peak keep their level.

use rayon::prelude::*;

use super::operators::{LOG_EPSILON, MapContext, luminance, scale_pixel};

/// Contrast the Durand base layer is compressed into.
const DURAND_TARGET_CONTRAST: f64 = 100.0;

/// Gradient magnitude (log10 units) at which Mantiuk compression halves the gain.
const MANTIUK_KNEE: f64 = 1.0;

/// Jacobi sweeps of the Poisson solve.
const MANTIUK_ITERATIONS: usize = 200;

fn log_luminance(pixels: &[[f32; 3]], ctx: &MapContext<'_>) -> (Vec<f64>, Vec<f64>) {
    let gain = ctx.relative_gain();
    let lum: Vec<f64> = pixels.par_iter().map(|&px| luminance(px, ctx.luma) * gain).collect();
    let log: Vec<f64> = lum.par_iter().map(|&l| l.max(LOG_EPSILON).log10()).collect();
    (lum, log)
}

fn max_of(values: &[f64]) -> f64 {
    values.par_iter().cloned().reduce(|| f64::NEG_INFINITY, f64::max)
}

fn min_of(values: &[f64]) -> f64 {
    values.par_iter().cloned().reduce(|| f64::INFINITY, f64::min)
}

/// Recombine mapped log luminance with the source pixels.
fn finish(pixels: &[[f32; 3]], ctx: &MapContext<'_>, lum: &[f64], mapped_log: &[f64]) -> Vec<[f32; 3]> {
    let gain = ctx.relative_gain();
    pixels
        .par_iter()
        .zip(lum.par_iter().zip(mapped_log.par_iter()))
        .map(|(&px, (&l, &m))| scale_pixel(px, gain, l, 10f64.powf(m)))
        .collect()
}

/// Edge-preserving bilateral filter over a `width × height` scalar grid.
///
/// Window radius is `ceil(2σs)`.
pub fn bilateral_filter(grid: &[f64], width: usize, height: usize, sigma_s: f64, sigma_r: f64) -> Vec<f64> {
    let radius = (2.0 * sigma_s).ceil() as isize;
    let two_ss = 2.0 * sigma_s * sigma_s;
    let two_rr = 2.0 * sigma_r * sigma_r;
    let spatial: Vec<f64> = (-radius..=radius)
        .flat_map(|dy| (-radius..=radius).map(move |dx| (-((dx * dx + dy * dy) as f64) / two_ss).exp()))
        .collect();
    let side = (2 * radius + 1) as usize;

    let mut out = vec![0.0; grid.len()];
    out.par_chunks_mut(width.max(1)).enumerate().for_each(|(y, row)| {
        for (x, slot) in row.iter_mut().enumerate() {
            let center = grid[y * width + x];
            let mut sum = 0.0;
            let mut weight = 0.0;
            for dy in -radius..=radius {
                let sy = y as isize + dy;
                if sy < 0 || sy >= height as isize {
                    continue;
                }
                for dx in -radius..=radius {
                    let sx = x as isize + dx;
                    if sx < 0 || sx >= width as isize {
                        continue;
                    }
                    let v = grid[sy as usize * width + sx as usize];
                    let d = v - center;
                    let w = spatial[(dy + radius) as usize * side + (dx + radius) as usize]
                        * (-(d * d) / two_rr).exp();
                    sum += v * w;
                    weight += w;
                }
            }
            *slot = if weight > 0.0 { sum / weight } else { center };
        }
    });
    out
}

/// Durand & Dorsey fast bilateral operator.
///
/// # Algorithm
/// 1. `I = log10(L)`
/// 2. `base = bilateral(I)`, `detail = I − base`
/// 3. `cf = min(1, log10(contrast) / (max(base) − min(base)))`
/// 4. `I' = (base − max(base))·cf + min(max(base), 0) + detail·preserve_details`
///
/// # Reference
/// Durand, F. and Dorsey, J. (2002), Fast Bilateral Filtering for the
/// Display of High-Dynamic-Range Images
pub fn durand(pixels: &[[f32; 3]], ctx: &MapContext<'_>) -> Vec<[f32; 3]> {
    if pixels.is_empty() {
        return Vec::new();
    }
    let (lum, log) = log_luminance(pixels, ctx);
    let base = bilateral_filter(
        &log,
        ctx.width,
        ctx.height,
        ctx.settings.durand_spatial_sigma,
        ctx.settings.durand_range_sigma,
    );

    let base_max = max_of(&base);
    let range = base_max - min_of(&base);
    let cf = if range > 1e-9 {
        (DURAND_TARGET_CONTRAST.log10() / range).min(1.0)
    } else {
        1.0
    };
    let anchor = base_max.min(0.0);
    let detail_gain = ctx.settings.preserve_details;

    let mapped: Vec<f64> = log
        .par_iter()
        .zip(base.par_iter())
        .map(|(&i, &b)| (b - base_max) * cf + anchor + (i - b) * detail_gain)
        .collect();
    finish(pixels, ctx, &lum, &mapped)
}

/// Gradient-domain contrast mapping with Poisson reconstruction.
///
/// # Algorithm
/// 1. `I = log10(L)`, forward differences `G = ∇I`
/// 2. `G' = boost · G / (1 + |G| / knee)`
/// 3. Solve `∇²I' = div G'` (Neumann boundary, Jacobi, warm start at `I`)
/// 4. Shift so the brightest level lands on the target peak
///
/// # Reference
/// Mantiuk, R. et al. (2006), A Perceptual Framework for Contrast
/// Processing of High Dynamic Range Images
pub fn mantiuk(pixels: &[[f32; 3]], ctx: &MapContext<'_>) -> Vec<[f32; 3]> {
    if pixels.is_empty() {
        return Vec::new();
    }
    let (w, h) = (ctx.width, ctx.height);
    let (lum, log) = log_luminance(pixels, ctx);
    let boost = ctx.settings.contrast_boost;
    let compress = |g: f64| boost * g / (1.0 + g.abs() / MANTIUK_KNEE);

    let mut gx = vec![0.0; w * h];
    let mut gy = vec![0.0; w * h];
    gx.par_chunks_mut(w).zip(gy.par_chunks_mut(w)).enumerate().for_each(|(y, (rx, ry))| {
        for x in 0..w {
            let i = y * w + x;
            if x + 1 < w {
                rx[x] = compress(log[i + 1] - log[i]);
            }
            if y + 1 < h {
                ry[x] = compress(log[i + w] - log[i]);
            }
        }
    });

    let mut div = vec![0.0; w * h];
    div.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, d) in row.iter_mut().enumerate() {
            let i = y * w + x;
            let mut v = gx[i] + gy[i];
            if x > 0 {
                v -= gx[i - 1];
            }
            if y > 0 {
                v -= gy[i - w];
            }
            *d = v;
        }
    });

    let mut current = log.clone();
    let mut next = vec![0.0; w * h];
    for _ in 0..MANTIUK_ITERATIONS {
        next.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                let i = y * w + x;
                let mut sum = 0.0;
                let mut count = 0.0;
                if x > 0 {
                    sum += current[i - 1];
                    count += 1.0;
                }
                if x + 1 < w {
                    sum += current[i + 1];
                    count += 1.0;
                }
                if y > 0 {
                    sum += current[i - w];
                    count += 1.0;
                }
                if y + 1 < h {
                    sum += current[i + w];
                    count += 1.0;
                }
                *slot = if count > 0.0 { (sum - div[i]) / count } else { current[i] };
            }
        });
        std::mem::swap(&mut current, &mut next);
    }

    let top = max_of(&current);
    let shift = top - top.min(0.0);
    let mapped: Vec<f64> = current.par_iter().map(|&v| v - shift).collect();
    finish(pixels, ctx, &lum, &mapped)
}
