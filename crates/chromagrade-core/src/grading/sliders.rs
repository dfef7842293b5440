//! Slider-style adjustments: contrast, shadows/highlights, saturation, hue,
//! vibrance, exposure and per-channel gain/offset.

/// Rec. 709 luminance weights.
pub(crate) const LUMA_REC709: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Equal-weight luminance.
const LUMA_EQUAL: [f32; 3] = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];

/// Default contrast pivot (18% gray in a log-like encoding).
pub const DEFAULT_PIVOT: f32 = 0.435;

#[inline]
pub(crate) fn luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_REC709[0] + rgb[1] * LUMA_REC709[1] + rgb[2] * LUMA_REC709[2]
}

/// Apply contrast with pivot point.
///
/// Contrast is applied as a power curve centered on the pivot value.
/// Values at the pivot are unchanged; values above are pushed further away,
/// values below are pulled closer.
///
/// ```text
/// out = pow(in / pivot, contrast) × pivot
/// ```
///
/// `contrast = 1.0` and any pivot produce no change.
pub fn apply_contrast(rgb: [f32; 3], contrast: f32, pivot: f32) -> [f32; 3] {
    if (contrast - 1.0).abs() < 1e-7 {
        return rgb;
    }
    rgb.map(|v| if v <= 0.0 { 0.0 } else { (v / pivot).powf(contrast) * pivot })
}

/// Lift dark tones and lift or pull bright tones by luma region.
///
/// Region weights come from a linear ramp around mid-gray whose slope is set
/// by the tone width, softened with smoothstep:
///
/// ```text
/// shadow_weight    = 1 − smoothstep(clamp((Y − 0.5) / shadow_width + 0.5))
/// highlight_weight = smoothstep(clamp((Y − 0.5) / highlight_width + 0.5))
///
/// out = in + (shadows × shadow_weight + highlights × highlight_weight) × 0.5
/// ```
///
/// The offset is added equally to all channels, so chroma is kept.
/// Both amounts at 0.0 produce no change.
pub fn apply_shadows_highlights(
    rgb: [f32; 3],
    shadows: f32,
    highlights: f32,
    shadow_width: f32,
    highlight_width: f32,
) -> [f32; 3] {
    if shadows.abs() < 1e-7 && highlights.abs() < 1e-7 {
        return rgb;
    }

    let y = luma(rgb);
    let smooth = |t: f32| t * t * (3.0 - 2.0 * t);
    let shadow_weight = 1.0 - smooth(((y - 0.5) / shadow_width + 0.5).clamp(0.0, 1.0));
    let highlight_weight = smooth(((y - 0.5) / highlight_width + 0.5).clamp(0.0, 1.0));

    let delta = (shadows * shadow_weight + highlights * highlight_weight) * 0.5;
    rgb.map(|v| v + delta)
}

/// Apply saturation and hue rotation.
///
/// Saturation scales chroma relative to luminance. Hue rotates the
/// chrominance angle. `luma_mix` blends between Rec. 709 luminance weights
/// and equal-weight luminance for the desaturation reference.
///
/// ```text
/// luma = lerp(dot(rgb, rec709_weights), dot(rgb, equal_weights), luma_mix)
/// chroma = rgb − luma
/// chroma_rotated = rotate_hue(chroma, hue_degrees)
/// out = luma + chroma_rotated × saturation
/// ```
///
/// `saturation = 1.0`, `hue = 0.0` produce no change.
pub fn apply_saturation_hue(rgb: [f32; 3], saturation: f32, hue: f32, luma_mix: f32) -> [f32; 3] {
    if (saturation - 1.0).abs() < 1e-7 && hue.abs() < 1e-7 {
        return rgb;
    }

    let luma_eq = rgb[0] * LUMA_EQUAL[0] + rgb[1] * LUMA_EQUAL[1] + rgb[2] * LUMA_EQUAL[2];
    let y = luma(rgb) * (1.0 - luma_mix) + luma_eq * luma_mix;

    let mut chroma = [rgb[0] - y, rgb[1] - y, rgb[2] - y];
    if hue.abs() > 1e-7 {
        chroma = rotate_chroma(chroma, hue);
    }

    [
        y + chroma[0] * saturation,
        y + chroma[1] * saturation,
        y + chroma[2] * saturation,
    ]
}

/// Saturation boost weighted toward muted colors.
///
/// ```text
/// s     = (max − min) / max
/// scale = 1 + (vibrance − 1) × (1 − s)
/// ```
///
/// `vibrance = 1.0` is the identity. Already saturated colors move least.
pub fn apply_vibrance(rgb: [f32; 3], vibrance: f32) -> [f32; 3] {
    if (vibrance - 1.0).abs() < 1e-7 {
        return rgb;
    }
    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    let min = rgb[0].min(rgb[1]).min(rgb[2]);
    let s = if max > 0.0 { ((max - min) / max).clamp(0.0, 1.0) } else { 0.0 };
    let scale = 1.0 + (vibrance - 1.0) * (1.0 - s);
    apply_saturation_hue(rgb, scale, 0.0, 0.0)
}

/// Exposure in stops: `out = in × 2^stops`.
pub fn apply_exposure(rgb: [f32; 3], stops: f32) -> [f32; 3] {
    if stops.abs() < 1e-7 {
        return rgb;
    }
    let gain = stops.exp2();
    rgb.map(|v| v * gain)
}

/// Per-channel `out = in × gain + offset`.
pub fn apply_gain_offset(rgb: [f32; 3], gain: [f32; 3], offset: [f32; 3]) -> [f32; 3] {
    [
        rgb[0] * gain[0] + offset[0],
        rgb[1] * gain[1] + offset[1],
        rgb[2] * gain[2] + offset[2],
    ]
}

/// Rotate the chrominance vector by `degrees` around the luminance axis.
///
/// Uses the Rodrigues rotation formula in the plane perpendicular to (1,1,1).
fn rotate_chroma(chroma: [f32; 3], degrees: f32) -> [f32; 3] {
    let rad = degrees.to_radians();
    let cos_a = rad.cos();
    let sin_a = rad.sin();

    // Rotation axis is the luminance direction (1,1,1)/sqrt(3)
    let inv_sqrt3 = 1.0 / 3.0_f32.sqrt();
    let k = [inv_sqrt3, inv_sqrt3, inv_sqrt3];

    // Rodrigues with k·v dropped; chroma is treated as perpendicular to k.
    let cross = [
        k[1] * chroma[2] - k[2] * chroma[1],
        k[2] * chroma[0] - k[0] * chroma[2],
        k[0] * chroma[1] - k[1] * chroma[0],
    ];

    [
        chroma[0] * cos_a + cross[0] * sin_a,
        chroma[1] * cos_a + cross[1] * sin_a,
        chroma[2] * cos_a + cross[2] * sin_a,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_contrast_at_pivot_is_identity() {
        let pivot = DEFAULT_PIVOT;
        let rgb = [pivot, pivot, pivot];
        let result = apply_contrast(rgb, 2.0, pivot);
        for i in 0..3 {
            assert!(
                (result[i] - pivot).abs() < EPSILON,
                "channel {i}: {:.8} vs {:.8}",
                result[i],
                pivot
            );
        }
    }

    #[test]
    fn test_contrast_one_is_identity() {
        let rgb = [0.3, 0.5, 0.7];
        assert_eq!(apply_contrast(rgb, 1.0, DEFAULT_PIVOT), rgb);
    }

    #[test]
    fn test_contrast_increases_spread() {
        let result = apply_contrast([0.8; 3], 2.0, DEFAULT_PIVOT);
        for v in result {
            assert!(v > 0.8, "contrast should push highlights higher");
        }
        let result = apply_contrast([0.2; 3], 2.0, DEFAULT_PIVOT);
        for v in result {
            assert!(v < 0.2, "contrast should push shadows lower");
        }
    }

    #[test]
    fn test_shadows_highlights_zero_is_identity() {
        let rgb = [0.3, 0.5, 0.7];
        assert_eq!(apply_shadows_highlights(rgb, 0.0, 0.0, 0.5, 0.5), rgb);
    }

    #[test]
    fn test_shadows_lift_dark_more_than_bright() {
        let dark = apply_shadows_highlights([0.1; 3], 0.4, 0.0, 0.5, 0.5);
        let bright = apply_shadows_highlights([0.9; 3], 0.4, 0.0, 0.5, 0.5);
        assert!(dark[0] - 0.1 > bright[0] - 0.9);
        assert!(dark[0] > 0.1);
    }

    #[test]
    fn test_saturation_zero_produces_grayscale() {
        let result = apply_saturation_hue([0.8, 0.4, 0.2], 0.0, 0.0, 0.0);
        assert!((result[0] - result[1]).abs() < EPSILON);
        assert!((result[1] - result[2]).abs() < EPSILON);
    }

    #[test]
    fn test_hue_rotation_360_is_identity() {
        let rgb = [0.5, 0.3, 0.7];
        let result = apply_saturation_hue(rgb, 1.0, 360.0, 0.0);
        for i in 0..3 {
            assert!(
                (result[i] - rgb[i]).abs() < EPSILON,
                "channel {i}: {:.6} vs {:.6}",
                result[i],
                rgb[i]
            );
        }
    }

    #[test]
    fn test_vibrance_favors_muted_colors() {
        let muted = [0.5, 0.45, 0.4];
        let vivid = [0.9, 0.1, 0.1];
        let spread = |c: [f32; 3]| c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2]);
        let muted_gain = spread(apply_vibrance(muted, 1.5)) / spread(muted);
        let vivid_gain = spread(apply_vibrance(vivid, 1.5)) / spread(vivid);
        assert!(muted_gain > vivid_gain, "{muted_gain} vs {vivid_gain}");
        assert_eq!(apply_vibrance(muted, 1.0), muted);
    }

    #[test]
    fn test_exposure_one_stop_doubles() {
        let result = apply_exposure([0.1, 0.2, 0.3], 1.0);
        for (i, expected) in [0.2, 0.4, 0.6].iter().enumerate() {
            assert!((result[i] - expected).abs() < EPSILON, "channel {i}");
        }
    }
}
