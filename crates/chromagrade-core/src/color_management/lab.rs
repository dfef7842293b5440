//! CIE L*a*b* helpers backed by `palette`.

use palette::white_point::D65;
use palette::{FromColor, Lab, LinSrgb, Xyz};

/// Linear Rec.709/sRGB → L*a*b* (D65).
pub fn linear_srgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    let lab: Lab<D65, f32> = Lab::from_color(LinSrgb::new(rgb[0], rgb[1], rgb[2]));
    [lab.l, lab.a, lab.b]
}

/// L*a*b* (D65) → linear Rec.709/sRGB. Out-of-gamut results are not clipped.
pub fn lab_to_linear_srgb(lab: [f32; 3]) -> [f32; 3] {
    let rgb: LinSrgb<f32> = LinSrgb::from_color(Lab::<D65, f32>::new(lab[0], lab[1], lab[2]));
    [rgb.red, rgb.green, rgb.blue]
}

/// XYZ (D65, Y = 1 white) → L*a*b*.
pub fn xyz_to_lab(xyz: [f64; 3]) -> [f64; 3] {
    let lab: Lab<D65, f64> = Lab::from_color(Xyz::<D65, f64>::new(xyz[0], xyz[1], xyz[2]));
    [lab.l, lab.a, lab.b]
}

pub fn lab_to_xyz(lab: [f64; 3]) -> [f64; 3] {
    let xyz: Xyz<D65, f64> = Xyz::from_color(Lab::<D65, f64>::new(lab[0], lab[1], lab[2]));
    [xyz.x, xyz.y, xyz.z]
}
