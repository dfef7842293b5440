//! Built-in creative looks baked from operation lists.

use enough::Stop;

use super::lut3d::Lut3D;
use crate::error::{GradeError, GradeResult};
use crate::grading::{ApplyContext, ContrastParams, HslParams, OperationKind, OperationStack};

pub const LOOKS: [&str; 3] = ["cinematic", "vintage", "vibrant"];

fn look_operations(name: &str) -> GradeResult<(&'static str, Vec<OperationKind>)> {
    let contrast = |contrast: f32, brightness: f32| {
        OperationKind::Contrast(ContrastParams { contrast, brightness, ..ContrastParams::default() })
    };
    let hsl = |hue_shift: f32, saturation: f32, lightness: f32| {
        OperationKind::Hsl(HslParams { hue_shift, saturation, lightness })
    };
    Ok(match name {
        "cinematic" => ("Cinematic", vec![contrast(1.2, -0.05), hsl(0.0, 0.9, 0.95)]),
        "vintage" => ("Vintage", vec![contrast(1.1, 0.1), hsl(0.05, 0.7, 1.1)]),
        "vibrant" => ("Vibrant", vec![contrast(1.3, 0.0), hsl(0.0, 1.4, 0.95)]),
        other => return Err(GradeError::Configuration(format!("unknown look '{other}'"))),
    })
}

/// Bake the named look into a `size`³ LUT with outputs clamped to `[0, 1]`.
pub fn look(name: &str, size: usize, stop: impl Stop + Sync) -> GradeResult<Lut3D> {
    let (title, kinds) = look_operations(name)?;
    let stack = OperationStack::new();
    for kind in kinds {
        stack.push(kind)?;
    }
    let (mut lut, _) = stack.bake(size, ApplyContext::default(), stop)?;
    for rgb in &mut lut.data {
        *rgb = rgb.map(|v| v.clamp(0.0, 1.0));
    }
    Ok(lut.with_title(title).with_metadata("look", name))
}

#[cfg(test)]
mod tests {
    use enough::Unstoppable;

    use super::*;
    use crate::lut::{Lut, LutAnalysis};

    #[test]
    fn test_all_looks_build() {
        for name in LOOKS {
            let lut = look(name, 17, Unstoppable).unwrap();
            assert_eq!(lut.size, 17);
            assert!(lut.data.iter().flatten().all(|v| (0.0..=1.0).contains(v)), "{name}");
            assert_eq!(lut.metadata, vec![("look".to_string(), name.to_string())]);
        }
    }

    #[test]
    fn test_vibrant_adds_saturation() {
        let vibrant = LutAnalysis::of(&Lut::ThreeD(look("vibrant", 17, Unstoppable).unwrap()));
        let cinematic = LutAnalysis::of(&Lut::ThreeD(look("cinematic", 17, Unstoppable).unwrap()));
        assert!(vibrant.saturation.average_change > cinematic.saturation.average_change);
    }

    #[test]
    fn test_unknown_look() {
        assert!(matches!(look("bleach", 17, Unstoppable), Err(GradeError::Configuration(_))));
    }
}
