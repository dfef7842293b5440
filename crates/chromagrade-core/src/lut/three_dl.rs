//! Autodesk/Lustre `.3dl` LUT format.
//!
//! ```text
//! # TITLE: Grade
//! 3DMESH 17 17 17
//!
//! 0.000000	0.000000	0.000000
//! ...
//! ```
//!
//! File order is blue-fastest (red outermost). Integer files (Lustre/Flame
//! style, optionally led by a shaper line of input code values) are
//! normalized by the bit depth inferred from the largest value.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::lut3d::{Interpolation, Lut3D};
use super::{Lut, LutHeader};
use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};

pub fn read(path: impl AsRef<Path>) -> GradeResult<Lut> {
    let file = File::open(path.as_ref())?;
    parse(BufReader::new(file)).map(Lut::ThreeD)
}

/// Files may omit `3DMESH`, so the size comes from a full parse.
pub fn read_header(path: impl AsRef<Path>) -> GradeResult<LutHeader> {
    let file = File::open(path.as_ref())?;
    let lut = parse(BufReader::new(file))?;
    Ok(Lut::ThreeD(lut).header())
}

#[derive(Default)]
struct Raw {
    mesh: Option<usize>,
    shaper_len: Option<usize>,
    title: Option<String>,
    metadata: Vec<(String, String)>,
    input_space: Option<ProfileId>,
    output_space: Option<ProfileId>,
    interpolation: Interpolation,
    rows: Vec<[f64; 3]>,
    integer: bool,
}

pub fn parse<R: BufRead>(reader: R) -> GradeResult<Lut3D> {
    let mut raw = Raw {
        integer: true,
        ..Raw::default()
    };
    let mut last_line = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            if let Some((key, value)) = comment.trim().split_once(": ") {
                match key {
                    "TITLE" => raw.title = Some(value.to_string()),
                    "input_space" => raw.input_space = Some(ProfileId::from_label(value)),
                    "output_space" => raw.output_space = Some(ProfileId::from_label(value)),
                    "interpolation" => {
                        raw.interpolation = Interpolation::from_name(value).ok_or_else(|| {
                            GradeError::parse(line_no, format!("unknown interpolation '{value}'"))
                        })?;
                    }
                    _ => raw.metadata.push((key.to_string(), value.to_string())),
                }
            }
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens[0] == "3DMESH" || tokens[0] == "Mesh" {
            let dims: Vec<usize> = tokens[1..]
                .iter()
                .map(|t| t.parse::<usize>())
                .collect::<Result<_, _>>()
                .map_err(|_| GradeError::parse(line_no, "invalid mesh dimensions"))?;
            if tokens[0] == "3DMESH" {
                if dims.len() != 3 || dims[0] != dims[1] || dims[1] != dims[2] {
                    return Err(GradeError::parse(line_no, "3DMESH needs three equal dimensions"));
                }
                Lut3D::check_size(dims[0])?;
                raw.mesh = Some(dims[0]);
            }
            continue;
        }

        if tokens.len() != 3 {
            // Shaper line: evenly spaced input code values.
            if raw.rows.is_empty() && raw.shaper_len.is_none() && tokens.len() >= 2 {
                raw.shaper_len = Some(tokens.len());
                continue;
            }
            return Err(GradeError::parse(line_no, format!("expected 3 values, found {}", tokens.len())));
        }

        let mut row = [0.0; 3];
        for (c, token) in tokens.iter().enumerate() {
            if token.contains(['.', 'e', 'E']) {
                raw.integer = false;
            }
            let v: f64 = token
                .parse()
                .map_err(|_| GradeError::parse(line_no, format!("invalid number '{token}'")))?;
            if !v.is_finite() {
                return Err(GradeError::parse(line_no, format!("non-finite value '{token}'")));
            }
            row[c] = v;
        }
        raw.rows.push(row);
    }

    if raw.rows.is_empty() {
        return Err(GradeError::parse(last_line, "no LUT data"));
    }
    let size = match (raw.mesh, raw.shaper_len) {
        (Some(n), _) | (None, Some(n)) => n,
        (None, None) => infer_size(raw.rows.len())
            .ok_or_else(|| GradeError::parse(last_line, "cannot infer LUT size from entry count"))?,
    };
    Lut3D::check_size(size)?;
    let expected = size * size * size;
    if raw.rows.len() != expected {
        return Err(GradeError::Validation(format!(
            "3DMESH {size} needs {expected} entries, found {}",
            raw.rows.len()
        )));
    }

    let scale = if raw.integer {
        let max = raw.rows.iter().flatten().cloned().fold(0.0_f64, f64::max);
        integer_scale(max)
    } else {
        1.0
    };

    // Blue-fastest file order → red-fastest memory order.
    let mut data = vec![[0.0_f32; 3]; expected];
    for (file_idx, row) in raw.rows.iter().enumerate() {
        let b = file_idx % size;
        let g = (file_idx / size) % size;
        let r = file_idx / (size * size);
        data[r + size * (g + size * b)] = [
            (row[0] / scale) as f32,
            (row[1] / scale) as f32,
            (row[2] / scale) as f32,
        ];
    }

    let mut lut = Lut3D::new(size, data)?.with_interpolation(raw.interpolation);
    lut.title = raw.title;
    lut.metadata = raw.metadata;
    lut.input_space = raw.input_space;
    lut.output_space = raw.output_space;
    Ok(lut)
}

fn infer_size(count: usize) -> Option<usize> {
    let n = (count as f64).cbrt().round() as usize;
    (n >= 2 && n * n * n == count).then_some(n)
}

/// Full-scale code value for integer data.
fn integer_scale(max: f64) -> f64 {
    match max {
        m if m <= 1.0 => 1.0,
        m if m <= 1023.0 => 1023.0,
        m if m <= 4095.0 => 4095.0,
        _ => 65535.0,
    }
}

pub fn write(path: impl AsRef<Path>, lut: &Lut) -> GradeResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, lut)?;
    writer.flush()?;
    Ok(())
}

pub fn to_string(lut: &Lut) -> GradeResult<String> {
    let mut buf = Vec::new();
    write_to(&mut buf, lut)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `.3dl` carries 3D data only; 1D LUTs are rejected.
pub fn write_to<W: Write>(mut writer: W, lut: &Lut) -> GradeResult<()> {
    let Lut::ThreeD(lut) = lut else {
        return Err(GradeError::Configuration("the .3dl format only stores 3D LUTs".into()));
    };
    if !lut.is_consistent() {
        return Err(GradeError::Validation(format!(
            "LUT of size {} has {} entries",
            lut.size,
            lut.data.len()
        )));
    }
    if lut.domain_min != [0.0; 3] || lut.domain_max != [1.0; 3] {
        return Err(GradeError::Validation(
            "the .3dl format cannot store a non-unit domain".into(),
        ));
    }

    if let Some(title) = &lut.title {
        writeln!(writer, "# TITLE: {title}")?;
    }
    if let Some(space) = &lut.input_space {
        writeln!(writer, "# input_space: {}", space.label())?;
    }
    if let Some(space) = &lut.output_space {
        writeln!(writer, "# output_space: {}", space.label())?;
    }
    if lut.interpolation != Interpolation::default() {
        writeln!(writer, "# interpolation: {}", lut.interpolation.as_str())?;
    }
    for (key, value) in &lut.metadata {
        writeln!(writer, "# {key}: {}", value.replace('\n', " "))?;
    }
    let n = lut.size;
    writeln!(writer, "3DMESH {n} {n} {n}")?;
    writeln!(writer)?;

    for r in 0..n {
        for g in 0..n {
            for b in 0..n {
                let v = lut.data[lut.index(r, g, b)];
                writeln!(writer, "{:.6}\t{:.6}\t{:.6}", v[0], v[1], v[2])?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reorders_blue_fastest_file() {
        let lut = Lut3D::identity(3).unwrap();
        let text = to_string(&Lut::ThreeD(lut.clone())).unwrap();
        // Second data line is r=0, g=0, b=1.
        let second = text.lines().filter(|l| l.contains('\t')).nth(1).unwrap();
        assert_eq!(second, "0.000000\t0.000000\t0.500000");
        let back = parse(Cursor::new(text)).unwrap();
        assert_eq!(back.data, lut.data);
    }

    #[test]
    fn test_roundtrip_is_byte_identical() {
        let lut = Lut3D::identity(4).unwrap().with_title("Identity").with_metadata("source", "test");
        let text = to_string(&Lut::ThreeD(lut)).unwrap();
        let back = parse(Cursor::new(text.clone())).unwrap();
        assert_eq!(to_string(&Lut::ThreeD(back)).unwrap(), text);
    }

    #[test]
    fn test_integer_data_with_shaper() {
        let mut text = String::from("0 1023\n");
        for r in [0, 1023] {
            for g in [0, 1023] {
                for b in [0, 1023] {
                    text.push_str(&format!("{r} {g} {b}\n"));
                }
            }
        }
        let lut = parse(Cursor::new(text)).unwrap();
        assert_eq!(lut.size, 2);
        assert_eq!(lut.data[1], [1.0, 0.0, 0.0]);
        assert_eq!(lut.data[7], [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_size_mismatch() {
        let text = "3DMESH 2 2 2\n0 0 0\n";
        assert!(matches!(parse(Cursor::new(text)), Err(GradeError::Validation(_))));
    }

    #[test]
    fn test_oversized_mesh_is_rejected() {
        for text in ["3DMESH 3000000 3000000 3000000\n0 0 0\n", "Mesh 4 10\n3DMESH 257 257 257\n0 0 0\n"] {
            assert!(matches!(parse(Cursor::new(text)), Err(GradeError::Validation(_))), "{text}");
        }
    }

    #[test]
    fn test_rejects_1d() {
        let lut = Lut::OneD(crate::lut::Lut1D::identity(8).unwrap());
        assert!(matches!(to_string(&lut), Err(GradeError::Configuration(_))));
    }
}
