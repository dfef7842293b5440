//! Adobe/Resolve `.cube` LUT format.
//!
//! ```text
//! TITLE "Grade"
//! # input_space: Rec.709
//! # look: teal-orange
//! LUT_3D_SIZE 33
//! DOMAIN_MIN 0.0 0.0 0.0
//! DOMAIN_MAX 1.0 1.0 1.0
//!
//! 0.000000 0.000000 0.000000
//! ...
//! ```
//!
//! Data lines are red-fastest, which is also the in-memory order. `# key: value`
//! comments are kept as ordered metadata; `input_space`, `output_space` and
//! `interpolation` keys map onto the LUT's own fields.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::lut1d::Lut1D;
use super::lut3d::{Interpolation, Lut3D};
use super::{Lut, LutHeader, LutKind};
use crate::color_management::profile::ProfileId;
use crate::error::{GradeError, GradeResult};

const DEFAULT_MIN: [f32; 3] = [0.0; 3];
const DEFAULT_MAX: [f32; 3] = [1.0; 3];

pub fn read(path: impl AsRef<Path>) -> GradeResult<Lut> {
    let file = File::open(path.as_ref())?;
    parse(BufReader::new(file))
}

/// Read only the header, stopping at the first data line.
pub fn read_header(path: impl AsRef<Path>) -> GradeResult<LutHeader> {
    let file = File::open(path.as_ref())?;
    let (header, _) = scan(BufReader::new(file), true)?;
    Ok(header)
}

pub fn parse<R: BufRead>(reader: R) -> GradeResult<Lut> {
    let (header, data) = scan(reader, false)?;
    let expected = match header.kind {
        LutKind::OneD => header.size,
        LutKind::ThreeD => header.size * header.size * header.size,
    };
    if data.len() != expected {
        return Err(GradeError::Validation(format!(
            "LUT declares {expected} entries, found {}",
            data.len()
        )));
    }

    Ok(match header.kind {
        LutKind::OneD => {
            let mut lut = Lut1D::new(header.size, data)?.with_domain(header.domain_min, header.domain_max);
            lut.title = header.title;
            lut.metadata = header.metadata;
            lut.input_space = header.input_space;
            lut.output_space = header.output_space;
            Lut::OneD(lut)
        }
        LutKind::ThreeD => {
            let mut lut = Lut3D::new(header.size, data)?
                .with_domain(header.domain_min, header.domain_max)
                .with_interpolation(header.interpolation);
            lut.title = header.title;
            lut.metadata = header.metadata;
            lut.input_space = header.input_space;
            lut.output_space = header.output_space;
            Lut::ThreeD(lut)
        }
    })
}

fn scan<R: BufRead>(reader: R, header_only: bool) -> GradeResult<(LutHeader, Vec<[f32; 3]>)> {
    let mut size: Option<(LutKind, usize)> = None;
    let mut title = None;
    let mut metadata = Vec::new();
    let mut input_space = None;
    let mut output_space = None;
    let mut interpolation = Interpolation::default();
    let mut domain_min = DEFAULT_MIN;
    let mut domain_max = DEFAULT_MAX;
    let mut data = Vec::new();
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
                    "input_space" => input_space = Some(ProfileId::from_label(value)),
                    "output_space" => output_space = Some(ProfileId::from_label(value)),
                    "interpolation" => {
                        interpolation = Interpolation::from_name(value).ok_or_else(|| {
                            GradeError::parse(line_no, format!("unknown interpolation '{value}'"))
                        })?;
                    }
                    _ => metadata.push((key.to_string(), value.to_string())),
                }
            }
            continue;
        }

        let keyword = line.split_whitespace().next().unwrap_or_default();
        match keyword {
            "TITLE" => {
                let rest = line["TITLE".len()..].trim();
                title = Some(rest.trim_matches('"').to_string());
            }
            "LUT_3D_SIZE" | "LUT_1D_SIZE" => {
                if size.is_some() {
                    return Err(GradeError::parse(line_no, "duplicate LUT size declaration"));
                }
                let kind = if keyword == "LUT_3D_SIZE" {
                    LutKind::ThreeD
                } else {
                    LutKind::OneD
                };
                size = Some((kind, parse_size(kind, line, line_no)?));
            }
            "DOMAIN_MIN" => domain_min = parse_triplet(&line[keyword.len()..], line_no)?,
            "DOMAIN_MAX" => domain_max = parse_triplet(&line[keyword.len()..], line_no)?,
            "LUT_3D_INPUT_RANGE" | "LUT_1D_INPUT_RANGE" => {
                let (lo, hi) = parse_range(&line[keyword.len()..], line_no)?;
                domain_min = [lo; 3];
                domain_max = [hi; 3];
            }
            _ => {
                if size.is_none() {
                    return Err(GradeError::parse(line_no, "data before LUT_3D_SIZE / LUT_1D_SIZE"));
                }
                if header_only {
                    break;
                }
                data.push(parse_triplet(line, line_no)?);
            }
        }
    }

    let (kind, size) =
        size.ok_or_else(|| GradeError::parse(last_line, "missing LUT_3D_SIZE or LUT_1D_SIZE"))?;
    for c in 0..3 {
        if domain_max[c] <= domain_min[c] {
            return Err(GradeError::Validation(format!(
                "domain max {} must exceed domain min {} on channel {c}",
                domain_max[c], domain_min[c]
            )));
        }
    }

    let header = LutHeader {
        kind,
        size,
        title,
        metadata,
        input_space,
        output_space,
        interpolation,
        domain_min,
        domain_max,
    };
    Ok((header, data))
}

pub fn write(path: impl AsRef<Path>, lut: &Lut) -> GradeResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, lut)?;
    writer.flush()?;
    Ok(())
}

/// Serialize to a string; identical to the bytes [`write`] produces.
pub fn to_string(lut: &Lut) -> GradeResult<String> {
    let mut buf = Vec::new();
    write_to(&mut buf, lut)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn write_to<W: Write>(mut writer: W, lut: &Lut) -> GradeResult<()> {
    if !lut.is_consistent() {
        return Err(GradeError::Validation(format!(
            "LUT of size {} has {} entries",
            lut.size(),
            lut.data().len()
        )));
    }

    if let Some(title) = lut.title() {
        writeln!(writer, "TITLE \"{title}\"")?;
    }
    if let Some(space) = lut.input_space() {
        writeln!(writer, "# input_space: {}", space.label())?;
    }
    if let Some(space) = lut.output_space() {
        writeln!(writer, "# output_space: {}", space.label())?;
    }
    if lut.interpolation() != Interpolation::default() {
        writeln!(writer, "# interpolation: {}", lut.interpolation().as_str())?;
    }
    for (key, value) in lut.metadata() {
        writeln!(writer, "# {key}: {}", value.replace('\n', " "))?;
    }

    match lut.kind() {
        LutKind::OneD => writeln!(writer, "LUT_1D_SIZE {}", lut.size())?,
        LutKind::ThreeD => writeln!(writer, "LUT_3D_SIZE {}", lut.size())?,
    }
    let (min, max) = lut.domain();
    if min != DEFAULT_MIN || max != DEFAULT_MAX {
        writeln!(writer, "DOMAIN_MIN {:.6} {:.6} {:.6}", min[0], min[1], min[2])?;
        writeln!(writer, "DOMAIN_MAX {:.6} {:.6} {:.6}", max[0], max[1], max[2])?;
    }
    writeln!(writer)?;

    for rgb in lut.data() {
        writeln!(writer, "{:.6} {:.6} {:.6}", rgb[0], rgb[1], rgb[2])?;
    }
    Ok(())
}

fn parse_size(kind: LutKind, line: &str, line_no: usize) -> GradeResult<usize> {
    let value = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| GradeError::parse(line_no, "missing size value"))?;
    let size: usize = value
        .parse()
        .map_err(|_| GradeError::parse(line_no, format!("invalid size '{value}'")))?;
    match kind {
        LutKind::OneD => Lut1D::check_size(size)?,
        LutKind::ThreeD => Lut3D::check_size(size)?,
    }
    Ok(size)
}

fn parse_float(token: &str, line_no: usize) -> GradeResult<f32> {
    let v: f32 = token
        .parse()
        .map_err(|_| GradeError::parse(line_no, format!("invalid number '{token}'")))?;
    if !v.is_finite() {
        return Err(GradeError::parse(line_no, format!("non-finite value '{token}'")));
    }
    Ok(v)
}

fn parse_triplet(text: &str, line_no: usize) -> GradeResult<[f32; 3]> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(GradeError::parse(
            line_no,
            format!("expected 3 values, found {}", parts.len()),
        ));
    }
    Ok([
        parse_float(parts[0], line_no)?,
        parse_float(parts[1], line_no)?,
        parse_float(parts[2], line_no)?,
    ])
}

fn parse_range(text: &str, line_no: usize) -> GradeResult<(f32, f32)> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(GradeError::parse(line_no, "expected min and max"));
    }
    Ok((parse_float(parts[0], line_no)?, parse_float(parts[1], line_no)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "TITLE \"Test Grade\"
# input_space: Rec.709
# output_space: sRGB
# look: teal: orange
LUT_3D_SIZE 2

0.000000 0.000000 0.000000
1.000000 0.000000 0.000000
0.000000 1.000000 0.000000
1.000000 1.000000 0.000000
0.000000 0.000000 1.000000
1.000000 0.000000 1.000000
0.000000 1.000000 1.000000
1.000000 1.000000 1.000000
";

    #[test]
    fn test_parse_header_fields() {
        let lut = parse(Cursor::new(SAMPLE)).unwrap();
        let Lut::ThreeD(lut) = lut else {
            panic!("expected 3D LUT");
        };
        assert_eq!(lut.size, 2);
        assert_eq!(lut.title.as_deref(), Some("Test Grade"));
        assert_eq!(lut.input_space, Some(ProfileId::Rec709));
        assert_eq!(lut.output_space, Some(ProfileId::Srgb));
        assert_eq!(lut.metadata, vec![("look".to_string(), "teal: orange".to_string())]);
        assert_eq!(lut.data[1], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_roundtrip_is_byte_identical() {
        let lut = parse(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(to_string(&lut).unwrap(), SAMPLE);
    }

    #[test]
    fn test_non_default_domain_and_interpolation_roundtrip() {
        let lut = Lut3D::identity(3)
            .unwrap()
            .with_domain([-0.5; 3], [2.0; 3])
            .with_interpolation(Interpolation::Tetrahedral);
        let text = to_string(&Lut::ThreeD(lut.clone())).unwrap();
        assert!(text.contains("DOMAIN_MIN -0.500000 -0.500000 -0.500000"));
        let Lut::ThreeD(back) = parse(Cursor::new(text)).unwrap() else {
            panic!("expected 3D LUT");
        };
        assert_eq!(back.domain_min, lut.domain_min);
        assert_eq!(back.interpolation, Interpolation::Tetrahedral);
    }

    #[test]
    fn test_parse_1d() {
        let text = "LUT_1D_SIZE 3\n0.0 0.0 0.0\n0.25 0.25 0.25\n1.0 1.0 1.0\n";
        let lut = parse(Cursor::new(text)).unwrap();
        assert_eq!(lut.kind(), LutKind::OneD);
        assert!((lut.apply([0.25; 3])[0] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_entry_count_mismatch() {
        let text = "LUT_3D_SIZE 2\n0 0 0\n1 1 1\n";
        assert!(matches!(parse(Cursor::new(text)), Err(GradeError::Validation(_))));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let text = "LUT_3D_SIZE 2\n0 0 0\n1 x 1\n";
        match parse(Cursor::new(text)) {
            Err(GradeError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_header_is_rejected_before_reading_data() {
        for text in [
            "LUT_3D_SIZE 3000000\n0 0 0\n",
            "LUT_3D_SIZE 18446744073709551615\n0 0 0\n",
            "LUT_3D_SIZE 257\n0 0 0\n",
            "LUT_1D_SIZE 65537\n0 0 0\n",
        ] {
            assert!(matches!(parse(Cursor::new(text)), Err(GradeError::Validation(_))), "{text}");
        }
    }

    #[test]
    fn test_missing_size() {
        assert!(matches!(parse(Cursor::new("# nothing\n")), Err(GradeError::Parse { .. })));
    }
}
