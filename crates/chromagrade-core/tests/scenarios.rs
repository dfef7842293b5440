//! End-to-end grading scenarios with hand-computed expectations.

use approx::assert_abs_diff_eq;

use chromagrade_core::color_management::transfer::PqTransfer;
use chromagrade_core::color_management::{ColorSpaceConverter, ProfileId};
use chromagrade_core::frame::{Frame, SampleEncoding};
use chromagrade_core::grading::{ApplyContext, ContrastParams, OperationKind, OperationStack};
use chromagrade_core::lut::{self, Lut, Lut3D};
use chromagrade_core::matching::{ColorMatcher, MatchMethod};
use chromagrade_core::tonemap::{HdrMetadata, ToneMapper, ToneMappingSettings};

const EPSILON: f32 = 1e-3;

/// A busy 16×16 frame: every channel varies independently.
fn busy_frame(space: ProfileId) -> Frame {
    let pixels = (0..256)
        .map(|i| {
            let x = (i % 16) as f32 / 15.0;
            let y = (i / 16) as f32 / 15.0;
            [x, y, (x * 7.0 + y * 3.0).fract()]
        })
        .collect();
    Frame::new(16, 16, pixels, space, SampleEncoding::Encoded).unwrap()
}

#[test]
fn test_linear_gray_survives_srgb_rec709_srgb() {
    let converter = ColorSpaceConverter::new();
    let frame = Frame::filled(8, 8, [0.5; 3], ProfileId::Srgb, SampleEncoding::Linear);

    let rec709 = converter.convert(&frame, &ProfileId::Srgb, &ProfileId::Rec709).unwrap();
    let back = converter.convert(&rec709, &ProfileId::Rec709, &ProfileId::Srgb).unwrap();

    assert_eq!(back.color_space, ProfileId::Srgb);
    for px in &back.pixels {
        for i in 0..3 {
            assert!((px[i] - 0.5).abs() < EPSILON, "channel {i}: {:.6} vs 0.5", px[i]);
        }
    }
}

#[test]
fn test_pq_1000_nits_reinhard_to_100_nits() {
    let encoded = PqTransfer.encode_nits(1000.0) as f32;
    let frame = Frame::filled(32, 18, [encoded; 3], ProfileId::Rec2100Pq, SampleEncoding::Encoded);
    let metadata = HdrMetadata::default();
    let settings = ToneMappingSettings::default();

    let sdr = ToneMapper::new().map_encoded(&frame, &metadata, &settings).unwrap();

    // key = 0.1, scale = 0.01 / 0.1, L' = 0.01 / 1.01, then the Rec. 709 OETF.
    let expected = 0.044554_f32;
    let mean = sdr.mean_rgb();
    for i in 0..3 {
        assert_abs_diff_eq!(mean[i], expected, epsilon = EPSILON);
    }
}

#[test]
fn test_identity_cube_leaves_frame_exactly_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity_17.cube");
    lut::save(&Lut::ThreeD(Lut3D::identity(17).unwrap()), &path).unwrap();
    let identity = lut::load(&path).unwrap();
    assert_eq!(identity.size(), 17);

    let frame = busy_frame(ProfileId::Rec709);
    let out = identity.apply_frame(&frame, 1.0).unwrap();
    assert_eq!(out.pixels, frame.pixels);
}

#[test]
fn test_unit_contrast_then_double_equals_double() {
    let pair = OperationStack::new();
    pair.push(OperationKind::Contrast(ContrastParams::new(1.0))).unwrap();
    pair.push(OperationKind::Contrast(ContrastParams::new(2.0))).unwrap();

    let single = OperationStack::new();
    single.push(OperationKind::Contrast(ContrastParams::new(2.0))).unwrap();

    let frame = busy_frame(ProfileId::Rec709);
    let (a, report_a) = pair.apply(&frame, ApplyContext::default());
    let (b, report_b) = single.apply(&frame, ApplyContext::default());
    assert!(report_a.is_clean() && report_b.is_clean());
    assert_eq!(report_a.applied.len(), 2);
    assert_eq!(a.pixels, b.pixels);
}

#[test]
fn test_histogram_match_to_self_is_identity() {
    let converter = ColorSpaceConverter::new();
    let matcher = ColorMatcher::new(&converter);
    let frame = busy_frame(ProfileId::Srgb);

    let out = matcher.apply(&frame, &frame, MatchMethod::Histogram).unwrap();
    assert_eq!(out.pixels, frame.pixels);
    assert_eq!(out.color_space, frame.color_space);
    assert_eq!(out.encoding, frame.encoding);
}
