use image::{Rgb, RgbImage};

use foresight::config::{DebounceSettings, KeyMatching, PipelineConfig, Thresholds};
use foresight::measure::measure_region;
use foresight::{
    BoundingBox, BoxKind, DebounceState, Detection, DetectorRegistry, FrameAnnotator,
    FrameOutcome, ScriptedBackend,
};

const BRIGHT: Rgb<u8> = Rgb([0, 0, 200]);
const DARK: Rgb<u8> = Rgb([0, 0, 20]);

fn det(x1: i32, y1: i32, x2: i32, y2: i32, conf: f32, label: &str) -> Detection {
    Detection::new(BoundingBox::new(x1, y1, x2, y2), conf, label)
}

fn frame(color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(100, 100, color)
}

/// One full-frame vessel with a liquid region covering the lower half of x 10..40.
fn liquid_registry() -> DetectorRegistry {
    DetectorRegistry::with_backends(
        ScriptedBackend::fixed("vessel", vec![det(0, 0, 100, 100, 0.9, "vessel")]),
        ScriptedBackend::fixed("content", vec![det(10, 50, 40, 100, 0.8, "Homo")]),
    )
}

fn gated_config(debounce: DebounceSettings) -> PipelineConfig {
    PipelineConfig {
        thresholds: Some(Thresholds {
            min_turbidity: 50.0,
            min_hue: 20.0,
            min_volume_fraction: 0.1,
            min_confidence: 0.4,
        }),
        debounce,
        ..PipelineConfig::default()
    }
}

fn debounced() -> DebounceSettings {
    DebounceSettings {
        enabled: true,
        matching: KeyMatching::Coordinates,
    }
}

/// Annotate `frames` in order with one annotator and one debounce state; return the liquid labels.
fn run_sequence(
    config: PipelineConfig,
    detectors: &mut DetectorRegistry,
    frames: &[RgbImage],
) -> Vec<String> {
    let mut debounce = DebounceState::new(config.debounce);
    let mut annotator = FrameAnnotator::with_font(config, None);
    frames
        .iter()
        .map(|f| {
            debounce.begin_frame();
            annotator
                .annotate_frame(f, detectors, &mut debounce)
                .expect("annotate");
            annotator.last_labels()[1].clone()
        })
        .collect()
}

#[test]
fn clipped_boxes_stay_inside_frame() {
    let image = RgbImage::new(120, 90);
    let mut detectors = DetectorRegistry::with_backends(
        ScriptedBackend::fixed(
            "vessel",
            vec![
                det(-20, -20, 60, 60, 0.9, "vessel"),
                det(100, 50, 300, 400, 0.8, "vessel"),
            ],
        ),
        ScriptedBackend::fixed(
            "content",
            vec![det(-5, -5, 500, 10, 0.7, "Solid"), det(10, 10, 30, 30, 0.7, "Empty")],
        ),
    );
    let mut annotator = FrameAnnotator::with_font(PipelineConfig::default(), None);
    let mut debounce = DebounceState::new(DebounceSettings::default());

    let FrameOutcome::Annotated { boxes, .. } = annotator
        .annotate_frame(&image, &mut detectors, &mut debounce)
        .unwrap()
    else {
        panic!("expected annotation");
    };
    assert_eq!(boxes.len(), 6);
    for b in &boxes {
        let bbox = b.bbox;
        assert!(0 <= bbox.x1() && bbox.x1() <= bbox.x2() && bbox.x2() <= 120, "{bbox}");
        assert!(0 <= bbox.y1() && bbox.y1() <= bbox.y2() && bbox.y2() <= 90, "{bbox}");
    }
}

#[test]
fn content_offset_matches_vessel_origin() {
    let image = RgbImage::new(200, 200);
    let mut detectors = DetectorRegistry::with_backends(
        ScriptedBackend::fixed("vessel", vec![det(10, 10, 110, 110, 0.9, "vessel")]),
        ScriptedBackend::fixed("content", vec![det(5, 5, 15, 15, 0.9, "Solid")]),
    );
    let mut annotator = FrameAnnotator::with_font(PipelineConfig::default(), None);
    let mut debounce = DebounceState::new(DebounceSettings::default());

    let outcome = annotator
        .annotate_frame(&image, &mut detectors, &mut debounce)
        .unwrap();
    let FrameOutcome::Annotated { boxes, .. } = outcome else {
        panic!("expected annotation");
    };
    let content: Vec<_> = boxes.iter().filter(|b| b.kind == BoxKind::Content).collect();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0].bbox, BoundingBox::new(15, 15, 25, 25));
}

#[test]
fn debounce_holds_value_for_grace_period() {
    let frames = [frame(BRIGHT), frame(DARK), frame(DARK), frame(DARK), frame(DARK)];
    let labels = run_sequence(gated_config(debounced()), &mut liquid_registry(), &frames);

    assert_eq!(labels[0], "Homo 0.80 | T=200.0, C=120.0, V=0.50");
    assert_eq!(labels[1], "Homo 0.80 | T=200.0, C=120.0, V=0.50");
    assert_eq!(labels[2], "Homo 0.80 | T=200.0, C=120.0, V=0.50");
    assert_eq!(labels[3], "Homo 0.80 | C=120.0, V=0.50");
    assert_eq!(labels[4], "Homo 0.80 | C=120.0, V=0.50");
}

#[test]
fn debounce_reacquires_without_lag() {
    let frames = [frame(BRIGHT), frame(DARK), frame(Rgb([0, 0, 180]))];
    let labels = run_sequence(gated_config(debounced()), &mut liquid_registry(), &frames);

    assert_eq!(labels[1], "Homo 0.80 | T=200.0, C=120.0, V=0.50");
    assert_eq!(labels[2], "Homo 0.80 | T=180.0, C=120.0, V=0.50");
}

#[test]
fn disabled_debounce_tracks_raw_decisions() {
    let frames = [frame(BRIGHT), frame(DARK), frame(BRIGHT)];
    let labels = run_sequence(
        gated_config(DebounceSettings::default()),
        &mut liquid_registry(),
        &frames,
    );

    assert_eq!(labels[0], "Homo 0.80 | T=200.0, C=120.0, V=0.50");
    assert_eq!(labels[1], "Homo 0.80 | C=120.0, V=0.50");
    assert_eq!(labels[2], "Homo 0.80 | T=200.0, C=120.0, V=0.50");
}

fn drifting_registry() -> DetectorRegistry {
    DetectorRegistry::with_backends(
        ScriptedBackend::fixed("vessel", vec![det(0, 0, 100, 100, 0.9, "vessel")]),
        ScriptedBackend::sequence(
            "content",
            vec![
                vec![det(10, 50, 40, 100, 0.8, "Hetero")],
                vec![det(12, 50, 42, 100, 0.8, "Hetero")],
            ],
        ),
    )
}

#[test]
fn coordinate_keys_lose_state_when_box_moves() {
    let frames = [frame(BRIGHT), frame(DARK)];
    let labels = run_sequence(gated_config(debounced()), &mut drifting_registry(), &frames);
    assert_eq!(labels[1], "Hetero 0.80 | C=120.0, V=0.50");
}

#[test]
fn iou_matching_keeps_state_for_moving_box() {
    let settings = DebounceSettings {
        enabled: true,
        matching: KeyMatching::Iou { min_iou: 0.5 },
    };
    let frames = [frame(BRIGHT), frame(DARK)];
    let labels = run_sequence(gated_config(settings), &mut drifting_registry(), &frames);
    assert_eq!(labels[1], "Hetero 0.80 | T=200.0, C=120.0, V=0.50");
}

#[test]
fn annotation_is_idempotent() {
    let image = frame(BRIGHT);
    let mut annotator = FrameAnnotator::with_font(gated_config(debounced()), None);

    let mut first_state = DebounceState::new(debounced());
    let first = annotator
        .annotate_frame(&image, &mut liquid_registry(), &mut first_state)
        .unwrap();
    let mut second_state = DebounceState::new(debounced());
    let second = annotator
        .annotate_frame(&image, &mut liquid_registry(), &mut second_state)
        .unwrap();

    match (first, second) {
        (
            FrameOutcome::Annotated {
                image: a,
                boxes: boxes_a,
            },
            FrameOutcome::Annotated {
                image: b,
                boxes: boxes_b,
            },
        ) => {
            assert_eq!(boxes_a, boxes_b);
            assert_eq!(a, b);
        }
        _ => panic!("expected annotation"),
    }
}

#[test]
fn no_vessel_returns_original_frame() {
    let image = frame(Rgb([12, 34, 56]));
    let mut detectors = DetectorRegistry::with_backends(
        ScriptedBackend::empty("vessel"),
        ScriptedBackend::fixed("content", vec![det(0, 0, 10, 10, 0.9, "Solid")]),
    );
    let mut config = PipelineConfig::default();
    config.render.top_left_list = true;
    let mut annotator = FrameAnnotator::with_font(config, None);
    let mut debounce = DebounceState::new(DebounceSettings::default());

    let rendered = annotator
        .render_frame(&image, &mut detectors, &mut debounce)
        .unwrap();
    assert!(!rendered.annotated);
    assert_eq!(rendered.image, image);
}

#[test]
fn single_color_region_measures_in_range() {
    for color in [Rgb([255, 255, 255]), Rgb([0, 0, 0]), Rgb([255, 0, 255]), BRIGHT] {
        let image = frame(color);
        let m = measure_region(&image, BoundingBox::new(0, 0, 100, 100), 100).unwrap();
        assert!((0.0..=180.0).contains(&m.hue), "{m:?}");
        assert!((0.0..=255.0).contains(&m.turbidity), "{m:?}");
        assert!((0.0..=1.0).contains(&m.volume_fraction), "{m:?}");
    }
    let m = measure_region(&frame(Rgb([255, 0, 255])), BoundingBox::new(0, 0, 10, 10), 100).unwrap();
    assert_eq!(m.hue, 150.0);
    assert_eq!(m.turbidity, 255.0);
    assert_eq!(m.volume_fraction, 0.1);
}

#[test]
fn side_by_side_doubles_width_and_keeps_height() {
    let image = RgbImage::from_pixel(64, 48, BRIGHT);
    let mut config = PipelineConfig::default();
    config.render.side_by_side = true;
    config.render.top_left_list = true;
    let mut annotator = FrameAnnotator::with_font(config, None);
    let mut debounce = DebounceState::new(DebounceSettings::default());
    let mut detectors = DetectorRegistry::with_backends(
        ScriptedBackend::fixed("vessel", vec![det(4, 4, 60, 44, 0.9, "vessel")]),
        ScriptedBackend::empty("content"),
    );

    let rendered = annotator
        .render_frame(&image, &mut detectors, &mut debounce)
        .unwrap();
    assert_eq!(rendered.image.width(), 2 * image.width());
    assert_eq!(rendered.image.height(), image.height());

    // Same for pass-through frames.
    let mut empty = DetectorRegistry::with_backends(
        ScriptedBackend::empty("vessel"),
        ScriptedBackend::empty("content"),
    );
    let rendered = annotator
        .render_frame(&image, &mut empty, &mut debounce)
        .unwrap();
    assert_eq!(rendered.image.dimensions(), (128, 48));
}

#[test]
fn default_annotator_labels_the_vessel() {
    let background = Rgb([30, 30, 30]);
    let image = RgbImage::from_pixel(200, 200, background);
    let mut detectors = DetectorRegistry::with_backends(
        ScriptedBackend::fixed("vessel", vec![det(20, 60, 180, 190, 0.9, "vessel")]),
        ScriptedBackend::fixed("content", vec![det(10, 40, 150, 120, 0.8, "Homo")]),
    );
    let mut annotator = FrameAnnotator::new(PipelineConfig::default());
    let mut debounce = DebounceState::new(DebounceSettings::default());

    let rendered = annotator
        .render_frame(&image, &mut detectors, &mut debounce)
        .unwrap();
    // Font scale 0.6 puts the vessel label in rows 37..60.
    let label_rows: Vec<u32> = (0..60)
        .filter(|&y| (0..200).any(|x| *rendered.image.get_pixel(x, y) != background))
        .collect();
    assert!(!label_rows.is_empty());
    assert!(label_rows.iter().all(|&y| y >= 37), "{label_rows:?}");
}

#[test]
fn missing_stage_is_a_configuration_error() {
    let mut detectors = DetectorRegistry::new();
    detectors.register(
        foresight::DetectionStage::Vessel,
        ScriptedBackend::fixed("vessel", vec![det(0, 0, 10, 10, 0.9, "vessel")]),
    );
    let err = detectors.ensure_ready().unwrap_err();
    assert!(err.to_string().contains("content"), "{err}");
}
