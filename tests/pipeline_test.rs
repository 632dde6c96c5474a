//! End-to-end pipeline behavior over synthetic frames.

use fruitscan::frame::{mask_is_empty, Frame};
use fruitscan::pipeline::{CycleKind, FramePipeline, PipelineConfig};
use fruitscan::verdict::{Label, Source, Species};
use image::{Rgb, RgbImage};

/// Red square centered on a bright background: segments cleanly and reads
/// as a fresh apple to the basic heuristic.
fn apple_frame() -> Frame {
    let mut img = RgbImage::from_pixel(240, 240, Rgb([250, 250, 250]));
    for y in 70..170 {
        for x in 70..170 {
            img.put_pixel(x, y, Rgb([200, 30, 30]));
        }
    }
    Frame::new(img).unwrap()
}

/// Elongated yellow bar: banana-shaped.
fn banana_frame() -> Frame {
    let mut img = RgbImage::from_pixel(320, 320, Rgb([250, 250, 250]));
    for y in 140..180 {
        for x in 40..280 {
            img.put_pixel(x, y, Rgb([200, 180, 40]));
        }
    }
    Frame::new(img).unwrap()
}

#[test]
fn featureless_frame_produces_empty_mask_and_no_roi() {
    let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let frame = Frame::new(RgbImage::new(160, 160)).unwrap();
    let output = pipeline.process(&frame, CycleKind::OnDemand).unwrap();

    assert!(mask_is_empty(&output.mask));
    assert!(output.roi.is_none());
    assert_eq!(output.result.label, Label::NotFruit);
    assert_eq!(output.result.confidence, 0.0);
    assert_eq!(output.result.source, Source::None);
    assert!(output.result.bbox.is_none());
}

#[test]
fn apple_frame_classifies_fresh_with_bbox_and_species() {
    let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let output = pipeline
        .process(&apple_frame(), CycleKind::OnDemand)
        .unwrap();

    assert_eq!(output.result.label, Label::Fresh);
    assert_eq!(output.result.source, Source::Heuristic);
    assert_eq!(output.result.species, Species::Apple);
    assert!(output.result.confidence > 0.9);

    let bbox = output.result.bbox.expect("bbox present for a valid region");
    // Square plus the default 10 px padding.
    assert!(bbox.width >= 100 && bbox.width <= 125);
    assert!(bbox.height >= 100 && bbox.height <= 125);
}

#[test]
fn banana_frame_identifies_species_by_elongation() {
    let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let output = pipeline
        .process(&banana_frame(), CycleKind::OnDemand)
        .unwrap();

    assert_eq!(output.result.species, Species::Banana);
    assert!(output.result.bbox.is_some());
}

#[test]
fn dark_blotched_fruit_reads_spoiled() {
    let mut img = RgbImage::from_pixel(240, 240, Rgb([250, 250, 250]));
    for y in 70..170 {
        for x in 70..170 {
            // Lower half of the fruit is a dark rotten patch.
            if y >= 120 {
                img.put_pixel(x, y, Rgb([35, 20, 15]));
            } else {
                img.put_pixel(x, y, Rgb([200, 30, 30]));
            }
        }
    }
    let frame = Frame::new(img).unwrap();

    let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let output = pipeline.process(&frame, CycleKind::OnDemand).unwrap();
    assert_eq!(output.result.label, Label::Spoiled);
    assert!(output.result.confidence >= 0.4);
}

#[test]
fn live_cycles_smooth_over_segmentation_dropouts() {
    let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let fruit = apple_frame();
    let empty = Frame::new(RgbImage::new(160, 160)).unwrap();

    let mut frame_index = 0u64;
    let mut last = Label::Unknown;
    for _ in 0..4 {
        frame_index += 1;
        last = pipeline
            .process(&fruit, CycleKind::Live { frame_index })
            .unwrap()
            .result
            .label;
    }
    assert_eq!(last, Label::Fresh);

    // A single dropout frame is outvoted by the window.
    frame_index += 1;
    let smoothed = pipeline
        .process(&empty, CycleKind::Live { frame_index })
        .unwrap();
    assert_eq!(smoothed.result.label, Label::Fresh);

    // Sustained dropout flips the majority within the window size.
    let mut flipped = smoothed.result.label;
    for _ in 0..4 {
        frame_index += 1;
        flipped = pipeline
            .process(&empty, CycleKind::Live { frame_index })
            .unwrap()
            .result
            .label;
    }
    assert_eq!(flipped, Label::NotFruit);
}

#[test]
fn smoothing_reset_forgets_previous_session() {
    let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let empty = Frame::new(RgbImage::new(160, 160)).unwrap();
    for i in 1..=5 {
        pipeline
            .process(&empty, CycleKind::Live { frame_index: i })
            .unwrap();
    }
    pipeline.reset_smoothing();

    let output = pipeline
        .process(&apple_frame(), CycleKind::Live { frame_index: 1 })
        .unwrap();
    // Fresh window: one fresh vote wins immediately.
    assert_eq!(output.result.label, Label::Fresh);
}

#[test]
fn zero_sized_frame_is_a_hard_error_upstream() {
    // The pipeline contract places frame validation at construction time.
    assert!(Frame::new(RgbImage::new(0, 0)).is_err());
}
