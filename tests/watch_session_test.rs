//! Continuous-mode session over a directory frame source, with stats
//! persistence.

use fruitscan::frame::Frame;
use fruitscan::pipeline::{FramePipeline, PipelineConfig};
use fruitscan::stats::StatsStore;
use fruitscan::verdict::Label;
use fruitscan::watch::{DirectoryFrameSource, FrameSource, WatchConfig, WatchSession};
use image::{Rgb, RgbImage};
use std::time::Duration;

fn write_fruit_frame(path: &std::path::Path) {
    let mut img = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
    for y in 50..150 {
        for x in 50..150 {
            img.put_pixel(x, y, Rgb([200, 30, 30]));
        }
    }
    img.save(path).unwrap();
}

#[test]
fn directory_source_replays_frames_in_order() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..3 {
        write_fruit_frame(&dir.path().join(format!("frame_{i:03}.png")));
    }

    let mut source = DirectoryFrameSource::open(dir.path(), false).unwrap();
    assert_eq!(source.len(), 3);

    let mut count = 0;
    while let Some(frame) = source.next_frame().unwrap() {
        assert_eq!(frame.width(), 200);
        count += 1;
    }
    assert_eq!(count, 3);
}

#[test]
fn directory_source_rejects_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(DirectoryFrameSource::open(dir.path(), false).is_err());
}

#[test]
fn looped_source_is_bounded_by_max_frames() {
    let dir = tempfile::tempdir().unwrap();
    write_fruit_frame(&dir.path().join("frame.png"));
    let source = DirectoryFrameSource::open(dir.path(), true).unwrap();

    let pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let session = WatchSession::spawn(
        pipeline,
        StatsStore::in_memory(),
        source,
        WatchConfig {
            frame_interval: Duration::from_millis(1),
            max_frames: Some(7),
        },
    );
    let report = session.join().unwrap();
    assert_eq!(report.frames_processed, 7);
}

#[test]
fn session_persists_stats_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let frames_dir = dir.path().join("frames");
    std::fs::create_dir(&frames_dir).unwrap();
    for i in 0..4 {
        write_fruit_frame(&frames_dir.join(format!("frame_{i}.png")));
    }
    let stats_path = dir.path().join("detection_stats.json");

    let source = DirectoryFrameSource::open(&frames_dir, false).unwrap();
    let pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let stats = StatsStore::open(&stats_path);

    let session = WatchSession::spawn(
        pipeline,
        stats,
        source,
        WatchConfig {
            frame_interval: Duration::from_millis(1),
            max_frames: None,
        },
    );
    let report = session.join().unwrap();
    assert_eq!(report.frames_processed, 4);
    // Identical fruit frames: a single label-change event is recorded.
    assert_eq!(report.detections_recorded, 1);

    let reloaded = StatsStore::open(&stats_path);
    assert_eq!(reloaded.stats().summary.total_detections, 1);
    assert_eq!(reloaded.stats().summary.total_fruits, 1);
    assert_eq!(
        reloaded.stats().detection_history.front().unwrap().fruit_type,
        "apple"
    );
}

#[test]
fn snapshot_readers_see_latest_result() {
    struct EndlessFruit;
    impl FrameSource for EndlessFruit {
        fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
            let mut img = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
            for y in 50..150 {
                for x in 50..150 {
                    img.put_pixel(x, y, Rgb([200, 30, 30]));
                }
            }
            Ok(Some(Frame::new(img)?))
        }
    }

    let pipeline = FramePipeline::new(PipelineConfig::default(), None);
    let session = WatchSession::spawn(
        pipeline,
        StatsStore::in_memory(),
        EndlessFruit,
        WatchConfig {
            frame_interval: Duration::from_millis(2),
            max_frames: None,
        },
    );

    // Wait for at least one cycle to land, then snapshot.
    let mut snapshot = session.snapshot();
    for _ in 0..100 {
        if snapshot.result.is_some() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
        snapshot = session.snapshot();
    }
    let result = snapshot.result.expect("a result after the first cycle");
    assert_eq!(result.label, Label::Fresh);
    assert!(snapshot.frame.is_some());

    let report = session.stop().unwrap();
    assert!(report.frames_processed > 0);
}
