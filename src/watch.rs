//! Continuous-mode detection session.
//!
//! A producer thread pulls frames from a `FrameSource` at a fixed cadence
//! and drives them through the pipeline. The producer is the sole writer of
//! the latest frame/result snapshot; readers clone it under the lock, never
//! alias it. Cancellation is cooperative: the stop flag is observed once per
//! cycle and the in-flight cycle finishes before the thread returns.

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::frame::Frame;
use crate::image_input::collect_images_from_sources;
use crate::pipeline::{CycleKind, FramePipeline};
use crate::stats::StatsStore;
use crate::verdict::{FusedResult, Label};

/// Supplies frames to the continuous loop. `Ok(None)` ends the session.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Replays image files from a directory in sorted order, optionally looping.
pub struct DirectoryFrameSource {
    paths: Vec<std::path::PathBuf>,
    index: usize,
    looped: bool,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path, looped: bool) -> Result<Self> {
        // Strict collection: an empty frame directory is an error here.
        let paths = collect_images_from_sources(&[dir.display().to_string()], true)?;
        Ok(Self {
            paths,
            index: 0,
            looped,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.index >= self.paths.len() {
            if !self.looped {
                return Ok(None);
            }
            self.index = 0;
        }
        let path = &self.paths[self.index];
        self.index += 1;
        Ok(Some(Frame::open(path)?))
    }
}

/// Latest frame and fused result, copied out on read.
#[derive(Clone, Default)]
pub struct Snapshot {
    pub frame: Option<Frame>,
    pub result: Option<FusedResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Sleep between cycles; ~33 ms gives the nominal 30 Hz cadence.
    pub frame_interval: Duration,
    /// Stop after this many frames (None = run until the source dries up).
    pub max_frames: Option<u64>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub frames_processed: u64,
    pub detections_recorded: u64,
}

pub struct WatchSession {
    shared: Arc<Mutex<Snapshot>>,
    stop: Arc<AtomicBool>,
    force_capture: Arc<AtomicBool>,
    last_capture: Arc<Mutex<Option<FusedResult>>>,
    handle: Option<JoinHandle<WatchReport>>,
}

impl WatchSession {
    /// Start the producer thread. The session takes ownership of the
    /// pipeline and stats store; they come back only through results.
    pub fn spawn<S: FrameSource + 'static>(
        mut pipeline: FramePipeline,
        mut stats: StatsStore,
        mut source: S,
        config: WatchConfig,
    ) -> Self {
        let shared = Arc::new(Mutex::new(Snapshot::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let force_capture = Arc::new(AtomicBool::new(false));
        let last_capture: Arc<Mutex<Option<FusedResult>>> = Arc::new(Mutex::new(None));

        let thread_shared = Arc::clone(&shared);
        let thread_stop = Arc::clone(&stop);
        let thread_force = Arc::clone(&force_capture);
        let thread_capture = Arc::clone(&last_capture);

        let handle = thread::spawn(move || {
            pipeline.reset_smoothing();
            let mut report = WatchReport::default();
            let mut frame_index = 0u64;
            let mut last_recorded: Option<Label> = None;

            log::debug!("🎥 Watch loop started");
            loop {
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }

                let frame = match source.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        // A bad frame never aborts the loop.
                        log::warn!("⚠️  Frame source error, skipping cycle: {e}");
                        thread::sleep(config.frame_interval);
                        continue;
                    }
                };
                frame_index += 1;

                {
                    let mut snapshot = thread_shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    snapshot.frame = Some(frame.clone());
                }

                let forced = thread_force.swap(false, Ordering::Relaxed);
                let cycle = if forced {
                    CycleKind::OnDemand
                } else {
                    CycleKind::Live { frame_index }
                };

                match pipeline.process(&frame, cycle) {
                    Ok(output) => {
                        report.frames_processed += 1;

                        // Live mode records a stats event on every change of
                        // fruit classification, not on every frame; forced
                        // captures always record.
                        let should_record = forced
                            || (output.result.label.is_fruit()
                                && last_recorded != Some(output.result.label));
                        if should_record {
                            last_recorded = Some(output.result.label);
                            if let Err(e) = stats.record(&output.result) {
                                log::warn!("⚠️  Failed to persist stats: {e}");
                            } else {
                                report.detections_recorded += 1;
                            }
                        }

                        if forced {
                            let mut capture = thread_capture
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner);
                            *capture = Some(output.result.clone());
                        }

                        let mut snapshot = thread_shared
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner);
                        snapshot.result = Some(output.result);
                    }
                    Err(e) => {
                        log::warn!("⚠️  Cycle failed on frame {frame_index}: {e}");
                    }
                }

                if let Some(max) = config.max_frames {
                    if frame_index >= max {
                        break;
                    }
                }
                thread::sleep(config.frame_interval);
            }
            log::debug!(
                "🎥 Watch loop finished: {} frames, {} recorded",
                report.frames_processed,
                report.detections_recorded
            );
            report
        });

        Self {
            shared,
            stop,
            force_capture,
            last_capture,
            handle: Some(handle),
        }
    }

    /// Copy of the latest frame and result. Never blocks the producer beyond
    /// the clone.
    pub fn snapshot(&self) -> Snapshot {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ask the next cycle to run as a forced capture: model unconditionally,
    /// smoothing bypassed, stats recorded.
    pub fn request_capture(&self) {
        self.force_capture.store(true, Ordering::Relaxed);
    }

    /// Result of the most recent forced capture, if any completed.
    pub fn last_capture(&self) -> Option<FusedResult> {
        self.last_capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop and wait for the in-flight cycle to finish.
    pub fn stop(mut self) -> Result<WatchReport> {
        self.stop.store(true, Ordering::Relaxed);
        self.join_inner()
    }

    /// Wait for the session to end on its own (source exhaustion or
    /// max-frames limit).
    pub fn join(mut self) -> Result<WatchReport> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<WatchReport> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("watch session already joined"))?;
        handle
            .join()
            .map_err(|_| anyhow!("watch producer thread panicked"))
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use image::{Rgb, RgbImage};

    /// Yields a fixed number of synthetic fruit frames, then ends.
    struct SyntheticSource {
        remaining: u32,
    }

    impl FrameSource for SyntheticSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            let mut img = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
            for y in 50..150 {
                for x in 50..150 {
                    img.put_pixel(x, y, Rgb([200, 30, 30]));
                }
            }
            Ok(Some(Frame::new(img)?))
        }
    }

    fn fast_config() -> WatchConfig {
        WatchConfig {
            frame_interval: Duration::from_millis(1),
            max_frames: None,
        }
    }

    #[test]
    fn session_ends_when_source_dries_up() {
        let pipeline = FramePipeline::new(PipelineConfig::default(), None);
        let session = WatchSession::spawn(
            pipeline,
            StatsStore::in_memory(),
            SyntheticSource { remaining: 6 },
            fast_config(),
        );
        let report = session.join().unwrap();
        assert_eq!(report.frames_processed, 6);
        // One fruit label change across identical frames: one record.
        assert_eq!(report.detections_recorded, 1);
    }

    #[test]
    fn snapshot_is_populated_during_run() {
        let pipeline = FramePipeline::new(PipelineConfig::default(), None);
        let session = WatchSession::spawn(
            pipeline,
            StatsStore::in_memory(),
            SyntheticSource { remaining: 4 },
            fast_config(),
        );
        let report = session.join().unwrap();
        assert_eq!(report.frames_processed, 4);
    }

    #[test]
    fn stop_is_cooperative() {
        let pipeline = FramePipeline::new(PipelineConfig::default(), None);
        let session = WatchSession::spawn(
            pipeline,
            StatsStore::in_memory(),
            SyntheticSource { remaining: u32::MAX },
            WatchConfig {
                frame_interval: Duration::from_millis(5),
                max_frames: None,
            },
        );
        // Give the loop a moment to produce something, then stop it.
        thread::sleep(Duration::from_millis(50));
        let snapshot = session.snapshot();
        assert!(snapshot.frame.is_some());
        let report = session.stop().unwrap();
        assert!(report.frames_processed > 0);
    }

    #[test]
    fn max_frames_bounds_the_run() {
        let pipeline = FramePipeline::new(PipelineConfig::default(), None);
        let session = WatchSession::spawn(
            pipeline,
            StatsStore::in_memory(),
            SyntheticSource { remaining: u32::MAX },
            WatchConfig {
                frame_interval: Duration::from_millis(1),
                max_frames: Some(3),
            },
        );
        let report = session.join().unwrap();
        assert_eq!(report.frames_processed, 3);
    }

    #[test]
    fn forced_capture_records_and_surfaces_result() {
        let pipeline = FramePipeline::new(PipelineConfig::default(), None);
        let session = WatchSession::spawn(
            pipeline,
            StatsStore::in_memory(),
            SyntheticSource { remaining: u32::MAX },
            WatchConfig {
                frame_interval: Duration::from_millis(5),
                max_frames: None,
            },
        );
        session.request_capture();
        thread::sleep(Duration::from_millis(60));
        let capture = session.last_capture();
        let _ = session.stop().unwrap();
        assert!(capture.is_some());
        assert_eq!(capture.unwrap().label, Label::Fresh);
    }
}
