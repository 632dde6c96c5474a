//! The frame analysis pipeline: one parameterized implementation driving
//! segmentation, ROI extraction, both classifier paths, type identification
//! and result fusion.
//!
//! Both operating modes go through `process`: on-demand cycles always run
//! the model and bypass smoothing; live cycles run the model every Nth frame
//! and smooth the fused output. The pipeline object is the single owner of
//! the model session and smoothing state; continuous-mode callers hand it to
//! exactly one producer.

use anyhow::Result;
use chrono::Utc;

use crate::frame::{Frame, Mask};
use crate::fusion::{FusionConfig, ResultFuser, SmoothingConfig, SmoothingState};
use crate::heuristic::{HeuristicClassifier, HeuristicConfig, HeuristicVariant};
use crate::model::ModelClassifier;
use crate::roi::{Roi, RoiConfig, RoiExtractor};
use crate::segmentation::{RegionSegmenter, SegmenterConfig};
use crate::species::{FruitGate, GateConfig, TypeIdentifier};
use crate::verdict::{ClassifierVerdict, FusedResult, Label, Source, TypeVerdict};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub segmenter: SegmenterConfig,
    pub roi: RoiConfig,
    pub heuristic: HeuristicConfig,
    pub gate: GateConfig,
    pub fusion: FusionConfig,
    pub smoothing: SmoothingConfig,
    /// Live mode runs the model on every Nth frame only.
    pub model_every_n_frames: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            roi: RoiConfig::default(),
            heuristic: HeuristicConfig::default(),
            gate: GateConfig::default(),
            fusion: FusionConfig::default(),
            smoothing: SmoothingConfig::default(),
            model_every_n_frames: 3,
        }
    }
}

/// How a cycle was initiated. Live cycles carry the producer's frame index
/// for the model cadence and get temporal smoothing; on-demand cycles force
/// the model and return the raw fused result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    OnDemand,
    Live { frame_index: u64 },
}

/// Everything one cycle produced: the fused decision plus the intermediate
/// rasters callers may want to persist or overlay.
#[derive(Debug, Clone)]
pub struct CycleOutput {
    pub result: FusedResult,
    pub mask: Mask,
    pub roi: Option<Roi>,
}

pub struct FramePipeline {
    config: PipelineConfig,
    segmenter: RegionSegmenter,
    extractor: RoiExtractor,
    heuristic: HeuristicClassifier,
    gate: FruitGate,
    identifier: TypeIdentifier,
    fuser: ResultFuser,
    model: Option<ModelClassifier>,
    smoothing: SmoothingState,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig, model: Option<ModelClassifier>) -> Self {
        Self {
            segmenter: RegionSegmenter::new(config.segmenter.clone()),
            extractor: RoiExtractor::new(config.roi.clone()),
            heuristic: HeuristicClassifier::new(config.heuristic.clone()),
            gate: FruitGate::new(config.gate.clone()),
            identifier: TypeIdentifier::new(),
            fuser: ResultFuser::new(config.fusion.clone()),
            smoothing: SmoothingState::new(config.smoothing.clone()),
            config,
            model,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Reset per-session smoothing state, e.g. when a camera run restarts.
    pub fn reset_smoothing(&mut self) {
        self.smoothing.reset();
    }

    /// Run one full analysis cycle over a frame.
    pub fn process(&mut self, frame: &Frame, cycle: CycleKind) -> Result<CycleOutput> {
        let mask = self.segmenter.segment(frame);
        let extraction = self.extractor.extract(frame, &mask);

        let Some(extraction) = extraction else {
            // No usable region. Not an error: the terminal label carries it.
            let result = self.finish(
                Label::NotFruit,
                0.0,
                Source::None,
                None,
                TypeVerdict::unknown(),
                Vec::new(),
                cycle,
            );
            return Ok(CycleOutput {
                result,
                mask,
                roi: None,
            });
        };

        let mut diagnostics = extraction.diagnostics.clone();

        // The rich heuristic trusts its spoilage score only behind the
        // fruit gate; the basic variant has no gate (inherited behavior).
        if self.config.heuristic.variant == HeuristicVariant::Rich {
            let decision = self.gate.evaluate(frame, &mask);
            if !decision.accepted {
                diagnostics.push(format!("not a fruit: {}", decision.reason));
                let result = self.finish(
                    Label::NotFruit,
                    0.0,
                    Source::Heuristic,
                    Some(extraction.bbox),
                    TypeVerdict::unknown(),
                    diagnostics,
                    cycle,
                );
                return Ok(CycleOutput {
                    result,
                    mask,
                    roi: Some(extraction.roi),
                });
            }
        }

        // Cheap paths run every cycle.
        let heuristic_verdict = self.heuristic.classify(&extraction.roi);
        let type_verdict = self.identifier.identify(frame, &mask);

        // The expensive path runs on-demand, or every Nth live frame.
        let model_verdict = if self.should_run_model(cycle) {
            self.model
                .as_mut()
                .and_then(|model| model.classify(&extraction.roi))
        } else {
            None
        };

        let (label, confidence, source) = self.fuser.fuse(model_verdict, heuristic_verdict);
        let result = self.finish(
            label,
            confidence,
            source,
            Some(extraction.bbox),
            type_verdict,
            diagnostics,
            cycle,
        );

        Ok(CycleOutput {
            result,
            mask,
            roi: Some(extraction.roi),
        })
    }

    fn should_run_model(&self, cycle: CycleKind) -> bool {
        if self.model.is_none() {
            return false;
        }
        match cycle {
            CycleKind::OnDemand => true,
            CycleKind::Live { frame_index } => {
                frame_index % self.config.model_every_n_frames.max(1) == 0
            }
        }
    }

    /// Apply live-mode smoothing and assemble the immutable result.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &mut self,
        label: Label,
        confidence: f32,
        source: Source,
        bbox: Option<crate::roi::BoundingBox>,
        type_verdict: TypeVerdict,
        diagnostics: Vec<String>,
        cycle: CycleKind,
    ) -> FusedResult {
        let (label, confidence) = match cycle {
            CycleKind::Live { .. } => self.smoothing.update(label, confidence),
            CycleKind::OnDemand => (label, confidence),
        };

        FusedResult {
            label,
            confidence,
            source,
            bbox,
            species: type_verdict.species,
            species_confidence: type_verdict.confidence,
            diagnostics,
            timestamp: Utc::now(),
        }
    }

    /// Direct access for callers that need a raw classifier verdict outside
    /// a full cycle (diagnostics tooling).
    pub fn classify_roi(&self, roi: &Roi) -> ClassifierVerdict {
        self.heuristic.classify(roi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn red_square_frame() -> Frame {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
        for y in 50..150 {
            for x in 50..150 {
                img.put_pixel(x, y, Rgb([200, 30, 30]));
            }
        }
        Frame::new(img).unwrap()
    }

    #[test]
    fn empty_frame_is_not_fruit_with_no_bbox() {
        let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
        let frame = Frame::new(RgbImage::new(128, 128)).unwrap();
        let output = pipeline.process(&frame, CycleKind::OnDemand).unwrap();
        assert_eq!(output.result.label, Label::NotFruit);
        assert_eq!(output.result.confidence, 0.0);
        assert_eq!(output.result.source, Source::None);
        assert!(output.result.bbox.is_none());
        assert!(output.roi.is_none());
    }

    #[test]
    fn modelless_on_demand_uses_heuristic_source() {
        let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
        let output = pipeline
            .process(&red_square_frame(), CycleKind::OnDemand)
            .unwrap();
        assert_eq!(output.result.source, Source::Heuristic);
        assert!(output.result.bbox.is_some());
        assert!(output.roi.is_some());
        // Bright background, sharp saturated square: fresh.
        assert_eq!(output.result.label, Label::Fresh);
        assert_eq!(output.result.species, crate::verdict::Species::Apple);
    }

    #[test]
    fn on_demand_bypasses_smoothing() {
        let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
        // Prime the smoothing window with live not-fruit cycles.
        let empty = Frame::new(RgbImage::new(64, 64)).unwrap();
        for i in 1..=5 {
            pipeline
                .process(&empty, CycleKind::Live { frame_index: i })
                .unwrap();
        }
        // An on-demand capture of a fruit must not be outvoted by them.
        let output = pipeline
            .process(&red_square_frame(), CycleKind::OnDemand)
            .unwrap();
        assert_eq!(output.result.label, Label::Fresh);
    }

    #[test]
    fn live_mode_majority_vote_stabilizes_labels() {
        let mut pipeline = FramePipeline::new(PipelineConfig::default(), None);
        let fruit = red_square_frame();
        let empty = Frame::new(RgbImage::new(64, 64)).unwrap();

        for i in 1..=4 {
            pipeline.process(&fruit, CycleKind::Live { frame_index: i }).unwrap();
        }
        // One noisy empty frame: the window still votes fresh.
        let output = pipeline
            .process(&empty, CycleKind::Live { frame_index: 5 })
            .unwrap();
        assert_eq!(output.result.label, Label::Fresh);
    }

    #[test]
    fn rich_variant_gates_non_fruit_objects() {
        let config = PipelineConfig {
            heuristic: HeuristicConfig {
                variant: HeuristicVariant::Rich,
                ..HeuristicConfig::default()
            },
            ..PipelineConfig::default()
        };
        let mut pipeline = FramePipeline::new(config, None);

        // Elongated green smear: segments fine, fails the shape gate.
        let mut img = RgbImage::from_pixel(300, 300, Rgb([250, 250, 250]));
        for y in 140..160 {
            for x in 10..290 {
                img.put_pixel(x, y, Rgb([40, 200, 40]));
            }
        }
        let frame = Frame::new(img).unwrap();
        let output = pipeline.process(&frame, CycleKind::OnDemand).unwrap();
        assert_eq!(output.result.label, Label::NotFruit);
        assert!(output
            .result
            .diagnostics
            .iter()
            .any(|d| d.contains("not a fruit")));
        // The rejected object still reports where it was seen.
        assert!(output.result.bbox.is_some());
    }

    #[test]
    fn default_model_cadence_is_every_third_frame() {
        let pipeline = FramePipeline::new(PipelineConfig::default(), None);
        assert_eq!(pipeline.config().model_every_n_frames, 3);
        assert!(!pipeline.has_model());
    }
}
