//! Fusing the two classifier paths and smoothing the decision over time.
//!
//! On disagreement the model's label always wins; the source tag is the only
//! thing that degrades when the model is unsure. That asymmetry is inherited
//! behavior and pinned by tests here, not an oversight to fix.

use std::collections::VecDeque;

use crate::verdict::{ClassifierVerdict, Label, Source};

#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// Disagreement blend weights.
    pub model_weight: f32,
    pub heuristic_weight: f32,
    /// Model confidence at or above this keeps source = model on
    /// disagreement; below it the source degrades to mix.
    pub model_confidence_floor: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            model_weight: 0.7,
            heuristic_weight: 0.3,
            model_confidence_floor: 0.6,
        }
    }
}

pub struct ResultFuser {
    config: FusionConfig,
}

impl ResultFuser {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Combine the optional model verdict with the always-present heuristic
    /// verdict into one label/confidence/source triple.
    pub fn fuse(
        &self,
        model: Option<ClassifierVerdict>,
        heuristic: ClassifierVerdict,
    ) -> (Label, f32, Source) {
        let Some(model) = model else {
            return (heuristic.label, heuristic.confidence, Source::Heuristic);
        };

        if model.label == heuristic.label {
            let confidence = (model.confidence + heuristic.confidence) / 2.0;
            (model.label, confidence, Source::Both)
        } else {
            let confidence = self.config.model_weight * model.confidence
                + self.config.heuristic_weight * heuristic.confidence;
            let source = if model.confidence >= self.config.model_confidence_floor {
                Source::Model
            } else {
                Source::Mix
            };
            // The model's label wins even below the confidence floor.
            (model.label, confidence, source)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingConfig {
    /// Label votes kept in the FIFO window.
    pub window: usize,
    /// EMA factor for confidence.
    pub ema_alpha: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 5,
            ema_alpha: 0.5,
        }
    }
}

/// Per-session temporal smoothing state. Created once per detection session,
/// updated every live cycle, reset when the session restarts. On-demand
/// captures bypass it entirely.
#[derive(Debug, Clone)]
pub struct SmoothingState {
    config: SmoothingConfig,
    label_window: VecDeque<Label>,
    confidence_ema: Option<f32>,
}

impl SmoothingState {
    pub fn new(config: SmoothingConfig) -> Self {
        let capacity = config.window;
        Self {
            config,
            label_window: VecDeque::with_capacity(capacity),
            confidence_ema: None,
        }
    }

    /// Feed one fused observation; returns the majority label over the
    /// window and the EMA-smoothed confidence.
    pub fn update(&mut self, label: Label, confidence: f32) -> (Label, f32) {
        let ema = match self.confidence_ema {
            None => confidence,
            Some(prev) => {
                self.config.ema_alpha * confidence + (1.0 - self.config.ema_alpha) * prev
            }
        };
        self.confidence_ema = Some(ema);

        if self.label_window.len() == self.config.window {
            self.label_window.pop_front();
        }
        self.label_window.push_back(label);

        (self.majority(), ema)
    }

    /// Majority vote over the window. The tally iterates in insertion order
    /// and only a strictly greater count displaces the leader, so ties break
    /// toward the first-encountered label.
    fn majority(&self) -> Label {
        let mut tally: Vec<(Label, usize)> = Vec::new();
        for &label in &self.label_window {
            match tally.iter_mut().find(|(l, _)| *l == label) {
                Some((_, count)) => *count += 1,
                None => tally.push((label, 1)),
            }
        }
        let mut best = (Label::Unknown, 0usize);
        for (label, count) in tally {
            if count > best.1 {
                best = (label, count);
            }
        }
        best.0
    }

    pub fn reset(&mut self) {
        self.label_window.clear();
        self.confidence_ema = None;
    }

    pub fn window_len(&self) -> usize {
        self.label_window.len()
    }
}
