//! Adapter around the external ONNX inference engine.
//!
//! Owns preprocessing (224x224 resize, [0,1] scaling, per-channel
//! normalization, NCHW layout) and output interpretation (softmax for
//! multi-class heads, sigmoid for scalar heads). Inference failures degrade
//! to "no verdict": the pipeline falls back to the heuristic path instead of
//! failing the frame.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use ndarray::Array;
use ort::{
    execution_providers::CPUExecutionProvider, session::Session, value::Value,
};
use std::path::Path;

use crate::roi::Roi;
use crate::verdict::{ClassifierVerdict, Label};

/// Model input side, fixed by the export pipeline.
pub const MODEL_INPUT_SIZE: u32 = 224;

/// Per-channel normalization applied during training (ImageNet statistics).
pub const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct ModelClassifier {
    session: Session,
    input_name: String,
    output_name: String,
}

impl ModelClassifier {
    /// Load an ONNX model from disk. CPU execution provider only; device
    /// selection belongs to the surrounding application.
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| anyhow!("Failed to create session builder: {e}"))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| anyhow!("Failed to set execution providers: {e}"))?
            .commit_from_file(model_path)
            .map_err(|e| anyhow!("Failed to load model from {}: {e}", model_path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow!("model has no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| anyhow!("model has no outputs"))?;

        log::info!(
            "🧠 Loaded classification model: {} (input '{}', output '{}')",
            model_path.display(),
            input_name,
            output_name
        );

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }

    /// Classify a ROI, or `None` when inference fails. Errors are logged and
    /// swallowed here so a flaky engine degrades the pipeline to
    /// heuristic-only instead of killing the frame loop.
    pub fn classify(&mut self, roi: &Roi) -> Option<ClassifierVerdict> {
        match self.run_inference(roi) {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                log::warn!("⚠️  Model inference failed: {e}");
                None
            }
        }
    }

    fn run_inference(&mut self, roi: &Roi) -> Result<ClassifierVerdict> {
        let input_tensor = preprocess_roi(roi)?;
        let input_value = Value::from_array(input_tensor)
            .map_err(|e| anyhow!("Failed to create input value: {e}"))?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => &input_value])
            .map_err(|e| anyhow!("Failed to run inference: {e}"))?;

        let output_view = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| anyhow!("Failed to extract output array: {e}"))?;
        let shape = output_view.shape().to_vec();
        let values: Vec<f32> = output_view.iter().copied().collect();

        interpret_output(&shape, &values)
    }
}

/// Resize, scale to [0,1], normalize per channel, and lay out as NCHW with a
/// batch dimension.
pub fn preprocess_roi(roi: &Roi) -> Result<Array<f32, ndarray::IxDyn>> {
    let size = MODEL_INPUT_SIZE;
    let resized = image::imageops::resize(&roi.image, size, size, FilterType::Triangle);

    let mut input_data = Vec::with_capacity((3 * size * size) as usize);
    for c in 0..3usize {
        for y in 0..size {
            for x in 0..size {
                let value = resized.get_pixel(x, y).0[c] as f32 / 255.0;
                input_data.push((value - NORM_MEAN[c]) / NORM_STD[c]);
            }
        }
    }

    let input = Array::from_shape_vec(
        ndarray::IxDyn(&[1, 3, size as usize, size as usize]),
        input_data,
    )?;

    Ok(input)
}

/// Interpret the raw output tensor: a >=2-wide row is a class-probability
/// head (index 0 = fresh), a single scalar is a spoiled-probability logit.
pub fn interpret_output(shape: &[usize], values: &[f32]) -> Result<ClassifierVerdict> {
    if values.is_empty() {
        return Err(anyhow!("empty model output"));
    }

    if shape.len() == 2 && shape[1] >= 2 {
        let row = &values[..shape[1]];
        let probs = softmax(row);
        let (idx, prob) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, p)| (i, *p))
            .ok_or_else(|| anyhow!("empty probability row"))?;
        let label = if idx == 0 { Label::Fresh } else { Label::Spoiled };
        Ok(ClassifierVerdict::new(label, prob))
    } else {
        let prob_spoiled = sigmoid(values[0]);
        if prob_spoiled >= 0.5 {
            Ok(ClassifierVerdict::new(Label::Spoiled, prob_spoiled))
        } else {
            Ok(ClassifierVerdict::new(Label::Fresh, 1.0 - prob_spoiled))
        }
    }
}

/// Numerically stable softmax.
pub fn softmax(row: &[f32]) -> Vec<f32> {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = row.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn preprocess_produces_normalized_nchw_tensor() {
        let roi = Roi {
            image: RgbImage::from_pixel(50, 80, Rgb([255, 0, 128])),
        };
        let tensor = preprocess_roi(&roi).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);

        // Red channel: 1.0 scaled, then ImageNet-normalized.
        let expected_r = (1.0 - NORM_MEAN[0]) / NORM_STD[0];
        let expected_g = (0.0 - NORM_MEAN[1]) / NORM_STD[1];
        assert!((tensor[[0, 0, 100, 100]] - expected_r).abs() < 1e-5);
        assert!((tensor[[0, 1, 100, 100]] - expected_g).abs() < 1e-5);
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1001.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn two_class_output_maps_index_zero_to_fresh() {
        let verdict = interpret_output(&[1, 2], &[3.0, 1.0]).unwrap();
        assert_eq!(verdict.label, Label::Fresh);
        assert!(verdict.confidence > 0.5);

        let verdict = interpret_output(&[1, 2], &[1.0, 3.0]).unwrap();
        assert_eq!(verdict.label, Label::Spoiled);
    }

    #[test]
    fn scalar_output_uses_sigmoid_with_half_threshold() {
        // Positive logit: spoiled with the sigmoid probability.
        let verdict = interpret_output(&[1, 1], &[2.0]).unwrap();
        assert_eq!(verdict.label, Label::Spoiled);
        assert!((verdict.confidence - sigmoid(2.0)).abs() < 1e-6);

        // Negative logit: fresh with the complementary probability.
        let verdict = interpret_output(&[1, 1], &[-2.0]).unwrap();
        assert_eq!(verdict.label, Label::Fresh);
        assert!((verdict.confidence - (1.0 - sigmoid(-2.0))).abs() < 1e-6);
    }

    #[test]
    fn sigmoid_midpoint_is_half() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn normalization_constants_are_pinned() {
        assert_eq!(NORM_MEAN, [0.485, 0.456, 0.406]);
        assert_eq!(NORM_STD, [0.229, 0.224, 0.225]);
        assert_eq!(MODEL_INPUT_SIZE, 224);
    }
}
