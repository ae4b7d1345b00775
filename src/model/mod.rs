//! Model inference module for kicau
//!
//! The classifier is an opaque function from a `(1, height, width, 1)`
//! feature batch to one score per class. [`predict`] adapts feature tensors to
//! whatever input size the model declares and maps the best score to a label.

mod resize;
mod session;

pub use resize::resize_bilinear;
pub use session::{check_ort_availability, OnnxClassifier, OrtStatus};

use crate::audio::FeatureTensor;
use crate::config::ModelConfig;
use crate::{Error, Result};
use ndarray::{Array4, Axis};
use std::sync::Arc;

/// A pretrained classifier over NHWC feature batches
pub trait Classifier: Send + Sync {
    /// Declared input dimensions `[batch, height, width, channels]`.
    ///
    /// `None` marks a dimension the model accepts at any size.
    fn input_shape(&self) -> [Option<usize>; 4];

    /// Run the forward pass, returning one score per class
    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>>;

    /// Width of the output vector, when the model declares it statically
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

/// Outcome of classifying one feature tensor
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index into the class list
    pub index: usize,
    /// Class label at `index`
    pub label: String,
    /// Score of the winning class
    pub confidence: f32,
}

/// Classify a feature tensor with `model`.
///
/// The `(height, width)` plane is resized bilinearly when it differs from the
/// model's declared input, a batch axis is added, and the highest score wins.
/// The score is reported as is (no softmax).
pub fn predict(
    features: &FeatureTensor,
    model: &dyn Classifier,
    class_names: &[String],
) -> Result<Prediction> {
    let input = prepare_input(features, model.input_shape())?;
    let scores = model.forward(input)?;

    if scores.len() != class_names.len() {
        return Err(Error::Inference(format!(
            "model produced {} scores for {} classes",
            scores.len(),
            class_names.len()
        )));
    }

    let (index, score) = argmax(&scores)
        .ok_or_else(|| Error::Inference("model produced no usable scores".into()))?;

    let confidence = score.clamp(0.0, 1.0);
    if confidence != score {
        log::warn!("Score {} outside [0, 1], clamped", score);
    }

    Ok(Prediction {
        index,
        label: class_names[index].clone(),
        confidence,
    })
}

/// Resize to the declared input plane and add the batch axis
fn prepare_input(features: &FeatureTensor, shape: [Option<usize>; 4]) -> Result<Array4<f32>> {
    let (height, width, channels) = features.dim();

    if let Some(expected) = shape[3] {
        if expected != channels {
            return Err(Error::ShapeMismatch {
                expected: format!("{} input channels", expected),
                actual: format!("{}", channels),
            });
        }
    }

    let target_h = shape[1].unwrap_or(height);
    let target_w = shape[2].unwrap_or(width);

    let resized = if (target_h, target_w) != (height, width) {
        log::debug!(
            "Resizing features {}x{} -> {}x{}",
            height,
            width,
            target_h,
            target_w
        );
        resize_bilinear(features, target_h, target_w)
    } else {
        features.clone()
    };

    Ok(resized.insert_axis(Axis(0)))
}

/// Index and value of the largest finite score; `None` if any score is not finite
fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    if scores.iter().any(|s| !s.is_finite()) {
        return None;
    }
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}

/// Load the configured classifier for serving.
///
/// A missing artifact or a model whose output width disagrees with the class
/// list is logged and yields `None`; callers keep running without a model.
pub fn load_classifier(config: &ModelConfig) -> Option<Arc<dyn Classifier>> {
    if !config.path.exists() {
        log::warn!(
            "Model file not found at {}. Predictions are disabled until it is provided.",
            config.path.display()
        );
        return None;
    }

    match OnnxClassifier::load(&config.path) {
        Ok(model) => match model.num_classes() {
            Some(n) if n != config.class_names.len() => {
                log::error!(
                    "Model outputs {} classes but {} class names are configured",
                    n,
                    config.class_names.len()
                );
                None
            }
            _ => Some(Arc::new(model)),
        },
        Err(e) => {
            log::error!("Failed to load model {}: {}", config.path.display(), e);
            None
        }
    }
}

/// Render an input shape for logs and API responses, `None` dimensions as `-1`
pub fn format_shape(shape: &[Option<usize>]) -> Vec<i64> {
    shape
        .iter()
        .map(|d| d.map(|v| v as i64).unwrap_or(-1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::sync::Mutex;

    struct FixedModel {
        shape: [Option<usize>; 4],
        scores: Vec<f32>,
        seen: Mutex<Vec<Vec<usize>>>,
    }

    impl FixedModel {
        fn new(shape: [Option<usize>; 4], scores: Vec<f32>) -> Self {
            Self {
                shape,
                scores,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Classifier for FixedModel {
        fn input_shape(&self) -> [Option<usize>; 4] {
            self.shape
        }

        fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
            self.seen.lock().unwrap().push(input.shape().to_vec());
            Ok(self.scores.clone())
        }
    }

    fn names(n: usize) -> Vec<String> {
        crate::CLASS_NAMES[..n].iter().map(|s| s.to_string()).collect()
    }

    fn features() -> FeatureTensor {
        Array3::from_elem((40, 157, 1), -20.0)
    }

    #[test]
    fn test_predict_picks_argmax() {
        let mut scores = vec![0.05; 10];
        scores[3] = 0.55;
        let model = FixedModel::new([None, Some(40), Some(157), Some(1)], scores);

        let prediction = predict(&features(), &model, &names(10)).unwrap();
        assert_eq!(prediction.index, 3);
        assert_eq!(prediction.label, "barant1");
        assert!((prediction.confidence - 0.55).abs() < 1e-6);
        assert_eq!(model.seen.lock().unwrap()[0], vec![1, 40, 157, 1]);
    }

    #[test]
    fn test_predict_resizes_to_declared_input() {
        let model = FixedModel::new([Some(1), Some(128), Some(128), Some(1)], vec![0.1; 10]);
        predict(&features(), &model, &names(10)).unwrap();
        assert_eq!(model.seen.lock().unwrap()[0], vec![1, 128, 128, 1]);
    }

    #[test]
    fn test_dynamic_dims_keep_feature_size() {
        let model = FixedModel::new([None, None, Some(200), None], vec![0.1; 10]);
        predict(&features(), &model, &names(10)).unwrap();
        assert_eq!(model.seen.lock().unwrap()[0], vec![1, 40, 200, 1]);
    }

    #[test]
    fn test_ties_resolve_to_first() {
        let model = FixedModel::new([None; 4], vec![0.5, 0.5, 0.0]);
        let prediction = predict(&features(), &model, &names(3)).unwrap();
        assert_eq!(prediction.index, 0);
    }

    #[test]
    fn test_output_width_mismatch() {
        let model = FixedModel::new([None; 4], vec![0.1; 5]);
        let result = predict(&features(), &model, &names(10));
        assert!(matches!(result, Err(Error::Inference(_))));
    }

    #[test]
    fn test_non_finite_scores_rejected() {
        let model = FixedModel::new([None; 4], vec![0.1, f32::NAN, 0.2]);
        let result = predict(&features(), &model, &names(3));
        assert!(matches!(result, Err(Error::Inference(_))));
    }

    #[test]
    fn test_confidence_clamped() {
        let model = FixedModel::new([None; 4], vec![-3.0, 7.5]);
        let prediction = predict(&features(), &model, &names(2)).unwrap();
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.confidence, 1.0);
    }

    #[test]
    fn test_channel_mismatch() {
        let model = FixedModel::new([None, None, None, Some(3)], vec![0.1; 10]);
        let result = predict(&features(), &model, &names(10));
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_missing_model_file() {
        let config = ModelConfig {
            path: std::env::temp_dir().join("kicau_missing_model.onnx"),
            ..Default::default()
        };
        assert!(load_classifier(&config).is_none());
    }

    #[test]
    fn test_format_shape() {
        assert_eq!(
            format_shape(&[None, Some(40), Some(157), Some(1)]),
            vec![-1, 40, 157, 1]
        );
    }
}
