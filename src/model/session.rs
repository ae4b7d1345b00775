//! ONNX Runtime backed classifier
//!
//! Loads an exported classifier with the ort crate and exposes it through the
//! [`Classifier`] trait. ONNX Runtime is loaded dynamically: point
//! `ORT_DYLIB_PATH` at `libonnxruntime` before starting the service.
//!
//! # Example
//! ```no_run
//! use kicau::model::{Classifier, OnnxClassifier};
//!
//! let model = OnnxClassifier::load("kicau_model.onnx").unwrap();
//! println!("input shape: {:?}", model.input_shape());
//! ```

use crate::{Error, Result};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Tensor, ValueType};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::Classifier;

/// Status of ONNX Runtime availability
#[derive(Debug, Clone, PartialEq)]
pub enum OrtStatus {
    /// ORT_DYLIB_PATH points at an existing library
    Available,
    /// ORT_DYLIB_PATH is set but the file is missing
    LibraryNotFound(PathBuf),
    /// ORT_DYLIB_PATH is not set; the system library search path is used
    SystemDefault,
}

/// Check where ONNX Runtime will be loaded from
pub fn check_ort_availability() -> OrtStatus {
    match std::env::var("ORT_DYLIB_PATH") {
        Ok(path) => {
            let path = PathBuf::from(path);
            if path.exists() {
                OrtStatus::Available
            } else {
                OrtStatus::LibraryNotFound(path)
            }
        }
        Err(_) => OrtStatus::SystemDefault,
    }
}

/// Classifier running an ONNX model with NHWC float input
pub struct OnnxClassifier {
    /// Running a session needs exclusive access
    session: Mutex<Session>,
    model_path: PathBuf,
    input_name: String,
    output_name: String,
    input_shape: [Option<usize>; 4],
    num_classes: Option<usize>,
}

impl OnnxClassifier {
    /// Load ONNX model from file
    ///
    /// The first model input must be a rank-4 float tensor
    /// `[batch, height, width, channels]`; the first output holds the class
    /// scores.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        if let OrtStatus::LibraryNotFound(lib) = check_ort_availability() {
            return Err(Error::ModelLoading(format!(
                "ORT_DYLIB_PATH points to a missing library: {}",
                lib.display()
            )));
        }

        log::info!("Loading ONNX model from: {}", path.display());

        let session = Session::builder()
            .map_err(loading_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(loading_error)?
            .commit_from_file(path)
            .map_err(loading_error)?;

        let input = session
            .inputs()
            .first()
            .ok_or_else(|| Error::ModelLoading("model declares no inputs".into()))?;
        let output = session
            .outputs()
            .first()
            .ok_or_else(|| Error::ModelLoading("model declares no outputs".into()))?;

        let input_dims = tensor_dims(input.dtype())
            .ok_or_else(|| Error::ModelLoading("model input is not a tensor".into()))?;
        let input_shape: [Option<usize>; 4] = input_dims.as_slice().try_into().map_err(|_| {
            Error::ShapeMismatch {
                expected: "rank-4 NHWC input".into(),
                actual: format!("rank {}", input_dims.len()),
            }
        })?;

        let num_classes = tensor_dims(output.dtype())
            .and_then(|dims| dims.last().copied())
            .flatten();

        let input_name = input.name().to_string();
        let output_name = output.name().to_string();

        let model = Self {
            session: Mutex::new(session),
            model_path: path.to_path_buf(),
            input_name,
            output_name,
            input_shape,
            num_classes,
        };

        log::info!(
            "Model ready from {}: input '{}' {:?}, output '{}' ({} classes)",
            model.model_path().display(),
            model.input_name(),
            super::format_shape(&model.input_shape),
            model.output_name(),
            num_classes.map_or_else(|| "dynamic".to_string(), |n| n.to_string())
        );

        Ok(model)
    }

    /// Get model path
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Get input name
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Get output name
    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl Classifier for OnnxClassifier {
    fn input_shape(&self) -> [Option<usize>; 4] {
        self.input_shape
    }

    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let shape = input.shape().to_vec();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_array((shape, data))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("model session lock poisoned".into()))?;

        let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;
        let (_, scores) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;

        Ok(scores.to_vec())
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("model_path", &self.model_path)
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .field("input_shape", &self.input_shape)
            .field("num_classes", &self.num_classes)
            .finish()
    }
}

fn loading_error<E: std::fmt::Display>(err: E) -> Error {
    Error::ModelLoading(err.to_string())
}

/// Tensor dimensions with symbolic or negative sizes mapped to `None`
fn tensor_dims(value_type: &ValueType) -> Option<Vec<Option<usize>>> {
    match value_type {
        ValueType::Tensor { shape, .. } => Some(
            shape
                .iter()
                .map(|&d| if d > 0 { Some(d as usize) } else { None })
                .collect(),
        ),
        _ => None,
    }
}
