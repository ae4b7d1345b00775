//! Inference pipeline orchestration
//!
//! Coordinates decoding, waveform normalization, feature extraction and
//! classification as one unit of work that can be handed to a [`WorkerPool`].

mod worker;

pub use worker::WorkerPool;

use crate::{
    audio::{self, AudioConfig, AudioData, DenoiseConfig, FeatureTensor, MelExtractor},
    config::Config,
    model::{self, Classifier},
    Error, Result,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pipeline stage enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Decoding,
    Normalization,
    FeatureExtraction,
    Classification,
}

impl PipelineStage {
    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Decoding => "Decoding",
            PipelineStage::Normalization => "Normalization",
            PipelineStage::FeatureExtraction => "Feature Extraction",
            PipelineStage::Classification => "Classification",
        }
    }

    /// Get all stages in order
    pub fn all() -> Vec<PipelineStage> {
        vec![
            PipelineStage::Decoding,
            PipelineStage::Normalization,
            PipelineStage::FeatureExtraction,
            PipelineStage::Classification,
        ]
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Run `f` and log how long `stage` took
fn timed<T>(stage: PipelineStage, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let result = f();
    log::debug!("{} took {:.1?}", stage, start.elapsed());
    result
}

/// Result of classifying one recording
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Predicted eBird code
    pub label: String,
    /// Score of the predicted class, in [0, 1]
    pub confidence: f32,
    /// Wall time spent inside the pipeline
    pub elapsed: Duration,
}

/// End-to-end recording classifier
///
/// Cheap to share behind an [`Arc`]: the model handle is set once at
/// construction and only read afterwards.
pub struct InferencePipeline {
    audio: AudioConfig,
    denoise: DenoiseConfig,
    extractor: MelExtractor,
    class_names: Vec<String>,
    model: Option<Arc<dyn Classifier>>,
}

impl InferencePipeline {
    /// Build a pipeline from configuration and an optional loaded model
    pub fn new(config: &Config, model: Option<Arc<dyn Classifier>>) -> Self {
        Self {
            audio: config.audio.clone(),
            denoise: config.denoise.clone(),
            extractor: MelExtractor::new(&config.audio),
            class_names: config.model.class_names.clone(),
            model,
        }
    }

    /// Whether a classifier is available
    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Declared model input shape, if a model is loaded
    pub fn model_input_shape(&self) -> Option<[Option<usize>; 4]> {
        self.model.as_ref().map(|m| m.input_shape())
    }

    /// Labels in model output order
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Audio settings used for preprocessing
    pub fn audio_config(&self) -> &AudioConfig {
        &self.audio
    }

    /// Decode an upload and turn it into a feature tensor
    pub fn preprocess(&self, bytes: &[u8], extension: &str) -> Result<FeatureTensor> {
        let decoded = timed(PipelineStage::Decoding, || audio::decode(bytes, extension))?;
        log::debug!(
            "Decoded {} samples at {} Hz ({:.2} s, peak {:.3}, rms {:.4})",
            decoded.len(),
            decoded.sample_rate,
            decoded.duration(),
            audio::compute_peak(&decoded.samples),
            audio::compute_rms(&decoded.samples)
        );
        self.features_from(&decoded)
    }

    /// Normalize decoded audio and extract features
    pub fn features_from(&self, decoded: &AudioData) -> Result<FeatureTensor> {
        let normalized = timed(PipelineStage::Normalization, || {
            audio::normalize_waveform(decoded, &self.audio, &self.denoise)
        })?;

        timed(PipelineStage::FeatureExtraction, || {
            self.extractor.extract(&normalized.samples)
        })
    }

    /// Classify an already extracted feature tensor
    pub fn classify(&self, features: &FeatureTensor) -> Result<model::Prediction> {
        let model = self.model.as_deref().ok_or(Error::ModelUnavailable)?;
        timed(PipelineStage::Classification, || {
            model::predict(features, model, &self.class_names)
        })
    }

    /// Run the whole pipeline synchronously on the calling thread
    pub fn run(&self, bytes: &[u8], extension: &str) -> Result<PredictionResult> {
        let start = Instant::now();

        // Fail before any preprocessing work when nothing can classify
        if self.model.is_none() {
            return Err(Error::ModelUnavailable);
        }

        let features = self.preprocess(bytes, extension)?;
        log::info!("Processed features with shape {:?}", features.shape());

        let prediction = self.classify(&features)?;
        let elapsed = start.elapsed();

        log::info!(
            "Predicted {} ({:.3}) in {:.1?}",
            prediction.label,
            prediction.confidence,
            elapsed
        );

        Ok(PredictionResult {
            label: prediction.label,
            confidence: prediction.confidence,
            elapsed,
        })
    }

    /// Classify an already decoded recording
    pub fn run_decoded(&self, decoded: &AudioData) -> Result<PredictionResult> {
        let start = Instant::now();
        if self.model.is_none() {
            return Err(Error::ModelUnavailable);
        }

        let features = self.features_from(decoded)?;
        let prediction = self.classify(&features)?;

        Ok(PredictionResult {
            label: prediction.label,
            confidence: prediction.confidence,
            elapsed: start.elapsed(),
        })
    }

    /// Queue a full pipeline run on `pool` and await the result
    pub async fn submit(
        self: &Arc<Self>,
        pool: &WorkerPool,
        bytes: Vec<u8>,
        extension: String,
    ) -> Result<PredictionResult> {
        if self.model.is_none() {
            return Err(Error::ModelUnavailable);
        }

        let pipeline = Arc::clone(self);
        pool.submit(move || pipeline.run(&bytes, &extension)).await
    }
}

impl std::fmt::Debug for InferencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferencePipeline")
            .field("audio", &self.audio)
            .field("denoise", &self.denoise)
            .field("class_names", &self.class_names)
            .field("model_loaded", &self.model.is_some())
            .finish()
    }
}
