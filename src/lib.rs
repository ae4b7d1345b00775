//! kicau - Bird song classification service in Rust
//!
//! Turns an uploaded recording into a fixed-shape log-mel spectrogram and
//! classifies it with a pretrained model exported to ONNX.
//!
//! # Pipeline
//! - Decode any MP3/WAV/M4A payload to mono samples at its native rate
//! - Resample to 16 kHz, denoise with spectral gating, pad or trim to 5 s
//! - Extract a 40-band log-mel spectrogram referenced to its maximum
//! - Resize to the model input, run the model, pick the best eBird code
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use kicau::{Config, model::OnnxClassifier, pipeline::InferencePipeline};
//!
//! let config = Config::default();
//! let model = OnnxClassifier::load(&config.model.path).unwrap();
//! let pipeline = InferencePipeline::new(&config, Some(Arc::new(model)));
//!
//! let bytes = std::fs::read("recording.mp3").unwrap();
//! let result = pipeline.run(&bytes, "mp3").unwrap();
//! println!("{} ({:.2})", result.label, result.confidence);
//! ```

// Allow traditional for loops - often clearer for audio DSP code
#![allow(clippy::needless_range_loop)]

pub mod audio;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{InferencePipeline, PredictionResult, WorkerPool};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sample rate the model was trained on
pub const SAMPLE_RATE: u32 = 16000;

/// Length of every normalized clip in seconds
pub const DURATION_SECONDS: f32 = 5.0;

/// Default number of mel filterbank channels
pub const N_MELS: usize = 40;

/// Default FFT size
pub const N_FFT: usize = 2048;

/// Default hop length for STFT
pub const HOP_LENGTH: usize = 512;

/// Default window size
pub const WIN_LENGTH: usize = 2048;

/// Largest accepted upload (50 MiB)
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Default size of the inference worker pool
pub const DEFAULT_WORKERS: usize = 4;

/// Accepted upload extensions (matched case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["mp3", "wav", "m4a"];

/// eBird codes in the order of the model's output layer
pub const CLASS_NAMES: [&str; 10] = [
    "bobfly1", "ducfly", "brratt1", "barant1", "squcuc1", "greant1", "bubwre1", "oliwoo1",
    "fepowl", "butwoo1",
];
