//! Configuration management for kicau

use crate::audio::{AudioConfig, DenoiseConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for kicau
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Waveform normalization and feature extraction
    pub audio: AudioConfig,
    /// Noise reduction
    pub denoise: DenoiseConfig,
    /// Classifier artifact and label set
    pub model: ModelConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
    /// Inference worker threads
    pub workers: usize,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the ONNX model file
    pub path: PathBuf,
    /// Labels in the order of the model's output vector
    pub class_names: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            max_upload_bytes: crate::MAX_UPLOAD_BYTES,
            workers: crate::DEFAULT_WORKERS,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("kicau_model.onnx"),
            class_names: crate::CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Create default configuration and save to file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.model.path.exists() {
            log::warn!("Model file does not exist: {}", self.model.path.display());
        }

        // Server
        if self.server.workers == 0 {
            return Err(Error::Config("workers must be > 0".into()));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be > 0".into()));
        }

        // Audio
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(Error::Config("Sample rate must be > 0".into()));
        }
        if audio.duration_seconds <= 0.0 {
            return Err(Error::Config("duration_seconds must be > 0".into()));
        }
        if audio.n_fft == 0 || audio.hop_length == 0 || audio.n_mels == 0 {
            return Err(Error::Config(
                "n_fft, hop_length and n_mels must be > 0".into(),
            ));
        }
        if audio.win_length == 0 || audio.win_length > audio.n_fft {
            return Err(Error::Config("win_length must be in (0, n_fft]".into()));
        }
        if audio.fmin < 0.0 || audio.fmin >= audio.fmax {
            return Err(Error::Config("fmin must be >= 0 and below fmax".into()));
        }
        if audio.fmax > audio.sample_rate as f32 / 2.0 {
            return Err(Error::Config(format!(
                "fmax {} exceeds Nyquist frequency {}",
                audio.fmax,
                audio.sample_rate as f32 / 2.0
            )));
        }
        if audio.top_db <= 0.0 {
            return Err(Error::Config("top_db must be > 0".into()));
        }

        // Denoise
        let denoise = &self.denoise;
        if denoise.n_fft == 0 || denoise.hop_length == 0 {
            return Err(Error::Config("denoise n_fft and hop_length must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&denoise.prop_decrease) {
            return Err(Error::Config("prop_decrease must be in [0, 1]".into()));
        }

        // Model
        if self.model.class_names.is_empty() {
            return Err(Error::Config("class_names must not be empty".into()));
        }

        Ok(())
    }
}
