//! Mel-spectrogram features
//!
//! Power STFT, Slaney-normalized mel filterbank and decibel scaling referenced
//! to the spectrogram maximum.

use crate::Result;
use ndarray::{Array2, Array3, Axis};

use super::stft::{power_spectrogram, stft};
use super::AudioConfig;

/// Log-mel features with a trailing channel axis: (n_mels, frames, 1)
pub type FeatureTensor = Array3<f32>;

/// Floor applied to power values before taking the logarithm
const AMIN: f64 = 1e-10;

/// Mel filterbank for converting linear spectrogram to mel scale
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    /// Filterbank matrix (n_mels x n_fft/2+1)
    pub filters: Array2<f32>,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of mel bands
    pub n_mels: usize,
    /// FFT size
    pub n_fft: usize,
}

impl MelFilterbank {
    /// Create mel filterbank
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Self {
        let filters = create_mel_filterbank(sample_rate, n_fft, n_mels, fmin, fmax);
        Self {
            filters,
            sample_rate,
            n_mels,
            n_fft,
        }
    }

    /// Apply filterbank to power spectrogram
    pub fn apply(&self, spectrogram: &Array2<f32>) -> Array2<f32> {
        // spectrogram: (n_fft/2+1, time_frames)
        // filters: (n_mels, n_fft/2+1)
        // output: (n_mels, time_frames)
        self.filters.dot(spectrogram)
    }
}

/// Convert frequency to the Slaney mel scale (linear below 1 kHz, log above)
pub fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

    if hz >= MIN_LOG_HZ {
        let logstep = 6.4f64.ln() / 27.0;
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

/// Convert Slaney mel back to frequency
pub fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

    if mel >= MIN_LOG_MEL {
        let logstep = 6.4f64.ln() / 27.0;
        MIN_LOG_HZ * (logstep * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Create mel filterbank matrix with Slaney area normalization
fn create_mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;

    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mel_min = hz_to_mel(fmin as f64);
    let mel_max = hz_to_mel(fmax as f64);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let fdiff: Vec<f64> = mel_f.windows(2).map(|w| w[1] - w[0]).collect();

    let mut filters = Array2::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);
        for (k, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - mel_f[m]) / fdiff[m];
            let upper = (mel_f[m + 2] - freq) / fdiff[m + 1];
            let weight = lower.min(upper).max(0.0);
            filters[[m, k]] = (weight * enorm) as f32;
        }
    }

    filters
}

/// Convert a power spectrogram to decibels referenced to its own maximum.
///
/// The maximum maps to exactly 0 dB; values more than `top_db` below it are
/// clamped to `-top_db`.
pub fn power_to_db(power: &Array2<f32>, top_db: Option<f32>) -> Array2<f32> {
    let max_power = power.iter().cloned().fold(0.0f32, f32::max);
    let ref_db = 10.0 * (max_power as f64).max(AMIN).log10();

    let mut db = power.mapv(|p| (10.0 * (p as f64).max(AMIN).log10() - ref_db) as f32);

    if let Some(top_db) = top_db {
        let floor = -top_db.abs();
        db.mapv_inplace(|v| v.max(floor));
    }
    db
}

/// Reusable log-mel feature extractor
///
/// Holds the filterbank so repeated extractions with the same configuration
/// do not rebuild it.
#[derive(Debug, Clone)]
pub struct MelExtractor {
    config: AudioConfig,
    filterbank: MelFilterbank,
}

impl MelExtractor {
    /// Create an extractor for the given audio configuration
    pub fn new(config: &AudioConfig) -> Self {
        let filterbank = MelFilterbank::new(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            config.fmin,
            config.fmax,
        );
        Self {
            config: config.clone(),
            filterbank,
        }
    }

    /// Compute the log-mel feature tensor (n_mels, frames, 1)
    pub fn extract(&self, signal: &[f32]) -> Result<FeatureTensor> {
        let stft_matrix = stft(
            signal,
            self.config.n_fft,
            self.config.hop_length,
            self.config.win_length,
        )?;

        let power_spec = power_spectrogram(&stft_matrix);
        let mel_spec = self.filterbank.apply(&power_spec);
        let mel_db = power_to_db(&mel_spec, Some(self.config.top_db));

        Ok(mel_db.insert_axis(Axis(2)))
    }
}

/// Compute log-mel features from audio signal
///
/// # Arguments
/// * `signal` - Normalized audio samples
/// * `config` - Audio configuration
///
/// # Returns
/// Log-mel feature tensor (n_mels, time_frames, 1)
pub fn extract_features(signal: &[f32], config: &AudioConfig) -> Result<FeatureTensor> {
    MelExtractor::new(config).extract(signal)
}
