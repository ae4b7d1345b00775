//! Audio processing module for kicau
//!
//! Decoding, resampling, denoising and mel-spectrogram features.

mod denoise;
mod dsp;
mod io;
pub mod mel;
mod resample;
pub mod stft;

pub use denoise::{reduce_noise, DenoiseConfig};
pub use dsp::{compute_peak, compute_rms, pad_or_trim, to_mono};
pub use io::{decode, load_audio, AudioData};
pub use mel::{extract_features, power_to_db, FeatureTensor, MelExtractor, MelFilterbank};
pub use resample::resample;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Audio processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target sample rate
    pub sample_rate: u32,
    /// Length of the normalized clip in seconds
    pub duration_seconds: f32,
    /// FFT size
    pub n_fft: usize,
    /// Hop length for STFT
    pub hop_length: usize,
    /// Window length
    pub win_length: usize,
    /// Number of mel bands
    pub n_mels: usize,
    /// Minimum frequency
    pub fmin: f32,
    /// Maximum frequency
    pub fmax: f32,
    /// Dynamic range kept below the spectrogram maximum, in dB
    pub top_db: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::SAMPLE_RATE,
            duration_seconds: crate::DURATION_SECONDS,
            n_fft: crate::N_FFT,
            hop_length: crate::HOP_LENGTH,
            win_length: crate::WIN_LENGTH,
            n_mels: crate::N_MELS,
            fmin: 0.0,
            fmax: crate::SAMPLE_RATE as f32 / 2.0,
            top_db: 80.0,
        }
    }
}

impl AudioConfig {
    /// Number of samples in a normalized clip
    pub fn target_len(&self) -> usize {
        (self.duration_seconds * self.sample_rate as f32) as usize
    }

    /// Number of STFT frames produced for a normalized clip (centered frames)
    pub fn num_frames(&self) -> usize {
        self.target_len() / self.hop_length + 1
    }
}

/// Bring a decoded waveform to the fixed rate and length the model expects.
///
/// Resampling happens before denoising so the noise floor is estimated on the
/// signal the features are computed from.
pub fn normalize_waveform(
    audio: &AudioData,
    config: &AudioConfig,
    denoise: &DenoiseConfig,
) -> Result<AudioData> {
    if audio.sample_rate == 0 {
        return Err(Error::Preprocessing("sample rate must be > 0".into()));
    }

    let resampled = resample(audio, config.sample_rate)?;
    let denoised = reduce_noise(&resampled.samples, config.sample_rate, denoise)?;
    let fixed = pad_or_trim(&denoised, config.target_len());

    Ok(AudioData::new(fixed, config.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: u32, seconds: f32) -> AudioData {
        let n = (sample_rate as f32 * seconds) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5
            })
            .collect();
        AudioData::new(samples, sample_rate)
    }

    #[test]
    fn test_default_shapes() {
        let config = AudioConfig::default();
        assert_eq!(config.target_len(), 80000);
        assert_eq!(config.num_frames(), 157);
    }

    #[test]
    fn test_normalize_fixed_length() {
        let config = AudioConfig::default();
        let denoise = DenoiseConfig::default();

        let cases = [
            (16000, 1.0),
            (16000, 5.0),
            (22050, 7.5),
            (44100, 2.0),
            (8000, 0.01),
        ];
        for (rate, seconds) in cases {
            let out = normalize_waveform(&tone(1000.0, rate, seconds), &config, &denoise).unwrap();
            assert_eq!(out.len(), config.target_len(), "{} Hz, {} s", rate, seconds);
            assert_eq!(out.sample_rate, config.sample_rate);
        }
    }

    #[test]
    fn test_normalize_zero_length() {
        let config = AudioConfig::default();
        let out =
            normalize_waveform(&AudioData::new(vec![], 44100), &config, &DenoiseConfig::default())
                .unwrap();
        assert_eq!(out.len(), config.target_len());
        assert!(out.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_normalize_pads_at_end() {
        let config = AudioConfig::default();
        let denoise = DenoiseConfig {
            enabled: false,
            ..Default::default()
        };
        let audio = tone(440.0, 16000, 1.0);
        let out = normalize_waveform(&audio, &config, &denoise).unwrap();

        assert_eq!(&out.samples[..audio.len()], &audio.samples[..]);
        assert!(out.samples[audio.len()..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_normalize_truncates_tail() {
        let config = AudioConfig::default();
        let denoise = DenoiseConfig {
            enabled: false,
            ..Default::default()
        };
        let audio = tone(440.0, 16000, 6.0);
        let out = normalize_waveform(&audio, &config, &denoise).unwrap();

        assert_eq!(&out.samples[..], &audio.samples[..config.target_len()]);
    }
}
