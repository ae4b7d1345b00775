//! Audio resampling using rubato

use crate::{Error, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::AudioData;

/// Input frames handed to the resampler per call
const CHUNK_SIZE: usize = 1024;

/// Resample audio to target sample rate
///
/// Uses bandlimited sinc interpolation. The resampler's group delay is
/// removed so the output lines up with the input and holds
/// `ceil(len * target_sr / sample_rate)` samples.
pub fn resample(audio: &AudioData, target_sr: u32) -> Result<AudioData> {
    if audio.sample_rate == target_sr {
        return Ok(audio.clone());
    }
    if audio.sample_rate == 0 || target_sr == 0 {
        return Err(Error::Preprocessing(format!(
            "cannot resample {} Hz to {} Hz",
            audio.sample_rate, target_sr
        )));
    }
    if audio.is_empty() {
        return Ok(AudioData::new(Vec::new(), target_sr));
    }

    let resample_ratio = target_sr as f64 / audio.sample_rate as f64;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        resample_ratio,
        1.0, // max relative ratio (no variance)
        params,
        CHUNK_SIZE,
        1, // channels
    )
    .map_err(|e| Error::Preprocessing(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let expected_len = (audio.samples.len() as f64 * resample_ratio).ceil() as usize;

    let input_frames_needed = resampler.input_frames_next();
    let mut input_buffer = vec![vec![0.0f32; input_frames_needed]];
    let mut output_samples = Vec::with_capacity(expected_len + delay + input_frames_needed);

    // Keep feeding (zero-padded past the end) until the delayed tail is flushed
    let mut pos = 0;
    while output_samples.len() < delay + expected_len {
        let available = audio
            .samples
            .len()
            .saturating_sub(pos)
            .min(input_frames_needed);

        input_buffer[0][..available].copy_from_slice(&audio.samples[pos..pos + available]);
        input_buffer[0][available..].fill(0.0);

        let output = resampler
            .process(&input_buffer, None)
            .map_err(|e| Error::Preprocessing(format!("Resampling failed: {}", e)))?;

        output_samples.extend_from_slice(&output[0]);
        pos += input_frames_needed;
    }

    output_samples.drain(..delay);
    output_samples.truncate(expected_len);

    Ok(AudioData::new(output_samples, target_sr))
}
