//! Short-Time Fourier Transform and its inverse

use crate::{Error, Result};
use ndarray::Array2;
use num_complex::Complex;
use realfft::RealFftPlanner;
use std::f32::consts::PI;

/// Compute periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / size as f32).cos()))
        .collect()
}

/// Compute Short-Time Fourier Transform (STFT)
///
/// Frames are centered: the signal is zero padded by `n_fft / 2` on both
/// sides, so frame `t` is centered on sample `t * hop_length`.
///
/// # Arguments
/// * `signal` - Input audio signal
/// * `n_fft` - FFT size
/// * `hop_length` - Hop length between frames
/// * `win_length` - Window length (padded to n_fft)
///
/// # Returns
/// Complex STFT matrix (n_fft/2+1, time_frames)
pub fn stft(
    signal: &[f32],
    n_fft: usize,
    hop_length: usize,
    win_length: usize,
) -> Result<Array2<Complex<f32>>> {
    if signal.is_empty() {
        return Err(Error::Preprocessing("Empty signal".into()));
    }
    if hop_length == 0 || win_length == 0 || win_length > n_fft {
        return Err(Error::Preprocessing(format!(
            "invalid STFT parameters: n_fft={}, hop={}, win={}",
            n_fft, hop_length, win_length
        )));
    }

    let window = padded_window(n_fft, win_length);

    let pad_length = n_fft / 2;
    let mut padded = vec![0.0f32; pad_length];
    padded.extend_from_slice(signal);
    padded.extend(vec![0.0f32; pad_length]);

    let num_frames = 1 + (padded.len() - n_fft) / hop_length;
    let n_freqs = n_fft / 2 + 1;

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut stft_matrix = Array2::zeros((n_freqs, num_frames));

    let mut input_buffer = vec![0.0f32; n_fft];
    let mut output_buffer = fft.make_output_vec();

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_length;
        for i in 0..n_fft {
            input_buffer[i] = padded[start + i] * window[i];
        }

        fft.process(&mut input_buffer, &mut output_buffer)
            .map_err(|e| Error::Preprocessing(format!("FFT failed: {}", e)))?;

        for (freq_idx, &val) in output_buffer.iter().enumerate() {
            stft_matrix[[freq_idx, frame_idx]] = val;
        }
    }

    Ok(stft_matrix)
}

/// Inverse STFT by weighted overlap-add
///
/// Undoes [`stft`] with the same parameters and returns exactly `length`
/// samples (the centering padding is removed).
pub fn istft(
    stft_matrix: &Array2<Complex<f32>>,
    n_fft: usize,
    hop_length: usize,
    win_length: usize,
    length: usize,
) -> Result<Vec<f32>> {
    let (n_freqs, num_frames) = stft_matrix.dim();
    if n_freqs != n_fft / 2 + 1 {
        return Err(Error::ShapeMismatch {
            expected: format!("{} frequency bins", n_fft / 2 + 1),
            actual: format!("{}", n_freqs),
        });
    }

    let window = padded_window(n_fft, win_length);

    let mut planner = RealFftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);

    let total = n_fft + hop_length * num_frames.saturating_sub(1);
    let mut output = vec![0.0f32; total];
    let mut window_sum = vec![0.0f32; total];

    let mut spectrum = ifft.make_input_vec();
    let mut frame = ifft.make_output_vec();
    let scale = 1.0 / n_fft as f32;

    for frame_idx in 0..num_frames {
        for (k, bin) in spectrum.iter_mut().enumerate() {
            *bin = stft_matrix[[k, frame_idx]];
        }
        // DC and Nyquist bins of a real signal carry no imaginary part
        spectrum[0].im = 0.0;
        if n_fft % 2 == 0 {
            spectrum[n_freqs - 1].im = 0.0;
        }

        ifft.process(&mut spectrum, &mut frame)
            .map_err(|e| Error::Preprocessing(format!("inverse FFT failed: {}", e)))?;

        let start = frame_idx * hop_length;
        for i in 0..n_fft {
            output[start + i] += frame[i] * scale * window[i];
            window_sum[start + i] += window[i] * window[i];
        }
    }

    for (sample, &norm) in output.iter_mut().zip(window_sum.iter()) {
        if norm > 1e-8 {
            *sample /= norm;
        }
    }

    let offset = n_fft / 2;
    let mut signal: Vec<f32> = output.into_iter().skip(offset).take(length).collect();
    signal.resize(length, 0.0);
    Ok(signal)
}

/// Compute magnitude spectrogram from STFT
pub fn magnitude_spectrogram(stft_matrix: &Array2<Complex<f32>>) -> Array2<f32> {
    stft_matrix.mapv(|c| c.norm())
}

/// Compute power spectrogram from STFT
pub fn power_spectrogram(stft_matrix: &Array2<Complex<f32>>) -> Array2<f32> {
    stft_matrix.mapv(|c| c.norm_sqr())
}

/// Hann window of `win_length` centered inside `n_fft` zeros
fn padded_window(n_fft: usize, win_length: usize) -> Vec<f32> {
    let mut window = vec![0.0f32; n_fft];
    let offset = (n_fft - win_length) / 2;
    window[offset..offset + win_length].copy_from_slice(&hann_window(win_length));
    window
}
