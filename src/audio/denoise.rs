//! Spectral-gating noise reduction
//!
//! The noise profile is estimated from the signal itself: each frequency bin's
//! magnitude is smoothed over time into a slowly moving floor, and energy that
//! does not rise far enough above that floor is gated out. No separate
//! noise-only reference clip is needed.

use crate::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::stft::{istft, magnitude_spectrogram, stft};

/// Noise reduction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Apply noise reduction at all
    pub enabled: bool,
    /// FFT size of the gating STFT
    pub n_fft: usize,
    /// Hop length of the gating STFT
    pub hop_length: usize,
    /// Time constant of the noise-floor smoother, in seconds
    pub time_constant_s: f32,
    /// How many times above the floor a bin must be to pass
    pub thresh_n_mult: f32,
    /// Steepness of the sigmoid gate
    pub sigmoid_slope: f32,
    /// Mask smoothing extent along frequency, in Hz
    pub freq_mask_smooth_hz: f32,
    /// Mask smoothing extent along time, in milliseconds
    pub time_mask_smooth_ms: f32,
    /// Fraction of the gated noise removed (1.0 = all of it)
    pub prop_decrease: f32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            n_fft: 1024,
            hop_length: 256,
            time_constant_s: 2.0,
            thresh_n_mult: 2.0,
            sigmoid_slope: 10.0,
            freq_mask_smooth_hz: 500.0,
            time_mask_smooth_ms: 50.0,
            prop_decrease: 1.0,
        }
    }
}

/// Reduce stationary and slowly varying background noise.
///
/// Returns a signal of the same length as the input.
pub fn reduce_noise(signal: &[f32], sample_rate: u32, config: &DenoiseConfig) -> Result<Vec<f32>> {
    if !config.enabled || signal.is_empty() {
        return Ok(signal.to_vec());
    }

    let n_fft = config.n_fft;
    let hop = config.hop_length;

    let spec = stft(signal, n_fft, hop, n_fft)?;
    let magnitude = magnitude_spectrogram(&spec);

    let floor = smooth_over_time(&magnitude, sample_rate, hop, config.time_constant_s);
    let mut mask = gate_mask(&magnitude, &floor, config);

    let (n_grad_freq, n_grad_time) = smoothing_extent(sample_rate, n_fft, hop, config);
    mask = smooth_mask(&mask, n_grad_freq, n_grad_time);

    let prop = config.prop_decrease.clamp(0.0, 1.0);
    mask.mapv_inplace(|m| m * prop + (1.0 - prop));

    let mut gated = spec;
    gated.zip_mut_with(&mask, |bin, &m| *bin *= m);

    log::trace!(
        "Denoised {} samples ({} frames, smoothing {}x{})",
        signal.len(),
        gated.ncols(),
        n_grad_freq,
        n_grad_time
    );

    istft(&gated, n_fft, hop, n_fft, signal.len())
}

/// Zero-phase one-pole smoothing of every bin along time
fn smooth_over_time(
    magnitude: &Array2<f32>,
    sample_rate: u32,
    hop_length: usize,
    time_constant_s: f32,
) -> Array2<f32> {
    let t_frames = time_constant_s as f64 * sample_rate as f64 / hop_length as f64;
    let b = if t_frames > 0.0 {
        (((1.0 + 4.0 * t_frames * t_frames).sqrt() - 1.0) / (2.0 * t_frames * t_frames)) as f32
    } else {
        1.0
    };

    let mut smoothed = magnitude.clone();
    for mut row in smoothed.rows_mut() {
        let n = row.len();
        if n == 0 {
            continue;
        }

        // Forward then backward pass, each started from its edge value
        let mut state = row[0];
        for i in 0..n {
            state = b * row[i] + (1.0 - b) * state;
            row[i] = state;
        }
        let mut state = row[n - 1];
        for i in (0..n).rev() {
            state = b * row[i] + (1.0 - b) * state;
            row[i] = state;
        }
    }
    smoothed
}

fn gate_mask(magnitude: &Array2<f32>, floor: &Array2<f32>, config: &DenoiseConfig) -> Array2<f32> {
    let mut mask = Array2::zeros(magnitude.raw_dim());
    ndarray::Zip::from(&mut mask)
        .and(magnitude)
        .and(floor)
        .for_each(|m, &mag, &fl| {
            let above = (mag - fl) / fl.max(f32::EPSILON);
            *m = sigmoid(above - config.thresh_n_mult, config.sigmoid_slope);
        });
    mask
}

fn sigmoid(x: f32, slope: f32) -> f32 {
    1.0 / (1.0 + (-x * slope).exp())
}

fn smoothing_extent(
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
    config: &DenoiseConfig,
) -> (usize, usize) {
    let hz_per_bin = sample_rate as f32 / (n_fft as f32 / 2.0);
    let ms_per_frame = hop_length as f32 / sample_rate as f32 * 1000.0;
    let n_grad_freq = (config.freq_mask_smooth_hz / hz_per_bin).max(0.0) as usize;
    let n_grad_time = (config.time_mask_smooth_ms / ms_per_frame).max(0.0) as usize;
    (n_grad_freq, n_grad_time)
}

/// Triangular kernel of length `2 * n + 1`, peak 1 in the middle
fn triangle(n: usize) -> Vec<f32> {
    let steps = (n + 1) as f32;
    let rising = (1..=n).map(|i| i as f32 / steps);
    let falling = (0..=n).map(|j| 1.0 - j as f32 / steps);
    rising.chain(falling).collect()
}

/// Same-size convolution of the mask with a normalized separable triangle
fn smooth_mask(mask: &Array2<f32>, n_grad_freq: usize, n_grad_time: usize) -> Array2<f32> {
    let freq_kernel = normalized(triangle(n_grad_freq));
    let time_kernel = normalized(triangle(n_grad_time));

    let along_freq = convolve_axis(mask, &freq_kernel, 0);
    convolve_axis(&along_freq, &time_kernel, 1)
}

fn normalized(kernel: Vec<f32>) -> Vec<f32> {
    let sum: f32 = kernel.iter().sum();
    kernel.into_iter().map(|k| k / sum).collect()
}

fn convolve_axis(input: &Array2<f32>, kernel: &[f32], axis: usize) -> Array2<f32> {
    let (rows, cols) = input.dim();
    let half = kernel.len() / 2;
    let mut output = Array2::zeros((rows, cols));

    for r in 0..rows {
        for c in 0..cols {
            let (pos, len) = if axis == 0 { (r, rows) } else { (c, cols) };
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                // Zero outside the mask
                let idx = pos as isize + k as isize - half as isize;
                if idx < 0 || idx as usize >= len {
                    continue;
                }
                let value = if axis == 0 {
                    input[[idx as usize, c]]
                } else {
                    input[[r, idx as usize]]
                };
                acc += w * value;
            }
            output[[r, c]] = acc;
        }
    }
    output
}
