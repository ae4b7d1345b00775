//! Digital Signal Processing utilities

/// Pad with trailing zeros or cut the tail so the result has exactly `target_len` samples.
///
/// Only the end of the signal is touched: padding is appended, truncation keeps
/// the leading samples. No fade is applied.
pub fn pad_or_trim(signal: &[f32], target_len: usize) -> Vec<f32> {
    let keep = signal.len().min(target_len);
    let mut output = Vec::with_capacity(target_len);
    output.extend_from_slice(&signal[..keep]);
    output.resize(target_len, 0.0);
    output
}

/// Downmix interleaved samples to mono by averaging channels
pub fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Compute RMS energy
pub fn compute_rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|x| x * x).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Compute peak amplitude
pub fn compute_peak(signal: &[f32]) -> f32 {
    signal.iter().map(|x| x.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_short_signal() {
        let out = pad_or_trim(&[1.0, 2.0, 3.0], 6);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_trim_long_signal() {
        let out = pad_or_trim(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn test_exact_length_unchanged() {
        let signal = vec![0.5, -0.5, 0.25];
        assert_eq!(pad_or_trim(&signal, 3), signal);
    }

    #[test]
    fn test_empty_signal() {
        assert_eq!(pad_or_trim(&[], 4), vec![0.0; 4]);
    }

    #[test]
    fn test_to_mono_stereo() {
        let interleaved = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(to_mono(&interleaved, 2), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_rms_and_peak() {
        let signal = [1.0, -1.0, 1.0, -1.0];
        assert!((compute_rms(&signal) - 1.0).abs() < 1e-6);
        assert_eq!(compute_peak(&[0.2, -0.7, 0.5]), 0.7);
        assert_eq!(compute_rms(&[]), 0.0);
    }
}
