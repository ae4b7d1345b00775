//! Bilinear resizing of feature maps

use ndarray::Array3;

/// Resize a `(height, width, channels)` map with bilinear interpolation.
///
/// Sampling uses half-pixel centers: output pixel `i` reads input coordinate
/// `(i + 0.5) * in / out - 0.5`, clamped to the valid range. When the size
/// already matches, the input is returned unchanged.
pub fn resize_bilinear(input: &Array3<f32>, height: usize, width: usize) -> Array3<f32> {
    let (in_h, in_w, channels) = input.dim();
    if (in_h, in_w) == (height, width) {
        return input.clone();
    }

    let rows = interpolation_weights(in_h, height);
    let cols = interpolation_weights(in_w, width);

    let mut output = Array3::zeros((height, width, channels));
    for (y, &(y0, y1, dy)) in rows.iter().enumerate() {
        for (x, &(x0, x1, dx)) in cols.iter().enumerate() {
            for c in 0..channels {
                let top = input[[y0, x0, c]] + (input[[y0, x1, c]] - input[[y0, x0, c]]) * dx;
                let bottom = input[[y1, x0, c]] + (input[[y1, x1, c]] - input[[y1, x0, c]]) * dx;
                output[[y, x, c]] = top + (bottom - top) * dy;
            }
        }
    }
    output
}

/// Lower index, upper index and interpolation fraction per output position
fn interpolation_weights(in_size: usize, out_size: usize) -> Vec<(usize, usize, f32)> {
    if in_size == 0 {
        return Vec::new();
    }
    let scale = in_size as f32 / out_size as f32;
    let last = in_size - 1;

    (0..out_size)
        .map(|i| {
            let src = (i as f32 + 0.5) * scale - 0.5;
            let floor = src.floor();
            let lower = (floor.max(0.0) as usize).min(last);
            let upper = (src.ceil().max(0.0) as usize).min(last);
            (lower, upper, src - floor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_size_passthrough() {
        let input = Array3::from_shape_fn((4, 6, 1), |(y, x, _)| (y * 6 + x) as f32);
        assert_eq!(resize_bilinear(&input, 4, 6), input);
    }

    #[test]
    fn test_output_shape() {
        let input = Array3::<f32>::zeros((40, 157, 1));
        let out = resize_bilinear(&input, 128, 128);
        assert_eq!(out.shape(), &[128, 128, 1]);
    }

    #[test]
    fn test_constant_stays_constant() {
        let input = Array3::from_elem((40, 157, 1), -12.5f32);
        let out = resize_bilinear(&input, 64, 300);
        assert!(out.iter().all(|&v| (v + 12.5).abs() < 1e-5));
    }

    #[test]
    fn test_upsample_half_pixel() {
        // [0, 1] stretched to 4 columns samples at -0.25, 0.25, 0.75, 1.25
        let input = Array3::from_shape_vec((1, 2, 1), vec![0.0, 1.0]).unwrap();
        let out = resize_bilinear(&input, 1, 4);
        let values: Vec<f32> = out.iter().copied().collect();
        let expected = [0.0, 0.25, 0.75, 1.0];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert!((v - e).abs() < 1e-6, "{:?}", values);
        }
    }

    #[test]
    fn test_downsample_averages_pairs() {
        let input = Array3::from_shape_vec((1, 4, 1), vec![0.0, 2.0, 4.0, 6.0]).unwrap();
        let out = resize_bilinear(&input, 1, 2);
        assert!((out[[0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((out[[0, 1, 0]] - 5.0).abs() < 1e-6);
    }
}
