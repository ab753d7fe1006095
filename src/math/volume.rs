//! Square feature maps and the convolution arithmetic over them.
//!
//! A [`Map`] is indexed `[y][x]`, a [`Volume`] `[channel][y][x]`. Maps are
//! always square; their side length is called the map size.

use crate::error::{Error, Result};

pub type Map = Vec<Vec<f64>>;
pub type Volume = Vec<Map>;

pub fn zeros_map(size: usize) -> Map {
    vec![vec![0.0; size]; size]
}

pub fn zeros_volume(channels: usize, size: usize) -> Volume {
    vec![zeros_map(size); channels]
}

/// Output side length of a kernel of size `filter` slid over a map of size
/// `input` padded by `padding` on every edge, moving `stride` cells a step:
/// `(W - F + 2P) / S + 1`. Anything but an exact integer is rejected.
pub fn output_map_size(input: usize, filter: usize, padding: usize, stride: usize) -> Result<usize> {
    if filter == 0 || stride == 0 {
        return Err(Error::config(format!(
            "filter size and stride must be positive (filter {filter}, stride {stride})"
        )));
    }
    let span = padding
        .checked_mul(2)
        .and_then(|p| p.checked_add(input))
        .ok_or_else(|| Error::config(format!("zero padding {padding} overflows the padded map size")))?;
    if filter > span {
        return Err(Error::config(format!(
            "filter size {filter} exceeds padded input size {span}"
        )));
    }
    if (span - filter) % stride != 0 {
        return Err(Error::config(format!(
            "output map size ({input} - {filter} + 2*{padding}) / {stride} + 1 is not an integer"
        )));
    }
    Ok((span - filter) / stride + 1)
}

pub fn add_zero_padding(map: &Map, padding: usize) -> Map {
    if padding == 0 {
        return map.clone();
    }
    let size = map.len() + 2 * padding;
    let mut padded = zeros_map(size);
    for (y, row) in map.iter().enumerate() {
        padded[y + padding][padding..padding + row.len()].copy_from_slice(row);
    }
    padded
}

pub fn remove_zero_padding(map: &Map, padding: usize) -> Map {
    if padding == 0 {
        return map.clone();
    }
    let size = map.len().saturating_sub(2 * padding);
    map[padding..padding + size]
        .iter()
        .map(|row| row[padding..padding + size].to_vec())
        .collect()
}

/// Reshapes a flat, channel-major array into `channels` maps of `size`².
/// Missing trailing values are read as zero.
pub fn array_to_volume(values: &[f64], channels: usize, size: usize) -> Volume {
    let mut volume = zeros_volume(channels, size);
    for (c, map) in volume.iter_mut().enumerate() {
        for (y, row) in map.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = values.get(c * size * size + y * size + x).copied().unwrap_or(0.0);
            }
        }
    }
    volume
}

pub fn flatten(volume: &Volume) -> Vec<f64> {
    volume.iter().flatten().flatten().copied().collect()
}

/// Forward convolution of one filter over every input channel.
///
/// This is cross-correlation: the kernel is not flipped.
/// `sum[oy][ox] = bias + Σ_c Σ_ky,kx padded[c][oy*S + ky][ox*S + kx] * weights[c][ky][kx]`
pub fn convolve(
    input: &Volume,
    weights: &Volume,
    bias: f64,
    padding: usize,
    stride: usize,
    out_size: usize,
) -> Map {
    let padded: Vec<Map> = input.iter().map(|map| add_zero_padding(map, padding)).collect();
    let mut out = vec![vec![bias; out_size]; out_size];

    for (channel, kernel) in padded.iter().zip(weights.iter()) {
        for (oy, out_row) in out.iter_mut().enumerate() {
            for (ox, cell) in out_row.iter_mut().enumerate() {
                for (ky, kernel_row) in kernel.iter().enumerate() {
                    let in_row = &channel[oy * stride + ky];
                    for (kx, w) in kernel_row.iter().enumerate() {
                        *cell += in_row[ox * stride + kx] * w;
                    }
                }
            }
        }
    }
    out
}

/// Error back-projection through a convolution onto one input channel.
///
/// Each `(kernel, error_map)` pair is one filter's kernel slice for this
/// channel together with that filter's error map. Every error cell is
/// scattered back over the window that produced it, into a zero map of the
/// padded extent; the padding is then stripped off again.
pub fn transposed_convolve<'a, I>(
    pairs: I,
    stride: usize,
    padding: usize,
    input_size: usize,
) -> Map
where
    I: IntoIterator<Item = (&'a Map, &'a Map)>,
{
    let mut acc = zeros_map(input_size + 2 * padding);

    for (kernel, error_map) in pairs {
        for (oy, error_row) in error_map.iter().enumerate() {
            for (ox, &error) in error_row.iter().enumerate() {
                for (ky, kernel_row) in kernel.iter().enumerate() {
                    let acc_row = &mut acc[oy * stride + ky];
                    for (kx, w) in kernel_row.iter().enumerate() {
                        acc_row[ox * stride + kx] += w * error;
                    }
                }
            }
        }
    }
    remove_zero_padding(&acc, padding)
}

/// Accumulates one filter's weight gradient from its error map.
///
/// `regularization` is `(l1 + l2) / mini_batch_size`; each contribution is
/// scaled by `1 + regularization * weight` before it is added.
pub fn accumulate_conv_weight_gradients(
    delta_weights: &mut Volume,
    input: &Volume,
    error_map: &Map,
    weights: &Volume,
    stride: usize,
    padding: usize,
    regularization: f64,
) {
    for (c, channel) in input.iter().enumerate() {
        let padded = add_zero_padding(channel, padding);
        let delta = &mut delta_weights[c];
        let kernel = &weights[c];

        for (oy, error_row) in error_map.iter().enumerate() {
            for (ox, &error) in error_row.iter().enumerate() {
                for (ky, delta_row) in delta.iter_mut().enumerate() {
                    let in_row = &padded[oy * stride + ky];
                    for (kx, d) in delta_row.iter_mut().enumerate() {
                        let scale = 1.0 + regularization * kernel[ky][kx];
                        *d += in_row[ox * stride + kx] * scale * error;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(rows: &[&[f64]]) -> Map {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn output_size_formula() {
        assert_eq!(output_map_size(5, 3, 1, 2).unwrap(), 3);
        assert_eq!(output_map_size(28, 5, 2, 1).unwrap(), 28);
        assert_eq!(output_map_size(4, 2, 0, 2).unwrap(), 2);
    }

    #[test]
    fn non_integer_output_size_is_rejected() {
        assert!(matches!(output_map_size(6, 3, 0, 2), Err(Error::Configuration(_))));
        assert!(matches!(output_map_size(2, 5, 0, 1), Err(Error::Configuration(_))));
        assert!(matches!(output_map_size(4, 2, 0, 0), Err(Error::Configuration(_))));
    }

    #[test]
    fn oversized_padding_is_rejected() {
        assert!(matches!(output_map_size(4, 3, usize::MAX, 1), Err(Error::Configuration(_))));
        assert!(matches!(output_map_size(usize::MAX, 3, usize::MAX / 2, 1), Err(Error::Configuration(_))));
    }

    #[test]
    fn padding_round_trips() {
        let m = map(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let padded = add_zero_padding(&m, 2);
        assert_eq!(padded.len(), 6);
        assert_eq!(padded[0], vec![0.0; 6]);
        assert_eq!(padded[2], vec![0.0, 0.0, 1.0, 2.0, 0.0, 0.0]);
        assert_eq!(remove_zero_padding(&padded, 2), m);
    }

    #[test]
    fn array_to_volume_is_channel_major() {
        let v = array_to_volume(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 2, 2);
        assert_eq!(v[0], map(&[&[1.0, 2.0], &[3.0, 4.0]]));
        assert_eq!(v[1], map(&[&[5.0, 6.0], &[7.0, 0.0]]));
        assert_eq!(flatten(&v), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 0.0]);
    }

    #[test]
    fn convolve_worked_example() {
        let input = vec![map(&[
            &[0.0, 0.0, 2.0, 2.0, 2.0],
            &[1.0, 1.0, 0.0, 2.0, 0.0],
            &[1.0, 2.0, 1.0, 1.0, 2.0],
            &[0.0, 1.0, 2.0, 2.0, 1.0],
            &[1.0, 2.0, 0.0, 0.0, 1.0],
        ])];
        let kernel = vec![map(&[&[-1.0, 0.0, -1.0], &[1.0, 0.0, 1.0], &[1.0, -1.0, 0.0]])];
        let out = convolve(&input, &kernel, 1.0, 1, 2, 3);
        assert_eq!(out, map(&[&[0.0, 4.0, 5.0], &[2.0, 0.0, 1.0], &[2.0, 0.0, -1.0]]));
    }

    #[test]
    fn transposed_convolve_scatters_over_windows() {
        // One 2x2 kernel, stride 1, no padding: a 2x2 error map lands on 3x3.
        let kernel = map(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let errors = map(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let out = transposed_convolve([(&kernel, &errors)], 1, 0, 3);
        assert_eq!(out, map(&[&[1.0, 2.0, 0.0], &[3.0, 5.0, 2.0], &[0.0, 3.0, 4.0]]));
    }

    #[test]
    fn transposed_convolve_strips_padding() {
        let kernel = map(&[&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]]);
        let errors = map(&[&[1.0, 1.0], &[1.0, 1.0]]);
        let out = transposed_convolve([(&kernel, &errors)], 1, 1, 2);
        // Every input cell sits under all four windows.
        assert_eq!(out, map(&[&[4.0, 4.0], &[4.0, 4.0]]));
    }

    #[test]
    fn weight_gradients_follow_the_forward_gather() {
        let input = vec![map(&[&[1.0, 2.0], &[3.0, 4.0]])];
        let weights = vec![map(&[&[0.5]])];
        let errors = map(&[&[1.0, 0.0], &[0.0, 2.0]]);
        let mut delta = vec![map(&[&[0.0]])];
        accumulate_conv_weight_gradients(&mut delta, &input, &errors, &weights, 1, 0, 0.0);
        assert_eq!(delta[0][0][0], 1.0 * 1.0 + 4.0 * 2.0);

        let mut regularized = vec![map(&[&[0.0]])];
        accumulate_conv_weight_gradients(&mut regularized, &input, &errors, &weights, 1, 0, 0.1);
        assert!((regularized[0][0][0] - 9.0 * 1.05).abs() < 1e-12);
    }
}
