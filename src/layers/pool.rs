use crate::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::Shape;
use crate::math::volume::{output_map_size, zeros_volume, Volume};

/// Max pooling. No trainable parameters; it only remembers, for every
/// output cell, where in its window the maximum came from.
#[derive(Debug, Clone)]
pub struct PoolingLayer {
    pub size: usize,
    pub stride: usize,
    pub input_shape: Shape,
    pub out_map_size: usize,
    pub activator: Option<ActivationFunction>,
    /// Pooled maxima before the optional activation.
    pub pooled: Volume,
    pub activations: Volume,
    /// Sized to the input maps.
    pub errors: Volume,
    /// `[channel][row][col] -> (window row, window col)` of the maximum.
    pub indices: Vec<Vec<Vec<(usize, usize)>>>,
}

impl PoolingLayer {
    pub fn new(
        size: usize,
        stride: usize,
        activator: Option<ActivationFunction>,
        input_shape: Shape,
    ) -> Result<PoolingLayer> {
        let out_map_size = output_map_size(input_shape.map_size, size, 0, stride)?;
        let channels = input_shape.channels;

        Ok(PoolingLayer {
            size,
            stride,
            input_shape,
            out_map_size,
            activator,
            pooled: zeros_volume(channels, out_map_size),
            activations: zeros_volume(channels, out_map_size),
            errors: zeros_volume(channels, input_shape.map_size),
            indices: vec![vec![vec![(0, 0); out_map_size]; out_map_size]; channels],
        })
    }

    pub fn output_shape(&self) -> Shape {
        Shape::volume(self.input_shape.channels, self.out_map_size)
    }

    /// Scans each window in row-major order and keeps the first cell that is
    /// strictly greater than the best so far, so ties go to the earliest.
    pub fn forward(&mut self, input: &Volume) {
        for (c, map) in input.iter().enumerate() {
            for row in 0..self.out_map_size {
                for col in 0..self.out_map_size {
                    let mut best = f64::NEG_INFINITY;
                    let mut best_index = (0, 0);

                    for wy in 0..self.size {
                        for wx in 0..self.size {
                            let value = map[row * self.stride + wy][col * self.stride + wx];
                            if value > best {
                                best = value;
                                best_index = (wy, wx);
                            }
                        }
                    }

                    let (wy, wx) = best_index;
                    let pooled = map[row * self.stride + wy][col * self.stride + wx];
                    self.indices[c][row][col] = best_index;
                    self.pooled[c][row][col] = pooled;
                    self.activations[c][row][col] = match &self.activator {
                        Some(f) => f.function(pooled),
                        None => pooled,
                    };
                }
            }
        }
    }

    /// Routes each output cell's error to the input cell that won its window.
    /// Everything else in the input-sized error map stays zero.
    pub fn backward(&mut self, output_errors: &Volume) {
        for channel in &mut self.errors {
            channel.iter_mut().flatten().for_each(|e| *e = 0.0);
        }

        for (c, errors) in output_errors.iter().enumerate() {
            for (row, error_row) in errors.iter().enumerate() {
                for (col, &error) in error_row.iter().enumerate() {
                    let error = match &self.activator {
                        Some(f) => error * f.derivative(self.pooled[c][row][col]),
                        None => error,
                    };
                    let (wy, wx) = self.indices[c][row][col];
                    self.errors[c][row * self.stride + wy][col * self.stride + wx] += error;
                }
            }
        }
    }

    pub fn input_errors(&self) -> Volume {
        self.errors.clone()
    }
}
