use serde::{Serialize, Deserialize};
use std::f64::consts::{E, PI};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    /// Softmax is vector-valued; the fully-connected layer normalizes the
    /// whole output vector itself. Element-wise it behaves as the identity.
    Softmax,
    Tanh,
    /// `1.7159 * tanh(2x / 3)`
    LecunTanh,
    LeakyReLU { alpha: f64 },
    Elu { alpha: f64 },
    Gelu,
    Swish,
}

impl Default for ActivationFunction {
    fn default() -> Self {
        ActivationFunction::Sigmoid
    }
}

const LECUN_SCALE: f64 = 1.7159;
const LECUN_SLOPE: f64 = 2.0 / 3.0;

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LecunTanh => LECUN_SCALE * (LECUN_SLOPE * x).tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Elu { alpha } => {
                if x >= 0.0 { x } else { alpha * (E.powf(x) - 1.0) }
            }
            ActivationFunction::Gelu => {
                let c = (2.0_f64 / PI).sqrt();
                0.5 * x * (1.0 + (c * (x + 0.044715 * x.powi(3))).tanh())
            }
            ActivationFunction::Swish => x / (1.0 + E.powf(-x)),
        }
    }

    /// Element-wise derivative, evaluated at the pre-activation value.
    ///
    /// For `Softmax` the output error handed to the layer is already
    /// `target - output`, so the derivative is `1.0` and the error passes
    /// through unchanged.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            },
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LecunTanh => {
                let t = (LECUN_SLOPE * x).tanh();
                LECUN_SCALE * LECUN_SLOPE * (1.0 - t * t)
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
            ActivationFunction::Elu { alpha } => {
                if x >= 0.0 { 1.0 } else { alpha * E.powf(x) }
            }
            ActivationFunction::Gelu => {
                let c = (2.0_f64 / PI).sqrt();
                let inner = c * (x + 0.044715 * x.powi(3));
                let tanh_inner = inner.tanh();
                let sech2 = 1.0 - tanh_inner * tanh_inner;
                let d_inner = c * (1.0 + 3.0 * 0.044715 * x.powi(2));
                0.5 * tanh_inner + 0.5 * x * sech2 * d_inner + 0.5
            }
            ActivationFunction::Swish => {
                let sig = 1.0 / (1.0 + E.powf(-x));
                sig + x * sig * (1.0 - sig)
            }
        }
    }
}

/// Numerically stable softmax over a whole vector (max-shifted).
pub fn softmax(sums: &[f64]) -> Vec<f64> {
    let max = sums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = sums.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_derivative(f: &ActivationFunction, x: f64) -> f64 {
        let h = 1e-6;
        (f.function(x + h) - f.function(x - h)) / (2.0 * h)
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let functions = [
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
            ActivationFunction::LecunTanh,
            ActivationFunction::Elu { alpha: 1.0 },
            ActivationFunction::Gelu,
            ActivationFunction::Swish,
        ];
        for f in &functions {
            for &x in &[-2.0, -0.5, 0.3, 1.7] {
                let analytic = f.derivative(x);
                let numeric = numeric_derivative(f, x);
                assert!((analytic - numeric).abs() < 1e-5, "{f:?} at {x}: {analytic} vs {numeric}");
            }
        }
    }

    #[test]
    fn lecun_tanh_is_scaled_tanh() {
        let f = ActivationFunction::LecunTanh;
        assert!((f.function(1.5) - 1.7159 * 1.0_f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn leaky_relu_uses_slope_below_zero() {
        let f = ActivationFunction::LeakyReLU { alpha: 0.1 };
        assert_eq!(f.function(-2.0), -0.2);
        assert_eq!(f.derivative(-2.0), 0.1);
        assert_eq!(f.derivative(3.0), 1.0);
    }

    #[test]
    fn softmax_sums_to_one() {
        let out = softmax(&[1.0, 2.0, 3.0]);
        let total: f64 = out.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }
}
