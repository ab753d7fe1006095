use rand::Rng;
use serde::{Serialize, Deserialize};

/// Distribution used to draw a layer's initial weights.
///
/// The Xavier variants need the fan-out of the layer; when it is unknown
/// (the output layer) they fall back to the matching LeCun variant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WeightsInit {
    /// U(-limit, limit)
    Uniform { limit: f64 },
    /// N(mean, std_deviation)
    Gaussian { mean: f64, std_deviation: f64 },
    /// U(-sqrt(3 / fan_in), sqrt(3 / fan_in))
    LecunUniform,
    /// N(0, sqrt(1 / fan_in))
    LecunNormal,
    /// U(-sqrt(6 / (fan_in + fan_out)), +...)
    #[default]
    XavierUniform,
    /// N(0, sqrt(2 / (fan_in + fan_out)))
    XavierNormal,
}

impl WeightsInit {
    pub fn sample<R: Rng + ?Sized>(
        &self,
        count: usize,
        fan_in: usize,
        fan_out: Option<usize>,
        rng: &mut R,
    ) -> Vec<f64> {
        let fan_in = fan_in.max(1) as f64;
        match (*self, fan_out) {
            (WeightsInit::Uniform { limit }, _) => uniform(count, limit, rng),
            (WeightsInit::Gaussian { mean, std_deviation }, _) => {
                gaussian(count, mean, std_deviation, rng)
            }
            (WeightsInit::XavierUniform, Some(fan_out)) => {
                uniform(count, (6.0 / (fan_in + fan_out as f64)).sqrt(), rng)
            }
            (WeightsInit::XavierNormal, Some(fan_out)) => {
                gaussian(count, 0.0, (2.0 / (fan_in + fan_out as f64)).sqrt(), rng)
            }
            (WeightsInit::LecunUniform, _) | (WeightsInit::XavierUniform, None) => {
                uniform(count, (3.0 / fan_in).sqrt(), rng)
            }
            (WeightsInit::LecunNormal, _) | (WeightsInit::XavierNormal, None) => {
                gaussian(count, 0.0, (1.0 / fan_in).sqrt(), rng)
            }
        }
    }
}

pub fn uniform<R: Rng + ?Sized>(count: usize, limit: f64, rng: &mut R) -> Vec<f64> {
    (0..count)
        .map(|_| rng.gen::<f64>() * 2.0 * limit - limit)
        .collect()
}

pub fn gaussian<R: Rng + ?Sized>(count: usize, mean: f64, std_deviation: f64, rng: &mut R) -> Vec<f64> {
    (0..count)
        .map(|_| mean + sample_standard_normal(rng) * std_deviation)
        .collect()
}

/// Samples N(0, 1) with the polar (Marsaglia) form of Box-Muller.
/// Points outside the unit circle, or at its centre, are rejected.
fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let x1 = rng.gen::<f64>() * 2.0 - 1.0;
        let x2 = rng.gen::<f64>() * 2.0 - 1.0;
        let r = x1 * x1 + x2 * x2;
        if r > 0.0 && r < 1.0 {
            return x1 * (-2.0 * r.ln() / r).sqrt();
        }
    }
}
