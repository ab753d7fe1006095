/// Cross-entropy in its binary form, summed over outputs and averaged.
/// Pair with Sigmoid or Softmax outputs.
pub struct CrossEntropyCost;

/// Keeps both logarithms finite at 0 and 1.
const EPS: f64 = 1e-15;

impl CrossEntropyCost {
    /// L = -mean(t·ln(o + ε) + (1 - t)·ln(1 + ε - o))
    pub fn cost(target: &[f64], output: &[f64]) -> f64 {
        let n = target.len() as f64;
        -target.iter().zip(output.iter())
            .map(|(t, o)| t * (o + EPS).ln() + (1.0 - t) * (1.0 + EPS - o).ln())
            .sum::<f64>() / n
    }

    /// Combined activation + cross-entropy error w.r.t. the output sums:
    /// target - output. The output layer's derivative step is skipped so
    /// this is not double-applied.
    pub fn error(target: &[f64], output: &[f64]) -> Vec<f64> {
        target.iter().zip(output.iter())
            .map(|(t, o)| t - o)
            .collect()
    }
}
