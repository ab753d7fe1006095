pub struct MseCost;

impl MseCost {
    /// Scalar MSE: mean((target - output)²)
    pub fn cost(target: &[f64], output: &[f64]) -> f64 {
        let n = target.len() as f64;
        target.iter().zip(output.iter())
            .map(|(t, o)| (t - o).powi(2))
            .sum::<f64>() / n
    }

    /// Per-output error in the descent direction: target - output
    pub fn error(target: &[f64], output: &[f64]) -> Vec<f64> {
        target.iter().zip(output.iter())
            .map(|(t, o)| t - o)
            .collect()
    }
}
