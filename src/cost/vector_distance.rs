pub struct VectorDistanceCost;

impl VectorDistanceCost {
    /// Euclidean distance between target and output.
    pub fn cost(target: &[f64], output: &[f64]) -> f64 {
        target.iter().zip(output.iter())
            .map(|(t, o)| (t - o).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// (target - output) / distance; zero when the vectors coincide.
    pub fn error(target: &[f64], output: &[f64]) -> Vec<f64> {
        let distance = Self::cost(target, output);
        target.iter().zip(output.iter())
            .map(|(t, o)| if distance > 0.0 { (t - o) / distance } else { 0.0 })
            .collect()
    }
}
