use serde::{Serialize, Deserialize};

use crate::cost::cross_entropy::CrossEntropyCost;
use crate::cost::mse::MseCost;
use crate::cost::vector_distance::VectorDistanceCost;

/// Selects which cost function a network reports and, when the driver asks
/// for it, which error vector is fed to `Network::backward_errors`.
///
/// - `MeanSquaredError`: pair with Identity or Sigmoid output.
/// - `CrossEntropy`: pair with Sigmoid or Softmax output.
/// - `VectorDistance`: Euclidean distance, for embedding-style outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostFunction {
    #[default]
    MeanSquaredError,
    CrossEntropy,
    VectorDistance,
}

impl CostFunction {
    pub fn cost(&self, target: &[f64], output: &[f64]) -> f64 {
        match self {
            CostFunction::MeanSquaredError => MseCost::cost(target, output),
            CostFunction::CrossEntropy => CrossEntropyCost::cost(target, output),
            CostFunction::VectorDistance => VectorDistanceCost::cost(target, output),
        }
    }

    pub fn error(&self, target: &[f64], output: &[f64]) -> Vec<f64> {
        match self {
            CostFunction::MeanSquaredError => MseCost::error(target, output),
            CostFunction::CrossEntropy => CrossEntropyCost::error(target, output),
            CostFunction::VectorDistance => VectorDistanceCost::error(target, output),
        }
    }
}
