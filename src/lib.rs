pub mod activation;
pub mod backend;
pub mod cost;
pub mod error;
pub mod layers;
pub mod math;
pub mod network;
pub mod optim;

// Convenience re-exports
pub use activation::ActivationFunction;
pub use backend::{ComputeBackend, ElementType, ParameterAddress, TypedBuffer};
pub use cost::CostFunction;
pub use error::{Error, Result};
pub use layers::{Layer, Shape};
pub use math::WeightsInit;
pub use network::{LayerSpec, Network, NetworkConfig, NetworkSpec};
pub use optim::{Optimizer, Penalties};
