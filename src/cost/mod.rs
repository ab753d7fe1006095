pub mod mse;
pub mod cross_entropy;
pub mod vector_distance;
pub mod cost_type;

pub use mse::MseCost;
pub use cross_entropy::CrossEntropyCost;
pub use vector_distance::VectorDistanceCost;
pub use cost_type::CostFunction;
