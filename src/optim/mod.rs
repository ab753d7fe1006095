pub mod optimizer;
pub mod regularization;
pub mod state;

pub use optimizer::Optimizer;
pub use regularization::{Penalties, Regularization, UpdateTotals};
pub use state::ParameterState;
