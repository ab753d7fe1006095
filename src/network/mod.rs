pub mod config;
pub mod export;
pub mod network;
pub mod spec;

pub use config::{NetworkConfig, TrainingContext};
pub use export::{ExportedLayer, ExportedNetwork, ExportedUnit, UnitWeights};
pub use network::Network;
pub use spec::{LayerEntry, LayerSpec, NetworkSpec};
