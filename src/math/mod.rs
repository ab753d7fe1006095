pub mod init;
pub mod volume;

pub use init::WeightsInit;
pub use volume::{Map, Volume};
