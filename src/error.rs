use thiserror::Error;

/// Everything that can go wrong while wiring, running or (de)serializing a
/// network. None of these are retried inside the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised while wiring layers: inconsistent shapes or hyperparameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Raised at call time when the network is driven incorrectly.
    #[error("usage error: {0}")]
    Usage(String),

    /// Raised by weight import before any parameter is overwritten.
    #[error("shape mismatch at {location}: expected {expected}, found {found}")]
    ShapeMismatch {
        location: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Error {
        Error::Configuration(msg.into())
    }

    pub(crate) fn usage(msg: impl Into<String>) -> Error {
        Error::Usage(msg.into())
    }

    pub(crate) fn shape_mismatch(
        location: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Error {
        Error::ShapeMismatch {
            location: location.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
