use closeline_core::{ResolveError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Resolve(ResolveError::Validation(_)) => 2,
            Self::Resolve(ResolveError::NoDataAvailable { .. }) => 3,
            Self::Serialization(_) | Self::Io(_) => 4,
            Self::Resolve(ResolveError::RateLimited { .. }) => 5,
        }
    }
}
