use thiserror::Error;

/// Coarse classification of a failure, stable across releases.
///
/// Mirrors the error taxonomy exposed to collaborators that only care about
/// the kind of failure (the CLI maps these to exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    NullPointer,
    OutOfMemory,
    InvalidArgument,
    NotFound,
    InvalidState,
    Io,
}

#[derive(Error, Debug)]
pub enum CivError {
    #[error("Missing required reference: {0}")]
    NullPointer(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Parameter file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CivError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NullPointer(_) => ErrorCode::NullPointer,
            Self::OutOfMemory(_) => ErrorCode::OutOfMemory,
            Self::InvalidArgument(_) | Self::Toml(_) => ErrorCode::InvalidArgument,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::Io(_) | Self::Serde(_) => ErrorCode::Io,
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::NullPointer(m)
            | Self::OutOfMemory(m)
            | Self::InvalidArgument(m)
            | Self::NotFound(m)
            | Self::InvalidState(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CivError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_variants() {
        assert_eq!(CivError::NotFound("x".into()).code(), ErrorCode::NotFound);
        assert_eq!(
            CivError::InvalidState("duplicate event".into()).code(),
            ErrorCode::InvalidState
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(CivError::from(io).code(), ErrorCode::Io);
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = CivError::InvalidState("Treaty rejected due to low trust".into());
        assert_eq!(err.message(), "Treaty rejected due to low trust");
        assert_eq!(err.to_string(), "Treaty rejected due to low trust");
    }
}
