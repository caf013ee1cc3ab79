use thiserror::Error;

/// Error types for the normeq-rs library.
#[derive(Error, Debug)]
pub enum NormalEqError {
    /// Error indicating a mismatch in matrix or vector dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Parameter not known to the normal equations.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// Attempt to combine normal equations of different kinds.
    #[error("Incompatible normal equations: {0}")]
    Incompatible(String),

    /// Serialized normal equations written with another format version.
    #[error("Format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Coarse classification of [`NormalEqError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Shape or precondition violation on insertion.
    Shape,
    /// Lookup of a parameter the store knows nothing about.
    Lookup,
    /// Type or format version incompatibility.
    Incompatible,
    /// Failure of the underlying reader or writer.
    Io,
}

impl NormalEqError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NormalEqError::DimensionMismatch(_) | NormalEqError::InvalidInput(_) => {
                ErrorKind::Shape
            }
            NormalEqError::ParameterNotFound(_) => ErrorKind::Lookup,
            NormalEqError::Incompatible(_) | NormalEqError::VersionMismatch { .. } => {
                ErrorKind::Incompatible
            }
            NormalEqError::IoError(_) | NormalEqError::JsonError(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for normeq-rs operations.
pub type Result<T> = std::result::Result<T, NormalEqError>;
