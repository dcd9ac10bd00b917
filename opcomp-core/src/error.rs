//! Error types for operator-component definitions

/// Errors raised by the pure index, topology and format layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Orbital index or flat index outside the array dimension
    IndexOutOfBounds,
    /// Orbital tuple has the wrong number of indices for the topology
    ArityMismatch,
    /// More than three orbital indices were supplied
    TooManyIndices,
    /// Unknown operator category tag
    UnknownCategory,
    /// Invalid staging header
    InvalidHeader,
    /// Unsupported staging format version
    UnsupportedFormat,
    /// Staging data does not match its framing
    CorruptedData,
    /// Insufficient buffer space
    InsufficientBuffer,
}

impl core::fmt::Display for CoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            CoreError::IndexOutOfBounds => "Index out of bounds",
            CoreError::ArityMismatch => "Orbital tuple arity does not match topology",
            CoreError::TooManyIndices => "At most three orbital indices are supported",
            CoreError::UnknownCategory => "Unknown operator category",
            CoreError::InvalidHeader => "Invalid staging header",
            CoreError::UnsupportedFormat => "Unsupported staging format version",
            CoreError::CorruptedData => "Data corruption detected",
            CoreError::InsufficientBuffer => "Insufficient buffer space",
        };
        write!(f, "{msg}")
    }
}

impl core::error::Error for CoreError {}

/// Result type for core operations
pub type Result<T> = core::result::Result<T, CoreError>;
