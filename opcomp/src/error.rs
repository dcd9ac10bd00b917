//! Error types for component storage, build and lookup

use std::path::PathBuf;

use opcomp_core::{CoreError, OperatorCategory, OrbitalIndices, SpinQuantum};

use crate::matrix::MatrixError;
use crate::staging::StagingState;

/// Errors raised by operator components
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    /// The orbital tuple has no slot anywhere in the distributed array
    #[error("no slot at orbital indices {0}")]
    IndexNotFound(OrbitalIndices),

    /// The slot exists but is held by another partition
    #[error("slot {0} is not held by this partition")]
    NotLocal(OrbitalIndices),

    /// Flat local or global position outside the populated range
    #[error("position {index} out of range, {len} slots present")]
    PositionOutOfRange { index: usize, len: usize },

    /// No matrix in the slot carries the requested sector
    #[error("no operator with sector {sector} at {indices}")]
    SectorNotFound {
        sector: SpinQuantum,
        indices: OrbitalIndices,
    },

    /// No matrix in the slot realises the requested quantum ladder
    #[error("no operator with ladder {ladder:?} at {indices}")]
    LadderNotFound {
        ladder: Vec<SpinQuantum>,
        indices: OrbitalIndices,
    },

    /// Ladder lookups address three-index operators only
    #[error("ladder lookup needs a third orbital index, got {0}")]
    ThirdIndexRequired(OrbitalIndices),

    /// Single-sector lookups do not address three-index operators
    #[error("single-sector lookup cannot address three-index slot {0}")]
    UnexpectedThirdIndex(OrbitalIndices),

    /// Two realisations in one slot share the same sector key
    #[error("duplicate sector {sector} at {indices}")]
    DuplicateSector {
        sector: SpinQuantum,
        indices: OrbitalIndices,
    },

    /// Build called on a populated component
    #[error("{category} component #{id} is already built; clear it first")]
    AlreadyBuilt { category: OperatorCategory, id: u64 },

    /// Restored snapshot belongs to another category
    #[error("snapshot holds {found} operators, expected {expected}")]
    CategoryMismatch {
        expected: OperatorCategory,
        found: OperatorCategory,
    },

    /// Staging transition attempted from the wrong state
    #[error("staging file is {found:?}, expected {expected:?}")]
    StagingState {
        expected: StagingState,
        found: StagingState,
    },

    /// Staging file I/O failed
    #[error("staging I/O failed on {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Staging file content does not match what was written
    #[error("corrupt staging file {path}: {reason}")]
    CorruptStaging { path: PathBuf, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl OpError {
    /// True for lookups of a sector, ladder or slot that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OpError::IndexNotFound(_)
                | OpError::SectorNotFound { .. }
                | OpError::LadderNotFound { .. }
        )
    }
}

/// Result type for component operations
pub type Result<T> = std::result::Result<T, OpError>;
