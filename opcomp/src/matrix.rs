//! Capabilities consumed from the numeric layer
//!
//! Components never look inside a matrix. They create unbuilt templates,
//! ask each matrix to build, transform and serialize itself, and read the
//! sector label it carries.

use std::io::{self, Read, Write};

use opcomp_core::{OperatorCategory, OperatorSector, OrbitalIndices};
use serde::{de::DeserializeOwned, Serialize};

/// Failures reported by a numeric kernel
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("basis has no sector {0}")]
    MissingSector(usize),

    #[error("lower block holds no {category} operator at {indices} in this sector")]
    MissingOperator {
        category: OperatorCategory,
        indices: OrbitalIndices,
    },

    #[error("kernel failed: {0}")]
    Kernel(String),
}

/// Source of the orbitals and sector labels a component is built over:
/// either a configuration basis or an already built lower-level block
pub trait OperatorBasis: Sync {
    /// Dimension of the distributed array (total orbitals in the system)
    fn num_orbitals(&self) -> usize;

    /// Orbitals spanned by the block being built, each `< num_orbitals()`
    fn orbitals(&self) -> &[usize];

    /// Realisations the slot at `indices` must hold. Empty means the slot
    /// carries no operator.
    fn sectors(&self, category: OperatorCategory, indices: &OrbitalIndices)
        -> Vec<OperatorSector>;
}

/// One sparse operator matrix in a symmetry sector
pub trait OperatorMatrix: Send + Sync + Sized + Serialize + DeserializeOwned {
    type Basis: OperatorBasis;
    /// Basis rotation for one symmetry sector of the state space
    type Rotation: Sync;
    /// Metadata of the rotated basis
    type StateInfo: Sync;

    /// Unbuilt matrix for one realisation of a slot
    fn template(category: OperatorCategory, indices: OrbitalIndices, sector: OperatorSector)
        -> Self;

    fn sector(&self) -> &OperatorSector;

    /// Fill in the matrix elements from the basis
    fn build(&mut self, basis: &Self::Basis) -> Result<(), MatrixError>;

    /// Replace the matrix by its image under the given rotations
    fn renormalise_transform(
        &mut self,
        rotations: &[Self::Rotation],
        state_info: &Self::StateInfo,
    ) -> Result<(), MatrixError>;

    /// Release element storage, keeping the label
    fn deallocate(&mut self);

    fn write_to(&self, writer: &mut dyn Write) -> io::Result<()>;

    fn read_from(reader: &mut dyn Read) -> io::Result<Self>;
}
