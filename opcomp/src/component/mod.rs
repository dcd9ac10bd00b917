//! Operator components
//!
//! An operator component holds every operator matrix of one category that
//! belongs to a block: one slot per orbital tuple, each slot holding one
//! matrix per symmetry sector the operator realises. [`OperatorComponent`]
//! binds a category to its storage topology at compile time;
//! [`OperatorComponentBase`] is the category-agnostic interface blocks use
//! to hold components of different categories side by side.

mod factory;
mod op_component;

pub use factory::{make_component, restore_component};
pub use op_component::OperatorComponent;

use opcomp_core::{OperatorCategory, OrbitalIndices, SpinQuantum, STAGING_EXTENSION};

use crate::error::Result;
use crate::matrix::OperatorMatrix;

/// Uniform interface over components of every category
pub trait OperatorComponentBase<M: OperatorMatrix>: Send + Sync {
    fn category(&self) -> OperatorCategory;

    /// Unique id within the registry the component was created from
    fn unique_id(&self) -> u64;

    fn op_string(&self) -> &'static str {
        self.category().op_string()
    }

    fn num_indices(&self) -> usize {
        self.category().num_indices()
    }

    /// Staging file name, `<OPSTRING>_<id>.tmp`
    fn unique_filename(&self) -> String {
        format!("{}_{}.{}", self.op_string(), self.unique_id(), STAGING_EXTENSION)
    }

    /// Populate the slots over `basis` and build every local matrix.
    ///
    /// Fails with `AlreadyBuilt` on a populated component. On any other
    /// failure the component is left empty.
    fn build(&mut self, basis: &M::Basis) -> Result<()>;

    /// Rotate every local matrix into a new basis
    fn renormalise_transform(&mut self, rotations: &[M::Rotation], state_info: &M::StateInfo)
        -> Result<()>;

    /// Drop every matrix and slot
    fn clear(&mut self);

    fn is_built(&self) -> bool;

    /// Number of slots held by this process
    fn local_count(&self) -> usize;

    /// Number of slots across all processes
    fn global_count(&self) -> usize;

    /// Whether a slot exists at `indices` on any process
    fn has(&self, indices: OrbitalIndices) -> bool;

    /// Whether the slot at `indices` is held by this process
    fn has_local_index(&self, indices: OrbitalIndices) -> bool;

    /// Every realisation stored at `indices`
    fn get_element(&self, indices: OrbitalIndices) -> Result<&[M]>;

    fn get_element_mut(&mut self, indices: OrbitalIndices) -> Result<&mut [M]>;

    /// Realisations of the `index`-th local slot
    fn get_local_element(&self, index: usize) -> Result<&[M]>;

    fn get_local_element_mut(&mut self, index: usize) -> Result<&mut [M]>;

    /// Realisations of the `index`-th global slot, if held locally
    fn get_global_element(&self, index: usize) -> Result<&[M]>;

    fn get_global_element_mut(&mut self, index: usize) -> Result<&mut [M]>;

    /// Orbital tuples of the local slots, in storage order
    fn array_layout(&self) -> Result<Vec<OrbitalIndices>>;

    /// The realisation at `indices` whose net quantum numbers are `sector`.
    /// Not defined for three-index slots.
    fn get_op_rep(&self, sector: SpinQuantum, indices: OrbitalIndices) -> Result<&M>;

    fn get_op_rep_mut(&mut self, sector: SpinQuantum, indices: OrbitalIndices) -> Result<&mut M>;

    /// The three-index realisation whose intermediate quantum numbers,
    /// under the slot's coupling pattern, equal `ladder`
    fn get_op_rep_ladder(&self, ladder: &[SpinQuantum], indices: OrbitalIndices) -> Result<&M>;

    fn get_op_rep_ladder_mut(&mut self, ladder: &[SpinQuantum], indices: OrbitalIndices)
        -> Result<&mut M>;

    /// Whether slots are held in full by every process
    fn is_local(&self) -> bool;

    /// Takes effect at the next build
    fn set_local(&mut self, local: bool);

    fn is_core(&self) -> bool;

    fn set_core(&mut self, core: bool);

    fn is_deriv(&self) -> bool;

    fn set_deriv(&mut self, deriv: bool);

    /// Serialize the component, slots included, to JSON
    fn to_json(&self) -> Result<String>;
}
