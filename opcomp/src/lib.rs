//! opcomp - Operator Component Storage and Build Engine
//!
//! This library stores the operator matrices of a renormalization-group
//! block, one component per operator category, and builds, transforms and
//! serializes them.
//!
//! ## Architecture
//!
//! The workspace keeps definitions and implementations apart:
//!
//! - **opcomp-core**: categories, storage topologies, index packing, sector
//!   labels and the staging-file layout (no I/O)
//! - **opcomp**: distributed slot storage, in-core and disk-staged builds,
//!   lookup and persistence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opcomp::dense::{DenseBlockOperator, SiteBasis, StateInfo};
//! use opcomp::kinds::CreCre;
//! use opcomp::{ComponentConfig, ComponentRegistry, OperatorComponent};
//! use opcomp::{OperatorComponentBase, OperatorMatrix};
//! use opcomp::{OrbitalIndices, SpinQuantum};
//!
//! fn example() -> opcomp::Result<()> {
//!     let registry = ComponentRegistry::new();
//!     let basis = SiteBasis::full(4, StateInfo::new(vec![2, 2]));
//!
//!     let config = ComponentConfig::default();
//!     let mut crecre = OperatorComponent::<CreCre, DenseBlockOperator>::new(&registry, config);
//!     crecre.build(&basis)?;
//!
//!     // (1, 3) and (3, 1) address the same slot
//!     let op = crecre.get_op_rep(SpinQuantum::new(2, 2, 0), OrbitalIndices::two(3, 1))?;
//!     println!("{:?} has {} blocks", op.sector().delta, op.blocks().len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **mmap** (default): read staging files back through a memory map

pub use opcomp_core::{
    kinds, topologies, CoreError, OperatorCategory, OperatorKind, OperatorSector, OrbitalIndices,
    QuantumLadder, SpinQuantum, Topology, TopologyKind,
};

pub mod component;
pub mod config;
pub mod dense;
pub mod distributed;
pub mod error;
pub mod matrix;
pub mod parallel;
pub mod registry;
pub mod staging;

pub use component::{make_component, restore_component, OperatorComponent, OperatorComponentBase};
pub use config::{BuildStrategy, ComponentConfig};
pub use distributed::{DistributedArray, Partition};
pub use error::{OpError, Result};
pub use matrix::{MatrixError, OperatorBasis, OperatorMatrix};
pub use registry::ComponentRegistry;
pub use staging::{StagingFile, StagingState};
