#![no_std]

//! opcomp-core - Operator Component Definitions
//!
//! This crate provides the pure definitions shared by operator-component
//! storage: operator categories and the storage topology each one is bound
//! to, orbital-index packing, symmetry-sector labels, and the staging-file
//! format used by disk-staged builds. It performs no I/O.

extern crate alloc;

pub mod category;
pub mod error;
pub mod format;
pub mod indices;
pub mod quantum;
pub mod topology;

pub use category::{OperatorCategory, OperatorKind};
pub use error::*;
pub use format::{RecordHeader, StagingHeader, STAGING_EXTENSION};
pub use indices::OrbitalIndices;
pub use quantum::{OperatorSector, QuantumLadder, SpinQuantum};
pub use topology::{Topology, TopologyKind};

/// Zero-sized marker types, one per operator category
pub mod kinds {
    pub use crate::category::{
        Cre, CreCre, CreCreCre, CreCreDes, CreCreDesComp, CreDes, CreDesComp, CreDesCre,
        CreDesDes, Des, DesCre, DesCreDes, DesDesComp, DesDesCre, Ham,
    };
}

/// Zero-sized topology types bound to operator kinds
pub mod topologies {
    pub use crate::topology::{Dense2D, Dense3D, Linear, Singleton, Triangular};
}
