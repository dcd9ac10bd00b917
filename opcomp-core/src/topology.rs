//! Storage topologies and their index packing
//!
//! Each operator category stores its slots in one of five shapes. The
//! packing rules here are the single definition of how an orbital tuple maps
//! to a flat slot index; `unflatten` is the exact inverse of `flatten`.

use alloc::vec::Vec;

use crate::error::{CoreError, Result};
use crate::indices::OrbitalIndices;

/// Storage shape of a distributed operator array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TopologyKind {
    /// One global instance, no orbital index
    Singleton,
    /// One slot per orbital
    Linear,
    /// Exchange-symmetric pairs, only `i <= j` is stored
    Triangular,
    /// Ordered pairs
    Dense2D,
    /// Ordered triples
    Dense3D,
}

impl TopologyKind {
    /// Number of orbital indices addressing a slot
    pub const fn num_indices(self) -> usize {
        match self {
            TopologyKind::Singleton => 0,
            TopologyKind::Linear => 1,
            TopologyKind::Triangular | TopologyKind::Dense2D => 2,
            TopologyKind::Dense3D => 3,
        }
    }

    /// Number of flat positions for an array over `dim` orbitals
    pub const fn capacity(self, dim: usize) -> usize {
        match self {
            TopologyKind::Singleton => 1,
            TopologyKind::Linear => dim,
            TopologyKind::Triangular => dim * (dim + 1) / 2,
            TopologyKind::Dense2D => dim * dim,
            TopologyKind::Dense3D => dim * dim * dim,
        }
    }

    /// Map an orbital tuple to its flat slot index
    pub fn flatten(self, dim: usize, indices: &OrbitalIndices) -> Result<usize> {
        if indices.len() != self.num_indices() {
            return Err(CoreError::ArityMismatch);
        }
        if indices.as_slice().iter().any(|&i| i >= dim) {
            return Err(CoreError::IndexOutOfBounds);
        }
        let idx = indices.as_slice();
        let flat = match self {
            TopologyKind::Singleton => 0,
            TopologyKind::Linear => idx[0],
            TopologyKind::Triangular => {
                let (i, j) = if idx[0] <= idx[1] {
                    (idx[0], idx[1])
                } else {
                    (idx[1], idx[0])
                };
                j * (j + 1) / 2 + i
            }
            TopologyKind::Dense2D => idx[0] * dim + idx[1],
            TopologyKind::Dense3D => (idx[0] * dim + idx[1]) * dim + idx[2],
        };
        Ok(flat)
    }

    /// Recover the orbital tuple stored at `flat`
    pub fn unflatten(self, dim: usize, flat: usize) -> Result<OrbitalIndices> {
        if flat >= self.capacity(dim) {
            return Err(CoreError::IndexOutOfBounds);
        }
        let indices = match self {
            TopologyKind::Singleton => OrbitalIndices::none(),
            TopologyKind::Linear => OrbitalIndices::one(flat),
            TopologyKind::Triangular => {
                let j = triangular_row(flat);
                OrbitalIndices::two(flat - j * (j + 1) / 2, j)
            }
            TopologyKind::Dense2D => OrbitalIndices::two(flat / dim, flat % dim),
            TopologyKind::Dense3D => {
                OrbitalIndices::three(flat / (dim * dim), (flat / dim) % dim, flat % dim)
            }
        };
        Ok(indices)
    }

    /// All tuples this topology stores over the given orbitals.
    ///
    /// Triangular tuples come back canonical (`i <= j`). Order follows the
    /// input orbital order.
    pub fn enumerate(self, orbitals: &[usize]) -> Vec<OrbitalIndices> {
        let mut out = Vec::new();
        match self {
            TopologyKind::Singleton => out.push(OrbitalIndices::none()),
            TopologyKind::Linear => out.extend(orbitals.iter().map(|&i| OrbitalIndices::one(i))),
            TopologyKind::Triangular => {
                for &j in orbitals {
                    for &i in orbitals.iter().filter(|&&i| i <= j) {
                        out.push(OrbitalIndices::two(i, j));
                    }
                }
            }
            TopologyKind::Dense2D => {
                for &i in orbitals {
                    for &j in orbitals {
                        out.push(OrbitalIndices::two(i, j));
                    }
                }
            }
            TopologyKind::Dense3D => {
                for &i in orbitals {
                    for &j in orbitals {
                        for &k in orbitals {
                            out.push(OrbitalIndices::three(i, j, k));
                        }
                    }
                }
            }
        }
        out
    }
}

impl core::fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TopologyKind::Singleton => write!(f, "singleton"),
            TopologyKind::Linear => write!(f, "linear"),
            TopologyKind::Triangular => write!(f, "triangular"),
            TopologyKind::Dense2D => write!(f, "dense-2d"),
            TopologyKind::Dense3D => write!(f, "dense-3d"),
        }
    }
}

/// Largest `j` with `j(j+1)/2 <= flat`
fn triangular_row(flat: usize) -> usize {
    let (mut lo, mut hi) = (0usize, 1usize);
    while hi * (hi + 1) / 2 <= flat {
        hi *= 2;
    }
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if mid * (mid + 1) / 2 <= flat {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Type-level storage shape bound to an operator kind
pub trait Topology: Send + Sync + 'static {
    const KIND: TopologyKind;
    const NUM_INDICES: usize = Self::KIND.num_indices();

    fn capacity(dim: usize) -> usize {
        Self::KIND.capacity(dim)
    }

    fn flatten(dim: usize, indices: &OrbitalIndices) -> Result<usize> {
        Self::KIND.flatten(dim, indices)
    }

    fn unflatten(dim: usize, flat: usize) -> Result<OrbitalIndices> {
        Self::KIND.unflatten(dim, flat)
    }

    fn enumerate(orbitals: &[usize]) -> Vec<OrbitalIndices> {
        Self::KIND.enumerate(orbitals)
    }
}

macro_rules! topology {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $name;

            impl Topology for $name {
                const KIND: TopologyKind = TopologyKind::$kind;
            }
        )*
    };
}

topology! {
    Singleton => Singleton,
    Linear => Linear,
    Triangular => Triangular,
    Dense2D => Dense2D,
    Dense3D => Dense3D,
}
