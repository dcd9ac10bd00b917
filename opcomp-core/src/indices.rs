//! Orbital-index tuples addressing one storage slot

use crate::error::{CoreError, Result};

/// Up to three orbital indices identifying a slot.
///
/// Missing trailing indices play the role of an "unset" sentinel: a
/// two-index tuple has `k() == None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrbitalIndices {
    len: u8,
    idx: [usize; 3],
}

impl OrbitalIndices {
    /// Maximum number of indices any operator category carries
    pub const MAX: usize = 3;

    /// The empty tuple used by singleton operators
    pub const fn none() -> Self {
        Self { len: 0, idx: [0; 3] }
    }

    pub const fn one(i: usize) -> Self {
        Self { len: 1, idx: [i, 0, 0] }
    }

    pub const fn two(i: usize, j: usize) -> Self {
        Self { len: 2, idx: [i, j, 0] }
    }

    pub const fn three(i: usize, j: usize, k: usize) -> Self {
        Self { len: 3, idx: [i, j, k] }
    }

    /// Build a tuple from a slice of at most three indices
    pub fn from_slice(indices: &[usize]) -> Result<Self> {
        if indices.len() > Self::MAX {
            return Err(CoreError::TooManyIndices);
        }
        let mut idx = [0; 3];
        idx[..indices.len()].copy_from_slice(indices);
        Ok(Self {
            len: indices.len() as u8,
            idx,
        })
    }

    /// Number of indices present
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.idx[..self.len()]
    }

    pub fn i(&self) -> Option<usize> {
        self.get(0)
    }

    pub fn j(&self) -> Option<usize> {
        self.get(1)
    }

    pub fn k(&self) -> Option<usize> {
        self.get(2)
    }

    fn get(&self, pos: usize) -> Option<usize> {
        (pos < self.len()).then(|| self.idx[pos])
    }
}

impl core::fmt::Display for OrbitalIndices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "(")?;
        for (n, i) in self.as_slice().iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{i}")?;
        }
        write!(f, ")")
    }
}

impl From<usize> for OrbitalIndices {
    fn from(i: usize) -> Self {
        Self::one(i)
    }
}

impl From<(usize, usize)> for OrbitalIndices {
    fn from((i, j): (usize, usize)) -> Self {
        Self::two(i, j)
    }
}

impl From<(usize, usize, usize)> for OrbitalIndices {
    fn from((i, j, k): (usize, usize, usize)) -> Self {
        Self::three(i, j, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_accessors() {
        let pair = OrbitalIndices::two(3, 1);
        assert_eq!(pair.i(), Some(3));
        assert_eq!(pair.j(), Some(1));
        assert_eq!(pair.k(), None);
        assert_eq!(OrbitalIndices::none().i(), None);
    }

    #[test]
    fn test_from_slice() {
        assert_eq!(
            OrbitalIndices::from_slice(&[1, 2, 3]),
            Ok(OrbitalIndices::three(1, 2, 3))
        );
        assert_eq!(OrbitalIndices::from_slice(&[]), Ok(OrbitalIndices::none()));
        assert_eq!(
            OrbitalIndices::from_slice(&[0, 1, 2, 3]),
            Err(CoreError::TooManyIndices)
        );
    }

    #[test]
    fn test_unused_positions_do_not_affect_equality() {
        let a = OrbitalIndices::from_slice(&[4]).unwrap();
        assert_eq!(a, OrbitalIndices::one(4));
        assert_eq!(a.as_slice(), &[4]);
    }
}
