//! Distributed slot storage
//!
//! A [`DistributedArray`] records every slot that exists across all
//! processes (the global set) and stores the matrices of the slots this
//! process owns (the local set). Slots are addressed by flat index, using
//! the packing of the array's [`Topology`].

use std::marker::PhantomData;

use hashbrown::HashMap;
use opcomp_core::{CoreError, OrbitalIndices, Topology};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{OpError, Result};

/// Ownership rule for slots across processes.
///
/// The `g`-th global slot (in flat-index order) belongs to rank
/// `g % nprocs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub rank: usize,
    pub nprocs: usize,
}

impl Partition {
    pub fn new(rank: usize, nprocs: usize) -> Self {
        let nprocs = nprocs.max(1);
        Self {
            rank: rank % nprocs,
            nprocs,
        }
    }

    /// Whether this rank owns the global slot with the given ordinal
    pub fn owns(&self, ordinal: usize) -> bool {
        ordinal % self.nprocs == self.rank
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

/// Slots of one operator category, partitioned across processes
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "M: Serialize", deserialize = "M: DeserializeOwned"))]
pub struct DistributedArray<T: Topology, M> {
    dim: usize,
    global: Vec<usize>,
    local: Vec<usize>,
    slots: Vec<Vec<M>>,
    local_only: bool,
    partition: Partition,
    populated: bool,
    #[serde(skip)]
    positions: HashMap<usize, usize>,
    #[serde(skip)]
    _topology: PhantomData<T>,
}

impl<T: Topology, M> DistributedArray<T, M> {
    /// Empty array
    pub fn new(partition: Partition) -> Self {
        Self {
            dim: 0,
            global: Vec::new(),
            local: Vec::new(),
            slots: Vec::new(),
            local_only: false,
            partition,
            populated: false,
            positions: HashMap::new(),
            _topology: PhantomData,
        }
    }

    /// Populate the array over `dim` orbitals with the slots at `flats`.
    ///
    /// `make` is called once per local slot, in flat-index order, and
    /// returns the slot's matrices. On error the array is left empty.
    pub fn populate<F, E>(
        &mut self,
        dim: usize,
        mut flats: Vec<usize>,
        mut make: F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(usize) -> std::result::Result<Vec<M>, E>,
    {
        self.clear();
        flats.sort_unstable();
        flats.dedup();

        let local: Vec<usize> = flats
            .iter()
            .enumerate()
            .filter(|&(ordinal, _)| self.local_only || self.partition.owns(ordinal))
            .map(|(_, &flat)| flat)
            .collect();

        let slots = local
            .iter()
            .map(|&flat| make(flat))
            .collect::<std::result::Result<Vec<_>, E>>()?;

        self.dim = dim;
        self.global = flats;
        self.local = local;
        self.slots = slots;
        self.populated = true;
        self.rebuild_positions();
        Ok(())
    }

    /// Drop all slots; counts return to zero
    pub fn clear(&mut self) {
        self.dim = 0;
        self.global.clear();
        self.local.clear();
        self.slots.clear();
        self.positions.clear();
        self.populated = false;
    }

    /// Restore the lookup index after deserialization, checking that the
    /// stored sets are consistent
    pub(crate) fn reindex(&mut self) -> std::result::Result<(), CoreError> {
        let sorted = |v: &[usize]| v.windows(2).all(|w| w[0] < w[1]);
        if self.slots.len() != self.local.len()
            || !sorted(&self.global)
            || !sorted(&self.local)
            || self.local.iter().any(|f| self.global.binary_search(f).is_err())
            || self.global.iter().any(|&f| f >= T::capacity(self.dim))
        {
            return Err(CoreError::CorruptedData);
        }
        self.rebuild_positions();
        Ok(())
    }

    fn rebuild_positions(&mut self) {
        self.positions = self
            .local
            .iter()
            .enumerate()
            .map(|(pos, &flat)| (flat, pos))
            .collect();
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn is_local(&self) -> bool {
        self.local_only
    }

    /// Hold every global slot locally on the next populate
    pub fn set_local(&mut self, local_only: bool) {
        self.local_only = local_only;
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn local_nnz(&self) -> usize {
        self.local.len()
    }

    pub fn global_nnz(&self) -> usize {
        self.global.len()
    }

    /// Flat index of an orbital tuple in this array's packing
    pub fn flatten(&self, indices: &OrbitalIndices) -> std::result::Result<usize, CoreError> {
        T::flatten(self.dim, indices)
    }

    /// Whether the slot exists on any process
    pub fn has(&self, indices: &OrbitalIndices) -> bool {
        self.flatten(indices)
            .map(|flat| self.global.binary_search(&flat).is_ok())
            .unwrap_or(false)
    }

    /// Whether the slot is held by this process
    pub fn has_local_index(&self, indices: &OrbitalIndices) -> bool {
        self.flatten(indices)
            .map(|flat| self.positions.contains_key(&flat))
            .unwrap_or(false)
    }

    fn local_position(&self, indices: &OrbitalIndices) -> Result<usize> {
        let flat = self
            .flatten(indices)
            .map_err(|_| OpError::IndexNotFound(*indices))?;
        if let Some(&pos) = self.positions.get(&flat) {
            return Ok(pos);
        }
        if self.global.binary_search(&flat).is_ok() {
            Err(OpError::NotLocal(*indices))
        } else {
            Err(OpError::IndexNotFound(*indices))
        }
    }

    /// Matrices of the slot at `indices`
    pub fn get(&self, indices: &OrbitalIndices) -> Result<&[M]> {
        let pos = self.local_position(indices)?;
        Ok(&self.slots[pos])
    }

    pub fn get_mut(&mut self, indices: &OrbitalIndices) -> Result<&mut [M]> {
        let pos = self.local_position(indices)?;
        Ok(&mut self.slots[pos])
    }

    /// Matrices of the `index`-th local slot
    pub fn local_element(&self, index: usize) -> Result<&[M]> {
        self.slots
            .get(index)
            .map(Vec::as_slice)
            .ok_or(OpError::PositionOutOfRange {
                index,
                len: self.slots.len(),
            })
    }

    pub fn local_element_mut(&mut self, index: usize) -> Result<&mut [M]> {
        let len = self.slots.len();
        self.slots
            .get_mut(index)
            .map(Vec::as_mut_slice)
            .ok_or(OpError::PositionOutOfRange { index, len })
    }

    fn global_position(&self, index: usize) -> Result<usize> {
        let flat = *self.global.get(index).ok_or(OpError::PositionOutOfRange {
            index,
            len: self.global.len(),
        })?;
        match self.positions.get(&flat) {
            Some(&pos) => Ok(pos),
            None => Err(OpError::NotLocal(T::unflatten(self.dim, flat)?)),
        }
    }

    /// Matrices of the `index`-th global slot, if held locally
    pub fn global_element(&self, index: usize) -> Result<&[M]> {
        let pos = self.global_position(index)?;
        Ok(&self.slots[pos])
    }

    pub fn global_element_mut(&mut self, index: usize) -> Result<&mut [M]> {
        let pos = self.global_position(index)?;
        Ok(&mut self.slots[pos])
    }

    /// Orbital tuple of the `index`-th local slot
    pub fn unmap_local_index(&self, index: usize) -> Result<OrbitalIndices> {
        let flat = *self.local.get(index).ok_or(OpError::PositionOutOfRange {
            index,
            len: self.local.len(),
        })?;
        Ok(T::unflatten(self.dim, flat)?)
    }

    /// Flat indices of the local slots, in storage order
    pub fn local_flats(&self) -> &[usize] {
        &self.local
    }

    pub fn slots(&self) -> &[Vec<M>] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Vec<M>] {
        &mut self.slots
    }
}
