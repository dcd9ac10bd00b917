use std::marker::PhantomData;
use std::path::PathBuf;

use hashbrown::HashMap;
use opcomp_core::{
    CoreError, OperatorCategory, OperatorKind, OperatorSector, OrbitalIndices, SpinQuantum,
    Topology,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use super::OperatorComponentBase;
use crate::config::{BuildStrategy, ComponentConfig};
use crate::distributed::DistributedArray;
use crate::error::{OpError, Result};
use crate::matrix::{OperatorBasis, OperatorMatrix};
use crate::parallel::for_all_operators;
use crate::registry::ComponentRegistry;
use crate::staging::StagingFile;

/// Operators of category `K`, stored in the topology `K` is bound to
pub struct OperatorComponent<K: OperatorKind, M: OperatorMatrix> {
    ops: DistributedArray<K::Topology, M>,
    core: bool,
    deriv: bool,
    unique_id: u64,
    config: ComponentConfig,
    _kind: PhantomData<K>,
}

#[derive(Serialize)]
#[serde(bound(serialize = "M: Serialize"))]
struct SnapshotRef<'a, T: Topology, M> {
    category: OperatorCategory,
    core: bool,
    deriv: bool,
    ops: &'a DistributedArray<T, M>,
    unique_id: u64,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "M: DeserializeOwned"))]
struct Snapshot<T: Topology, M> {
    category: OperatorCategory,
    core: bool,
    deriv: bool,
    ops: DistributedArray<T, M>,
    unique_id: u64,
}

impl<K: OperatorKind, M: OperatorMatrix> OperatorComponent<K, M> {
    /// Empty component taking the next id from `registry`
    pub fn new(registry: &ComponentRegistry, config: ComponentConfig) -> Self {
        Self::with_core(registry, config, false)
    }

    pub fn with_core(registry: &ComponentRegistry, config: ComponentConfig, core: bool) -> Self {
        let unique_id = registry.next_id();
        Self {
            ops: DistributedArray::new(config.partition),
            core,
            deriv: false,
            unique_id,
            config,
            _kind: PhantomData,
        }
    }

    /// Restore a component written by [`to_json`](OperatorComponentBase::to_json).
    ///
    /// The restored id is reserved in `registry` so later components never
    /// reuse it.
    pub fn from_json(
        json: &str,
        registry: &ComponentRegistry,
        config: ComponentConfig,
    ) -> Result<Self> {
        let snapshot: Snapshot<K::Topology, M> = serde_json::from_str(json)?;
        if snapshot.category != K::CATEGORY {
            return Err(OpError::CategoryMismatch {
                expected: K::CATEGORY,
                found: snapshot.category,
            });
        }
        let mut ops = snapshot.ops;
        ops.reindex()?;
        registry.observe(snapshot.unique_id);
        debug!(
            category = %K::CATEGORY,
            id = snapshot.unique_id,
            slots = ops.local_nnz(),
            "component restored"
        );
        Ok(Self {
            ops,
            core: snapshot.core,
            deriv: snapshot.deriv,
            unique_id: snapshot.unique_id,
            config,
            _kind: PhantomData,
        })
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    /// Where an out-of-core build stages this component
    pub fn staging_path(&self) -> PathBuf {
        self.config.staging_dir.join(self.unique_filename())
    }

    /// Build with an explicit strategy instead of the configured one
    pub fn build_with(&mut self, basis: &M::Basis, strategy: BuildStrategy) -> Result<()> {
        if self.ops.is_populated() {
            return Err(OpError::AlreadyBuilt {
                category: K::CATEGORY,
                id: self.unique_id,
            });
        }
        let strategy =
            strategy.resolve(K::Topology::NUM_INDICES, self.config.out_of_core_min_indices);
        debug!(category = %K::CATEGORY, id = self.unique_id, ?strategy, "building component");

        if let Err(err) = self.try_build(basis, strategy) {
            self.ops.clear();
            return Err(err);
        }
        info!(
            category = %K::CATEGORY,
            id = self.unique_id,
            local = self.ops.local_nnz(),
            global = self.ops.global_nnz(),
            "component built"
        );
        Ok(())
    }

    fn try_build(&mut self, basis: &M::Basis, strategy: BuildStrategy) -> Result<()> {
        self.populate(basis)?;
        match strategy {
            BuildStrategy::OutOfCore => self.build_out_of_core(basis),
            BuildStrategy::InCore | BuildStrategy::Auto => self.build_in_core(basis),
        }
    }

    /// Create the slots and their unbuilt templates
    fn populate(&mut self, basis: &M::Basis) -> Result<()> {
        let dim = basis.num_orbitals();
        let mut pending: HashMap<usize, (OrbitalIndices, Vec<OperatorSector>)> = HashMap::new();

        for indices in K::Topology::enumerate(basis.orbitals()) {
            let flat = K::Topology::flatten(dim, &indices)?;
            let sectors = basis.sectors(K::CATEGORY, &indices);
            if sectors.is_empty() {
                continue;
            }
            // below three indices a slot is addressed by delta alone
            let coupled = K::Topology::NUM_INDICES >= 3;
            for (n, sector) in sectors.iter().enumerate() {
                let clash = |other: &OperatorSector| {
                    if coupled {
                        other.key() == sector.key()
                    } else {
                        other.delta == sector.delta
                    }
                };
                if sectors[..n].iter().any(clash) {
                    return Err(OpError::DuplicateSector {
                        sector: sector.delta,
                        indices,
                    });
                }
            }
            pending.insert(flat, (indices, sectors));
        }

        let flats = pending.keys().copied().collect();
        self.ops.populate(dim, flats, |flat| -> Result<Vec<M>> {
            let (indices, sectors) = pending
                .remove(&flat)
                .ok_or(OpError::Core(CoreError::IndexOutOfBounds))?;
            Ok(sectors
                .into_iter()
                .map(|sector| M::template(K::CATEGORY, indices, sector))
                .collect())
        })
    }

    fn build_in_core(&mut self, basis: &M::Basis) -> Result<()> {
        for_all_operators(self.ops.slots_mut(), self.config.num_threads, |matrix| {
            Ok(matrix.build(basis)?)
        })
    }

    /// Build one matrix at a time, parking each in the staging file, then
    /// read them all back
    fn build_out_of_core(&mut self, basis: &M::Basis) -> Result<()> {
        let path = self.staging_path();
        let mut staging = StagingFile::new(
            &path,
            K::CATEGORY,
            self.unique_id,
            self.config.keep_staging_files,
        );

        let flats = self.ops.local_flats().to_vec();
        staging.begin_write()?;
        let mut order = Vec::new();
        for (slot_pos, (slot, &flat)) in self.ops.slots_mut().iter_mut().zip(&flats).enumerate() {
            for (position, matrix) in slot.iter_mut().enumerate() {
                matrix.build(basis)?;
                staging.write_record(flat, position, &*matrix)?;
                matrix.deallocate();
                order.push((slot_pos, flat as u64, position));
            }
        }
        staging.finish_write()?;

        let slots = self.ops.slots_mut();
        let mut expected = order.into_iter();
        let corrupt = |reason: String| OpError::CorruptStaging {
            path: path.clone(),
            reason,
        };
        let count = staging.read_records(|record, reader| {
            let (slot_pos, flat, position) = expected
                .next()
                .ok_or_else(|| corrupt("more records than matrices".into()))?;
            if record.flat_index != flat || record.position != position as u64 {
                return Err(corrupt(format!(
                    "record ({}, {}) out of order, expected ({flat}, {position})",
                    record.flat_index, record.position
                )));
            }
            slots[slot_pos][position] = M::read_from(reader).map_err(|source| OpError::Staging {
                path: path.clone(),
                source,
            })?;
            Ok(())
        })?;

        info!(
            category = %K::CATEGORY,
            id = self.unique_id,
            records = count,
            path = %path.display(),
            "staged build read back"
        );
        Ok(())
    }

    fn ladder_position(slot: &[M], ladder: &[SpinQuantum]) -> Option<usize> {
        let pattern = &slot.first()?.sector().build_pattern;
        slot.iter()
            .position(|m| m.sector().ladder_for_pattern(pattern) == Some(ladder))
    }
}

impl<K: OperatorKind, M: OperatorMatrix> OperatorComponentBase<M> for OperatorComponent<K, M> {
    fn category(&self) -> OperatorCategory {
        K::CATEGORY
    }

    fn unique_id(&self) -> u64 {
        self.unique_id
    }

    fn build(&mut self, basis: &M::Basis) -> Result<()> {
        self.build_with(basis, self.config.strategy)
    }

    fn renormalise_transform(
        &mut self,
        rotations: &[M::Rotation],
        state_info: &M::StateInfo,
    ) -> Result<()> {
        debug!(category = %K::CATEGORY, id = self.unique_id, "renormalising component");
        for_all_operators(self.ops.slots_mut(), self.config.num_threads, |matrix| {
            Ok(matrix.renormalise_transform(rotations, state_info)?)
        })
    }

    fn clear(&mut self) {
        self.ops.clear();
    }

    fn is_built(&self) -> bool {
        self.ops.is_populated()
    }

    fn local_count(&self) -> usize {
        self.ops.local_nnz()
    }

    fn global_count(&self) -> usize {
        self.ops.global_nnz()
    }

    fn has(&self, indices: OrbitalIndices) -> bool {
        self.ops.has(&indices)
    }

    fn has_local_index(&self, indices: OrbitalIndices) -> bool {
        self.ops.has_local_index(&indices)
    }

    fn get_element(&self, indices: OrbitalIndices) -> Result<&[M]> {
        self.ops.get(&indices)
    }

    fn get_element_mut(&mut self, indices: OrbitalIndices) -> Result<&mut [M]> {
        self.ops.get_mut(&indices)
    }

    fn get_local_element(&self, index: usize) -> Result<&[M]> {
        self.ops.local_element(index)
    }

    fn get_local_element_mut(&mut self, index: usize) -> Result<&mut [M]> {
        self.ops.local_element_mut(index)
    }

    fn get_global_element(&self, index: usize) -> Result<&[M]> {
        self.ops.global_element(index)
    }

    fn get_global_element_mut(&mut self, index: usize) -> Result<&mut [M]> {
        self.ops.global_element_mut(index)
    }

    fn array_layout(&self) -> Result<Vec<OrbitalIndices>> {
        (0..self.ops.local_nnz())
            .map(|i| self.ops.unmap_local_index(i))
            .collect()
    }

    fn get_op_rep(&self, sector: SpinQuantum, indices: OrbitalIndices) -> Result<&M> {
        if indices.k().is_some() {
            return Err(OpError::UnexpectedThirdIndex(indices));
        }
        self.ops
            .get(&indices)?
            .iter()
            .find(|m| m.sector().delta == sector)
            .ok_or(OpError::SectorNotFound { sector, indices })
    }

    fn get_op_rep_mut(&mut self, sector: SpinQuantum, indices: OrbitalIndices) -> Result<&mut M> {
        if indices.k().is_some() {
            return Err(OpError::UnexpectedThirdIndex(indices));
        }
        self.ops
            .get_mut(&indices)?
            .iter_mut()
            .find(|m| m.sector().delta == sector)
            .ok_or(OpError::SectorNotFound { sector, indices })
    }

    fn get_op_rep_ladder(&self, ladder: &[SpinQuantum], indices: OrbitalIndices) -> Result<&M> {
        if indices.k().is_none() {
            return Err(OpError::ThirdIndexRequired(indices));
        }
        let slot = self.ops.get(&indices)?;
        Self::ladder_position(slot, ladder)
            .map(|pos| &slot[pos])
            .ok_or_else(|| OpError::LadderNotFound {
                ladder: ladder.to_vec(),
                indices,
            })
    }

    fn get_op_rep_ladder_mut(
        &mut self,
        ladder: &[SpinQuantum],
        indices: OrbitalIndices,
    ) -> Result<&mut M> {
        if indices.k().is_none() {
            return Err(OpError::ThirdIndexRequired(indices));
        }
        let slot = self.ops.get_mut(&indices)?;
        match Self::ladder_position(slot, ladder) {
            Some(pos) => Ok(&mut slot[pos]),
            None => Err(OpError::LadderNotFound {
                ladder: ladder.to_vec(),
                indices,
            }),
        }
    }

    fn is_local(&self) -> bool {
        self.ops.is_local()
    }

    fn set_local(&mut self, local: bool) {
        self.ops.set_local(local);
    }

    fn is_core(&self) -> bool {
        self.core
    }

    fn set_core(&mut self, core: bool) {
        self.core = core;
    }

    fn is_deriv(&self) -> bool {
        self.deriv
    }

    fn set_deriv(&mut self, deriv: bool) {
        self.deriv = deriv;
    }

    fn to_json(&self) -> Result<String> {
        let snapshot = SnapshotRef {
            category: K::CATEGORY,
            core: self.core,
            deriv: self.deriv,
            ops: &self.ops,
            unique_id: self.unique_id,
        };
        Ok(serde_json::to_string(&snapshot)?)
    }
}
