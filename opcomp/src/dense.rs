//! Reference numerics: block-diagonal operators over a site basis
//!
//! [`DenseBlockOperator`] stores one dense square block per symmetry sector
//! of the state space. A [`SiteBasis`] builds matrices either from its
//! configurations, with a deterministic kernel of the operator label, or
//! from the operators of an already built [`LowerBlock`], whose blocks are
//! embedded into the larger state space.

use std::io::{self, Read, Write};

use hashbrown::HashMap;
use opcomp_core::{
    OperatorCategory, OperatorSector, OrbitalIndices, QuantumLadder, SpinQuantum, TopologyKind,
};
use serde::{Deserialize, Serialize};

use crate::component::OperatorComponentBase;
use crate::error::Result as OpResult;
use crate::matrix::{MatrixError, OperatorBasis, OperatorMatrix};

/// Dimensions of the symmetry sectors of a state space
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateInfo {
    pub sector_dims: Vec<usize>,
}

impl StateInfo {
    pub fn new(sector_dims: Vec<usize>) -> Self {
        Self { sector_dims }
    }

    pub fn total_dim(&self) -> usize {
        self.sector_dims.iter().sum()
    }
}

/// Row-major dense matrix block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock")]
pub struct DenseBlock {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// Unchecked wire form of a [`DenseBlock`]
#[derive(Deserialize)]
struct RawBlock {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<RawBlock> for DenseBlock {
    type Error = MatrixError;

    fn try_from(raw: RawBlock) -> Result<Self, MatrixError> {
        DenseBlock::from_vec(raw.rows, raw.cols, raw.data)
    }
}

impl DenseBlock {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |r, c| if r == c { 1.0 } else { 0.0 })
    }

    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let data = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r, c)))
            .map(|(r, c)| f(r, c))
            .collect();
        Self { rows, cols, data }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, MatrixError> {
        if data.len() != rows * cols {
            return Err(MatrixError::ShapeMismatch {
                expected: rows * cols,
                found: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub fn transpose(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |r, c| self.data[c * self.cols + r])
    }

    /// Square `n x n` block holding `self` in its top-left corner
    pub fn embed(&self, n: usize) -> Result<DenseBlock, MatrixError> {
        if self.rows != self.cols || self.rows > n {
            return Err(MatrixError::ShapeMismatch {
                expected: n,
                found: self.rows.max(self.cols),
            });
        }
        Ok(Self::from_fn(n, n, |r, c| {
            if r < self.rows && c < self.cols {
                self.data[r * self.cols + c]
            } else {
                0.0
            }
        }))
    }

    pub fn matmul(&self, other: &DenseBlock) -> Result<DenseBlock, MatrixError> {
        if self.cols != other.rows {
            return Err(MatrixError::ShapeMismatch {
                expected: self.cols,
                found: other.rows,
            });
        }
        let mut out = DenseBlock::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[r * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                for c in 0..other.cols {
                    out.data[r * other.cols + c] += a * other.data[k * other.cols + c];
                }
            }
        }
        Ok(out)
    }
}

/// Operators of an already built block, keyed by category and orbitals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LowerBlock {
    num_orbitals: usize,
    orbitals: Vec<usize>,
    ops: HashMap<(OperatorCategory, OrbitalIndices), Vec<DenseBlockOperator>>,
}

impl LowerBlock {
    pub fn new(num_orbitals: usize, orbitals: Vec<usize>) -> Self {
        Self {
            num_orbitals,
            orbitals,
            ops: HashMap::new(),
        }
    }

    /// Copy every local slot of a built component
    pub fn absorb(
        &mut self,
        component: &dyn OperatorComponentBase<DenseBlockOperator>,
    ) -> OpResult<()> {
        let category = component.category();
        for (pos, indices) in component.array_layout()?.into_iter().enumerate() {
            let ops = component.get_local_element(pos)?;
            self.ops.insert((category, indices), ops.to_vec());
        }
        Ok(())
    }

    /// Add the realisations of one slot directly
    pub fn insert(
        &mut self,
        category: OperatorCategory,
        indices: OrbitalIndices,
        ops: Vec<DenseBlockOperator>,
    ) {
        self.ops.insert((category, indices), ops);
    }

    pub fn slot(
        &self,
        category: OperatorCategory,
        indices: OrbitalIndices,
    ) -> &[DenseBlockOperator] {
        self.ops
            .get(&(category, indices))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn find(
        &self,
        category: OperatorCategory,
        indices: OrbitalIndices,
        sector: &OperatorSector,
    ) -> Option<&DenseBlockOperator> {
        self.slot(category, indices)
            .iter()
            .find(|op| op.sector.key() == sector.key())
    }
}

/// Where a [`SiteBasis`] takes its matrices from
#[derive(Debug, Clone, PartialEq)]
pub enum BasisSource {
    /// Configurations of the block's own orbitals
    Configurations,
    /// A built lower-level block
    Lower(LowerBlock),
}

/// Orbitals of a block together with its state space
#[derive(Debug, Clone, PartialEq)]
pub struct SiteBasis {
    num_orbitals: usize,
    orbitals: Vec<usize>,
    state_info: StateInfo,
    source: BasisSource,
}

impl SiteBasis {
    pub fn new(num_orbitals: usize, orbitals: Vec<usize>, state_info: StateInfo) -> Self {
        Self {
            num_orbitals,
            orbitals,
            state_info,
            source: BasisSource::Configurations,
        }
    }

    /// Block spanning every orbital of the system
    pub fn full(num_orbitals: usize, state_info: StateInfo) -> Self {
        Self::new(num_orbitals, (0..num_orbitals).collect(), state_info)
    }

    /// Basis whose operators are those of `lower`, embedded into a state
    /// space with `state_info`
    pub fn from_lower(lower: LowerBlock, state_info: StateInfo) -> Self {
        Self {
            num_orbitals: lower.num_orbitals,
            orbitals: lower.orbitals.clone(),
            state_info,
            source: BasisSource::Lower(lower),
        }
    }

    pub fn state_info(&self) -> &StateInfo {
        &self.state_info
    }

    pub fn source(&self) -> &BasisSource {
        &self.source
    }
}

impl OperatorBasis for SiteBasis {
    fn num_orbitals(&self) -> usize {
        self.num_orbitals
    }

    fn orbitals(&self) -> &[usize] {
        &self.orbitals
    }

    fn sectors(&self, category: OperatorCategory, indices: &OrbitalIndices) -> Vec<OperatorSector> {
        if let BasisSource::Lower(lower) = &self.source {
            return lower
                .slot(category, *indices)
                .iter()
                .map(|op| op.sector.clone())
                .collect();
        }
        let dn = category.particle_change();
        let single = |spin| OperatorSector::single(SpinQuantum::new(dn, spin, 0));
        match category.num_indices() {
            0 => vec![single(0)],
            1 => vec![single(1)],
            2 if category.topology() == TopologyKind::Triangular && indices.i() == indices.j() => {
                vec![single(0)]
            }
            2 => vec![single(0), single(2)],
            _ => {
                let factors: Vec<u8> = category.factors().collect();
                let pattern = coupling_pattern(&factors);
                let dn12: i32 = factors
                    .iter()
                    .take(2)
                    .map(|&f| if f == b'C' { 1 } else { -1 })
                    .sum();
                [(0, 1), (2, 1), (2, 3)]
                    .into_iter()
                    .map(|(s12, s)| {
                        OperatorSector::coupled(
                            &pattern,
                            vec![SpinQuantum::new(dn12, s12, 0), SpinQuantum::new(dn, s, 0)],
                        )
                    })
                    .collect()
            }
        }
    }
}

/// Left-nested coupling order, e.g. `((CC)D)`
fn coupling_pattern(factors: &[u8]) -> String {
    let letters: String = factors.iter().map(|&f| f as char).collect();
    match letters.len() {
        3 => format!("(({}){})", &letters[..2], &letters[2..]),
        _ => format!("({letters})"),
    }
}

/// Block-diagonal operator matrix with one block per state sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseBlockOperator {
    category: OperatorCategory,
    indices: OrbitalIndices,
    sector: OperatorSector,
    blocks: Vec<DenseBlock>,
}

impl DenseBlockOperator {
    pub fn category(&self) -> OperatorCategory {
        self.category
    }

    pub fn indices(&self) -> OrbitalIndices {
        self.indices
    }

    pub fn blocks(&self) -> &[DenseBlock] {
        &self.blocks
    }

    /// Whether element storage is currently held
    pub fn is_allocated(&self) -> bool {
        !self.blocks.is_empty()
    }

    fn seed(&self, sector: usize) -> usize {
        let ladder: usize = self
            .sector
            .ladder
            .values()
            .flatten()
            .map(|q| q.total_spin.unsigned_abs() as usize)
            .sum();
        self.indices.as_slice().iter().sum::<usize>()
            + self.category.to_u8() as usize
            + self.sector.delta.particle_number.unsigned_abs() as usize
            + self.sector.delta.total_spin.unsigned_abs() as usize
            + ladder
            + sector
    }

    fn element(seed: usize, row: usize, col: usize) -> f64 {
        if (row + 2 * col + seed) % 3 == 0 {
            (seed as f64 + 1.0) * 0.5 + row as f64 - 0.25 * col as f64
        } else {
            0.0
        }
    }
}

impl OperatorMatrix for DenseBlockOperator {
    type Basis = SiteBasis;
    type Rotation = DenseBlock;
    type StateInfo = StateInfo;

    fn template(
        category: OperatorCategory,
        indices: OrbitalIndices,
        sector: OperatorSector,
    ) -> Self {
        Self {
            category,
            indices,
            sector,
            blocks: Vec::new(),
        }
    }

    fn sector(&self) -> &OperatorSector {
        &self.sector
    }

    fn build(&mut self, basis: &SiteBasis) -> Result<(), MatrixError> {
        let dims = &basis.state_info.sector_dims;
        self.blocks = match &basis.source {
            BasisSource::Configurations => dims
                .iter()
                .enumerate()
                .map(|(s, &n)| {
                    let seed = self.seed(s);
                    DenseBlock::from_fn(n, n, |r, c| Self::element(seed, r, c))
                })
                .collect(),
            BasisSource::Lower(lower) => {
                let source = lower
                    .find(self.category, self.indices, &self.sector)
                    .ok_or(MatrixError::MissingOperator {
                        category: self.category,
                        indices: self.indices,
                    })?;
                if source.blocks.len() != dims.len() {
                    return Err(MatrixError::ShapeMismatch {
                        expected: dims.len(),
                        found: source.blocks.len(),
                    });
                }
                source
                    .blocks
                    .iter()
                    .zip(dims)
                    .map(|(block, &n)| block.embed(n))
                    .collect::<Result<_, _>>()?
            }
        };
        Ok(())
    }

    fn renormalise_transform(
        &mut self,
        rotations: &[DenseBlock],
        state_info: &StateInfo,
    ) -> Result<(), MatrixError> {
        if rotations.len() != self.blocks.len() {
            return Err(MatrixError::ShapeMismatch {
                expected: self.blocks.len(),
                found: rotations.len(),
            });
        }
        if state_info.sector_dims.len() != rotations.len() {
            return Err(MatrixError::ShapeMismatch {
                expected: rotations.len(),
                found: state_info.sector_dims.len(),
            });
        }

        let mut rotated = Vec::with_capacity(self.blocks.len());
        let dims = &state_info.sector_dims;
        for ((block, rotation), &dim) in self.blocks.iter().zip(rotations).zip(dims) {
            if rotation.cols != dim {
                return Err(MatrixError::ShapeMismatch {
                    expected: dim,
                    found: rotation.cols,
                });
            }
            rotated.push(rotation.transpose().matmul(block)?.matmul(rotation)?);
        }
        self.blocks = rotated;
        Ok(())
    }

    fn deallocate(&mut self) {
        self.blocks = Vec::new();
    }

    fn write_to(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&[self.category.to_u8(), self.indices.len() as u8])?;
        for &i in self.indices.as_slice() {
            writer.write_all(&(i as u64).to_le_bytes())?;
        }
        write_sector(writer, &self.sector)?;
        writer.write_all(&(self.blocks.len() as u64).to_le_bytes())?;
        for block in &self.blocks {
            writer.write_all(&(block.rows as u64).to_le_bytes())?;
            writer.write_all(&(block.cols as u64).to_le_bytes())?;
            writer.write_all(bytemuck::cast_slice(&block.data))?;
        }
        Ok(())
    }

    fn read_from(reader: &mut dyn Read) -> io::Result<Self> {
        let mut head = [0u8; 2];
        reader.read_exact(&mut head)?;
        let category = OperatorCategory::try_from(head[0]).map_err(invalid)?;
        let indices: Vec<usize> = (0..head[1])
            .map(|_| read_usize(reader))
            .collect::<io::Result<_>>()?;
        let indices = OrbitalIndices::from_slice(&indices).map_err(invalid)?;
        let sector = read_sector(reader)?;

        let count = read_usize(reader)?;
        let mut blocks = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let rows = read_usize(reader)?;
            let cols = read_usize(reader)?;
            let len = rows
                .checked_mul(cols)
                .and_then(|n| n.checked_mul(std::mem::size_of::<f64>()))
                .ok_or_else(|| invalid("block size overflows"))?;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            blocks.push(DenseBlock {
                rows,
                cols,
                data: bytemuck::pod_collect_to_vec(&bytes),
            });
        }

        Ok(Self {
            category,
            indices,
            sector,
            blocks,
        })
    }
}

fn invalid(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

fn read_array<const N: usize>(reader: &mut dyn Read) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_usize(reader: &mut dyn Read) -> io::Result<usize> {
    let value = u64::from_le_bytes(read_array(reader)?);
    usize::try_from(value).map_err(invalid)
}

fn write_quantum(writer: &mut dyn Write, q: &SpinQuantum) -> io::Result<()> {
    writer.write_all(&q.particle_number.to_le_bytes())?;
    writer.write_all(&q.total_spin.to_le_bytes())?;
    writer.write_all(&[q.irrep])
}

fn read_quantum(reader: &mut dyn Read) -> io::Result<SpinQuantum> {
    let particle_number = i32::from_le_bytes(read_array(reader)?);
    let total_spin = i32::from_le_bytes(read_array(reader)?);
    let [irrep] = read_array(reader)?;
    Ok(SpinQuantum::new(particle_number, total_spin, irrep))
}

fn write_str(writer: &mut dyn Write, s: &str) -> io::Result<()> {
    writer.write_all(&(s.len() as u32).to_le_bytes())?;
    writer.write_all(s.as_bytes())
}

fn read_string(reader: &mut dyn Read) -> io::Result<String> {
    let len = u32::from_le_bytes(read_array(reader)?) as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(invalid)
}

fn write_sector(writer: &mut dyn Write, sector: &OperatorSector) -> io::Result<()> {
    write_quantum(writer, &sector.delta)?;
    write_str(writer, &sector.build_pattern)?;
    writer.write_all(&(sector.ladder.len() as u32).to_le_bytes())?;
    for (pattern, steps) in &sector.ladder {
        write_str(writer, pattern)?;
        writer.write_all(&(steps.len() as u32).to_le_bytes())?;
        for step in steps {
            write_quantum(writer, step)?;
        }
    }
    Ok(())
}

fn read_sector(reader: &mut dyn Read) -> io::Result<OperatorSector> {
    let delta = read_quantum(reader)?;
    let build_pattern = read_string(reader)?;
    let entries = u32::from_le_bytes(read_array(reader)?);
    let mut ladder = QuantumLadder::new();
    for _ in 0..entries {
        let pattern = read_string(reader)?;
        let len = u32::from_le_bytes(read_array(reader)?);
        let steps = (0..len)
            .map(|_| read_quantum(reader))
            .collect::<io::Result<Vec<_>>>()?;
        ladder.insert(pattern, steps);
    }
    Ok(OperatorSector {
        delta,
        build_pattern,
        ladder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::make_component;
    use crate::config::ComponentConfig;
    use crate::error::OpError;
    use crate::registry::ComponentRegistry;

    fn basis() -> SiteBasis {
        SiteBasis::full(4, StateInfo::new(vec![3, 2]))
    }

    #[test]
    fn test_sector_counts_by_arity() {
        let basis = basis();
        assert_eq!(basis.sectors(OperatorCategory::Ham, &OrbitalIndices::none()).len(), 1);
        assert_eq!(basis.sectors(OperatorCategory::Cre, &OrbitalIndices::one(2)).len(), 1);
        assert_eq!(
            basis.sectors(OperatorCategory::CreCre, &OrbitalIndices::two(1, 1)).len(),
            1
        );
        assert_eq!(
            basis.sectors(OperatorCategory::CreCre, &OrbitalIndices::two(0, 1)).len(),
            2
        );
        assert_eq!(
            basis.sectors(OperatorCategory::CreDes, &OrbitalIndices::two(1, 1)).len(),
            2
        );

        let triples = basis.sectors(OperatorCategory::CreCreDes, &OrbitalIndices::three(0, 1, 2));
        assert_eq!(triples.len(), 3);
        assert!(triples.iter().all(|s| s.build_pattern == "((CC)D)"));
        assert_eq!(triples[2].delta, SpinQuantum::new(1, 3, 0));
    }

    #[test]
    fn test_build_fills_one_block_per_sector() {
        let basis = basis();
        let sector = OperatorSector::single(SpinQuantum::new(1, 1, 0));
        let mut op =
            DenseBlockOperator::template(OperatorCategory::Cre, OrbitalIndices::one(1), sector);
        assert!(!op.is_allocated());
        op.build(&basis).unwrap();
        assert_eq!(op.blocks().len(), 2);
        assert_eq!(op.blocks()[0].rows(), 3);
        assert_eq!(op.blocks()[1].cols(), 2);
        op.deallocate();
        assert!(!op.is_allocated());
    }

    #[test]
    fn test_identity_rotation_preserves_blocks() {
        let basis = basis();
        let sector = OperatorSector::single(SpinQuantum::new(0, 0, 0));
        let indices = OrbitalIndices::two(0, 3);
        let mut op = DenseBlockOperator::template(OperatorCategory::CreDes, indices, sector);
        op.build(&basis).unwrap();
        let before = op.clone();
        let rotations = vec![DenseBlock::identity(3), DenseBlock::identity(2)];
        op.renormalise_transform(&rotations, basis.state_info()).unwrap();
        assert_eq!(op, before);
    }

    #[test]
    fn test_truncating_rotation() {
        let basis = basis();
        let sector = OperatorSector::single(SpinQuantum::new(1, 1, 0));
        let mut op =
            DenseBlockOperator::template(OperatorCategory::Cre, OrbitalIndices::one(0), sector);
        op.build(&basis).unwrap();

        // keep the first state of each sector
        let rotations = vec![
            DenseBlock::from_fn(3, 1, |r, _| if r == 0 { 1.0 } else { 0.0 }),
            DenseBlock::from_fn(2, 1, |r, _| if r == 0 { 1.0 } else { 0.0 }),
        ];
        let expected: Vec<f64> = op.blocks().iter().map(|b| b.get(0, 0).unwrap()).collect();
        op.renormalise_transform(&rotations, &StateInfo::new(vec![1, 1])).unwrap();
        assert_eq!(op.blocks()[0].data(), &[expected[0]]);
        assert_eq!(op.blocks()[1].data(), &[expected[1]]);
    }

    #[test]
    fn test_rotation_shape_errors() {
        let basis = basis();
        let sector = OperatorSector::single(SpinQuantum::new(1, 1, 0));
        let mut op =
            DenseBlockOperator::template(OperatorCategory::Cre, OrbitalIndices::one(0), sector);
        op.build(&basis).unwrap();
        let result = op.renormalise_transform(&[DenseBlock::identity(3)], basis.state_info());
        assert!(matches!(result, Err(MatrixError::ShapeMismatch { expected: 2, found: 1 })));
    }

    #[test]
    fn test_binary_stream_round_trip() {
        let basis = basis();
        let sector = basis
            .sectors(OperatorCategory::CreDesCre, &OrbitalIndices::three(3, 0, 1))
            .remove(1);
        let mut op = DenseBlockOperator::template(
            OperatorCategory::CreDesCre,
            OrbitalIndices::three(3, 0, 1),
            sector,
        );
        op.build(&basis).unwrap();

        let mut bytes = Vec::new();
        op.write_to(&mut bytes).unwrap();
        let restored = DenseBlockOperator::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(restored, op);
    }

    #[test]
    fn test_truncated_stream_fails() {
        let sector = OperatorSector::single(SpinQuantum::new(1, 1, 0));
        let mut op =
            DenseBlockOperator::template(OperatorCategory::Cre, OrbitalIndices::one(0), sector);
        op.build(&basis()).unwrap();
        let mut bytes = Vec::new();
        op.write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 4);
        assert!(DenseBlockOperator::read_from(&mut bytes.as_slice()).is_err());
    }

    #[test]
    fn test_deserialize_checks_block_length() {
        let short = serde_json::from_str::<DenseBlock>(r#"{"rows":2,"cols":2,"data":[1.0]}"#);
        assert!(short.is_err());
        let block: DenseBlock =
            serde_json::from_str(r#"{"rows":1,"cols":2,"data":[1.0,2.0]}"#).unwrap();
        assert_eq!(block.get(0, 1), Some(2.0));
    }

    #[test]
    fn test_embed_pads_with_zeros() {
        let block = DenseBlock::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let big = block.embed(3).unwrap();
        assert_eq!(big.data(), &[1.0, 2.0, 0.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(block.embed(1).is_err());
        assert!(DenseBlock::zeros(2, 3).embed(4).is_err());
    }

    fn lower_credes(registry: &ComponentRegistry, dir: &std::path::Path) -> LowerBlock {
        let mut credes = make_component::<DenseBlockOperator>(
            OperatorCategory::CreDes,
            registry,
            ComponentConfig::default().with_staging_dir(dir),
        );
        credes.build(&SiteBasis::full(2, StateInfo::new(vec![2, 1]))).unwrap();
        let mut lower = LowerBlock::new(2, vec![0, 1]);
        lower.absorb(credes.as_ref()).unwrap();
        lower
    }

    #[test]
    fn test_lower_block_operators_embed_into_larger_space() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ComponentRegistry::new();
        let lower = lower_credes(&registry, dir.path());
        let indices = OrbitalIndices::two(1, 0);
        let expected = lower.slot(OperatorCategory::CreDes, indices).to_vec();
        assert_eq!(expected.len(), 2);

        let basis = SiteBasis::from_lower(lower, StateInfo::new(vec![3, 2]));
        assert!(matches!(basis.source(), BasisSource::Lower(_)));
        let mut upper = make_component::<DenseBlockOperator>(
            OperatorCategory::CreDes,
            &registry,
            ComponentConfig::default().with_staging_dir(dir.path()),
        );
        upper.build(&basis).unwrap();
        assert_eq!(upper.global_count(), 4);

        for source in &expected {
            let built = upper.get_op_rep(source.sector().delta, indices).unwrap();
            for (small, big) in source.blocks().iter().zip(built.blocks()) {
                assert_eq!(big.rows(), small.rows() + 1);
                for r in 0..big.rows() {
                    for c in 0..big.cols() {
                        let want = small.get(r, c).unwrap_or(0.0);
                        assert_eq!(big.get(r, c), Some(want));
                    }
                }
            }
        }
    }

    #[test]
    fn test_lower_block_rejects_smaller_space() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ComponentRegistry::new();
        let lower = lower_credes(&registry, dir.path());
        let basis = SiteBasis::from_lower(lower, StateInfo::new(vec![1, 1]));
        let mut upper = make_component::<DenseBlockOperator>(
            OperatorCategory::CreDes,
            &registry,
            ComponentConfig::default().with_staging_dir(dir.path()),
        );
        assert!(matches!(
            upper.build(&basis),
            Err(OpError::Matrix(MatrixError::ShapeMismatch { .. }))
        ));
        assert_eq!(upper.global_count(), 0);
    }

    #[test]
    fn test_lower_block_without_category_yields_no_slots() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ComponentRegistry::new();
        let lower = lower_credes(&registry, dir.path());
        let basis = SiteBasis::from_lower(lower, StateInfo::new(vec![2, 1]));
        assert!(basis.sectors(OperatorCategory::Cre, &OrbitalIndices::one(0)).is_empty());

        let mut op = DenseBlockOperator::template(
            OperatorCategory::Cre,
            OrbitalIndices::one(0),
            OperatorSector::single(SpinQuantum::new(1, 1, 0)),
        );
        assert!(matches!(op.build(&basis), Err(MatrixError::MissingOperator { .. })));
    }

    #[test]
    fn test_matmul_shapes() {
        let a = DenseBlock::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = a.transpose();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.data(), &[14.0, 32.0, 32.0, 77.0]);
        assert!(a.matmul(&a).is_err());
    }
}
