//! Symmetry-sector labels carried by operator matrices

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// Quantum numbers of one symmetry sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpinQuantum {
    pub particle_number: i32,
    /// Twice the total spin
    pub total_spin: i32,
    /// Spatial symmetry irrep
    pub irrep: u8,
}

impl SpinQuantum {
    pub const fn new(particle_number: i32, total_spin: i32, irrep: u8) -> Self {
        Self {
            particle_number,
            total_spin,
            irrep,
        }
    }
}

impl core::fmt::Display for SpinQuantum {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "N={} 2S={} irrep={}",
            self.particle_number, self.total_spin, self.irrep
        )
    }
}

/// Build pattern to per-step quantum numbers, for operators coupled in
/// more than one step
pub type QuantumLadder = BTreeMap<String, Vec<SpinQuantum>>;

/// Full label of one operator realisation within a slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorSector {
    /// Net quantum numbers of the operator
    pub delta: SpinQuantum,
    /// Coupling order, e.g. `((CC)D)`; empty for single-step operators
    pub build_pattern: String,
    pub ladder: QuantumLadder,
}

impl OperatorSector {
    /// A single-step sector with no ladder
    pub fn single(delta: SpinQuantum) -> Self {
        Self {
            delta,
            build_pattern: String::new(),
            ladder: QuantumLadder::new(),
        }
    }

    /// A multi-step sector whose ladder holds `steps` under `build_pattern`.
    /// The final step is the operator's net delta.
    pub fn coupled(build_pattern: &str, steps: Vec<SpinQuantum>) -> Self {
        let delta = steps.last().copied().unwrap_or_default();
        let mut ladder = QuantumLadder::new();
        ladder.insert(String::from(build_pattern), steps);
        Self {
            delta,
            build_pattern: String::from(build_pattern),
            ladder,
        }
    }

    /// Quantum numbers realised under `pattern`, if recorded
    pub fn ladder_for_pattern(&self, pattern: &str) -> Option<&[SpinQuantum]> {
        self.ladder.get(pattern).map(Vec::as_slice)
    }

    /// Identity of this realisation within its slot
    pub fn key(&self) -> (SpinQuantum, &QuantumLadder) {
        (self.delta, &self.ladder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_coupled_sector_ladder() {
        let steps = vec![SpinQuantum::new(2, 2, 0), SpinQuantum::new(1, 1, 0)];
        let sector = OperatorSector::coupled("((CC)D)", steps.clone());
        assert_eq!(sector.delta, SpinQuantum::new(1, 1, 0));
        assert_eq!(sector.ladder_for_pattern("((CC)D)"), Some(steps.as_slice()));
        assert_eq!(sector.ladder_for_pattern("(C(CD))"), None);
    }

    #[test]
    fn test_keys_distinguish_ladders_with_equal_delta() {
        let a = OperatorSector::coupled(
            "((CC)D)",
            vec![SpinQuantum::new(2, 0, 0), SpinQuantum::new(1, 1, 0)],
        );
        let b = OperatorSector::coupled(
            "((CC)D)",
            vec![SpinQuantum::new(2, 2, 0), SpinQuantum::new(1, 1, 0)],
        );
        assert_eq!(a.delta, b.delta);
        assert_ne!(a.key(), b.key());
    }
}
