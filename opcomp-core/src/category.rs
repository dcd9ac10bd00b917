//! Operator categories and their static storage binding
//!
//! Every category is declared once in the table below. The table generates
//! both the runtime [`OperatorCategory`] tag and one zero-sized marker type
//! per category implementing [`OperatorKind`], whose associated `Topology`
//! fixes the storage shape at compile time.

use crate::error::{CoreError, Result};
use crate::topology::{Dense2D, Dense3D, Linear, Singleton, Topology, TopologyKind, Triangular};

/// Compile-time description of an operator category
pub trait OperatorKind: Send + Sync + 'static {
    const CATEGORY: OperatorCategory;
    type Topology: Topology;
}

macro_rules! operator_categories {
    ($($name:ident = $tag:literal, $op:literal, $topology:ident;)*) => {
        /// Runtime tag of an operator category
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum OperatorCategory {
            $($name = $tag,)*
        }

        impl OperatorCategory {
            /// Every category, in tag order
            pub const ALL: &'static [OperatorCategory] = &[$(OperatorCategory::$name,)*];

            /// Name used as disk filename prefix
            pub const fn op_string(self) -> &'static str {
                match self {
                    $(OperatorCategory::$name => $op,)*
                }
            }

            /// Storage shape this category is bound to
            pub const fn topology(self) -> TopologyKind {
                match self {
                    $(OperatorCategory::$name => <$topology as Topology>::KIND,)*
                }
            }

            /// Convert from u8 representation
            pub const fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($tag => Some(OperatorCategory::$name),)*
                    _ => None,
                }
            }
        }

        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $name;

            impl OperatorKind for $name {
                const CATEGORY: OperatorCategory = OperatorCategory::$name;
                type Topology = $topology;
            }
        )*
    };
}

operator_categories! {
    Ham = 0, "HAM", Singleton;
    Cre = 1, "CRE", Linear;
    Des = 2, "DES", Linear;
    CreCre = 3, "CRECRE", Triangular;
    CreDes = 4, "CREDES", Dense2D;
    DesCre = 5, "DESCRE", Dense2D;
    CreDesComp = 6, "CREDESCOMP", Dense2D;
    DesDesComp = 7, "DESDESCOMP", Triangular;
    CreCreDesComp = 8, "CRECREDESCOMP", Linear;
    CreCreDes = 9, "CRECREDES", Dense3D;
    CreDesDes = 10, "CREDESDES", Dense3D;
    CreDesCre = 11, "CREDESCRE", Dense3D;
    CreCreCre = 12, "CRECRECRE", Dense3D;
    DesCreDes = 13, "DESCREDES", Dense3D;
    DesDesCre = 14, "DESDESCRE", Dense3D;
}

impl OperatorCategory {
    /// Convert to u8 representation
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Number of orbital indices addressing one slot
    pub const fn num_indices(self) -> usize {
        self.topology().num_indices()
    }

    /// Creation factors minus annihilation factors in the operator string
    pub fn particle_change(self) -> i32 {
        self.factors().map(|c| if c == b'C' { 1 } else { -1 }).sum()
    }

    /// Elementary factors as `C`/`D` letters, composite suffix excluded
    pub fn factors(self) -> impl Iterator<Item = u8> {
        let op = self.op_string();
        let body = op.strip_suffix("COMP").unwrap_or(op);
        body.as_bytes()
            .chunks(3)
            .filter_map(|chunk| match chunk {
                b"CRE" => Some(b'C'),
                b"DES" => Some(b'D'),
                _ => None,
            })
    }
}

impl TryFrom<u8> for OperatorCategory {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_u8(value).ok_or(CoreError::UnknownCategory)
    }
}

impl core::fmt::Display for OperatorCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.op_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_binding() {
        assert_eq!(OperatorCategory::Ham.topology(), TopologyKind::Singleton);
        assert_eq!(OperatorCategory::Cre.topology(), TopologyKind::Linear);
        assert_eq!(OperatorCategory::CreCre.topology(), TopologyKind::Triangular);
        assert_eq!(OperatorCategory::CreDes.topology(), TopologyKind::Dense2D);
        assert_eq!(OperatorCategory::CreCreDes.topology(), TopologyKind::Dense3D);
        assert_eq!(
            <CreCre as OperatorKind>::Topology::KIND,
            OperatorCategory::CreCre.topology()
        );
    }

    #[test]
    fn test_u8_round_trip() {
        for &category in OperatorCategory::ALL {
            assert_eq!(OperatorCategory::from_u8(category.to_u8()), Some(category));
        }
        assert_eq!(OperatorCategory::try_from(200), Err(CoreError::UnknownCategory));
    }

    #[test]
    fn test_particle_change() {
        assert_eq!(OperatorCategory::Ham.particle_change(), 0);
        assert_eq!(OperatorCategory::Cre.particle_change(), 1);
        assert_eq!(OperatorCategory::CreCre.particle_change(), 2);
        assert_eq!(OperatorCategory::CreDesComp.particle_change(), 0);
        assert_eq!(OperatorCategory::DesDesComp.particle_change(), -2);
        assert_eq!(OperatorCategory::CreCreCre.particle_change(), 3);
        assert_eq!(OperatorCategory::DesDesCre.particle_change(), -1);
    }

    #[test]
    fn test_factor_count_matches_arity_for_plain_operators() {
        for &category in OperatorCategory::ALL {
            let name = category.op_string();
            if category != OperatorCategory::Ham && !name.ends_with("COMP") {
                assert_eq!(category.factors().count(), category.num_indices(), "{name}");
            }
        }
    }
}
