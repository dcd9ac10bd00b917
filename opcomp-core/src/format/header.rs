//! Staging-file header and record framing
//!
//! A staging file is the header followed by `record_count` records. Each
//! record is a [`RecordHeader`] followed by `payload_len` bytes written by
//! the matrix's own serializer.

use core::mem::size_of;

use crate::category::OperatorCategory;
use crate::error::{CoreError, Result};

/// Fixed header at the start of every staging file (little-endian)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StagingHeader {
    /// Magic bytes: "OPST"
    pub magic: [u8; 4],
    /// Format version
    pub version: u8,
    /// Operator category tag
    pub category: u8,
    /// Number of orbital indices per slot
    pub num_indices: u8,
    /// Reserved flag byte
    pub flags: u8,
    /// Unique id of the component that wrote the file
    pub component_id: u64,
    /// Number of records following the header
    pub record_count: u64,
    /// Reserved space for future extensions
    pub reserved: [u8; 8],
}

impl StagingHeader {
    /// Magic bytes for staging files
    pub const MAGIC: [u8; 4] = super::constants::STAGING_MAGIC;

    /// Current format version
    pub const VERSION: u8 = super::constants::STAGING_VERSION;

    /// Size of the header in bytes
    pub const SIZE: usize = size_of::<Self>();

    /// Header for a component's staging file with no records yet
    pub const fn new(category: OperatorCategory, component_id: u64) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            category: category.to_u8(),
            num_indices: category.num_indices() as u8,
            flags: 0,
            component_id,
            record_count: 0,
            reserved: [0; 8],
        }
    }

    /// Validate the header magic and version
    pub fn is_valid(&self) -> bool {
        self.magic == Self::MAGIC && self.version <= Self::VERSION
    }

    /// Category recorded in the header
    pub fn category(&self) -> Result<OperatorCategory> {
        OperatorCategory::try_from(self.category)
    }

    /// Parse header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CoreError::InsufficientBuffer);
        }

        if bytes[0..4] != Self::MAGIC {
            return Err(CoreError::InvalidHeader);
        }

        let version = bytes[4];
        if version > Self::VERSION {
            return Err(CoreError::UnsupportedFormat);
        }

        let category = OperatorCategory::try_from(bytes[5])?;
        if bytes[6] as usize != category.num_indices() {
            return Err(CoreError::CorruptedData);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&bytes[24..32]);

        Ok(Self {
            magic: Self::MAGIC,
            version,
            category: bytes[5],
            num_indices: bytes[6],
            flags: bytes[7],
            component_id: read_u64(bytes, 8),
            record_count: read_u64(bytes, 16),
            reserved,
        })
    }

    /// Convert header to bytes array
    pub fn to_bytes_array(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.magic[0];
        bytes[1] = self.magic[1];
        bytes[2] = self.magic[2];
        bytes[3] = self.magic[3];
        bytes[4] = self.version;
        bytes[5] = self.category;
        bytes[6] = self.num_indices;
        bytes[7] = self.flags;
        write_u64(&mut bytes, 8, self.component_id);
        write_u64(&mut bytes, 16, self.record_count);
        bytes[24..32].copy_from_slice(&self.reserved);
        bytes
    }
}

/// Framing in front of each serialized matrix
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordHeader {
    /// Flat index of the slot the matrix belongs to
    pub flat_index: u64,
    /// Position of the matrix inside its slot
    pub position: u64,
    /// Length of the serialized matrix in bytes
    pub payload_len: u64,
}

impl RecordHeader {
    /// Size of a record header in bytes
    pub const SIZE: usize = size_of::<Self>();

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CoreError::InsufficientBuffer);
        }
        Ok(Self {
            flat_index: read_u64(bytes, 0),
            position: read_u64(bytes, 8),
            payload_len: read_u64(bytes, 16),
        })
    }

    pub fn to_bytes_array(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        write_u64(&mut bytes, 0, self.flat_index);
        write_u64(&mut bytes, 8, self.position);
        write_u64(&mut bytes, 16, self.payload_len);
        bytes
    }
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

fn write_u64(bytes: &mut [u8], at: usize, value: u64) {
    bytes[at..at + 8].copy_from_slice(&value.to_le_bytes());
}
