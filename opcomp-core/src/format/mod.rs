//! Binary format definitions for disk-staged builds
//!
//! Pure data structure definitions for the staging wire format. No I/O.

pub mod constants;
pub mod header;

pub use constants::STAGING_EXTENSION;
pub use header::{RecordHeader, StagingHeader};
