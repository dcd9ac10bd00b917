//! Format constants for staging files

/// Extension of disk-staged build files
pub const STAGING_EXTENSION: &str = "tmp";

/// Magic bytes at the start of a staging file
pub const STAGING_MAGIC: [u8; 4] = *b"OPST";

/// Current staging format version
pub const STAGING_VERSION: u8 = 1;
