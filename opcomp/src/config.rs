//! Configuration for component builds
//!
//! Controls where disk-staged builds write their temporary files, which
//! build strategy a component uses, and how work is spread over threads
//! and partitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::distributed::Partition;

/// How a component builds its matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// Out-of-core for categories with at least `out_of_core_min_indices`
    /// orbital indices, in-core otherwise
    #[default]
    Auto,
    /// Build every matrix in memory on the worker pool
    InCore,
    /// Build one matrix at a time through a staging file
    OutOfCore,
}

impl BuildStrategy {
    /// Strategy actually used for a category with `num_indices` indices
    pub fn resolve(self, num_indices: usize, out_of_core_min_indices: usize) -> BuildStrategy {
        match self {
            BuildStrategy::Auto if num_indices >= out_of_core_min_indices => {
                BuildStrategy::OutOfCore
            }
            BuildStrategy::Auto => BuildStrategy::InCore,
            fixed => fixed,
        }
    }
}

/// Configuration shared by operator components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Directory for staging files
    pub staging_dir: PathBuf,
    /// Build strategy
    pub strategy: BuildStrategy,
    /// Arity from which `Auto` switches to out-of-core builds
    pub out_of_core_min_indices: usize,
    /// Leave staging files on disk after a build
    pub keep_staging_files: bool,
    /// Worker threads for parallel loops; `None` uses the global pool
    pub num_threads: Option<usize>,
    /// Ownership of slots across processes
    pub partition: Partition,
}

impl ComponentConfig {
    /// Config staging into `dir`
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Set the build strategy
    pub fn with_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the arity threshold for out-of-core builds
    pub fn with_out_of_core_min_indices(mut self, num_indices: usize) -> Self {
        self.out_of_core_min_indices = num_indices;
        self
    }

    /// Keep staging files after the read pass
    pub fn with_keep_staging_files(mut self, keep: bool) -> Self {
        self.keep_staging_files = keep;
        self
    }

    /// Run parallel loops on a dedicated pool of `num_threads` workers
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set this process's partition
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    /// Load a config from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir(),
            strategy: BuildStrategy::Auto,
            out_of_core_min_indices: 3,
            keep_staging_files: false,
            num_threads: None,
            partition: Partition::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_by_arity() {
        assert_eq!(BuildStrategy::Auto.resolve(2, 3), BuildStrategy::InCore);
        assert_eq!(BuildStrategy::Auto.resolve(3, 3), BuildStrategy::OutOfCore);
        assert_eq!(BuildStrategy::InCore.resolve(3, 3), BuildStrategy::InCore);
        assert_eq!(BuildStrategy::OutOfCore.resolve(0, 3), BuildStrategy::OutOfCore);
    }

    #[test]
    fn test_builder() {
        let config = ComponentConfig::default()
            .with_staging_dir("/scratch")
            .with_strategy(BuildStrategy::InCore)
            .with_num_threads(2)
            .with_keep_staging_files(true);
        assert_eq!(config.staging_dir, PathBuf::from("/scratch"));
        assert_eq!(config.strategy, BuildStrategy::InCore);
        assert_eq!(config.num_threads, Some(2));
        assert!(config.keep_staging_files);
        assert_eq!(config.out_of_core_min_indices, 3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ComponentConfig::from_json_str(
            r#"{"strategy": "out_of_core", "partition": {"rank": 1, "nprocs": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.strategy, BuildStrategy::OutOfCore);
        assert_eq!(config.partition, Partition::new(1, 2));
        assert_eq!(config.out_of_core_min_indices, 3);
        assert_eq!(config.num_threads, None);
    }
}
