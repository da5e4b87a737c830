//! Runtime configuration shared by every store and operation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CHUNK_BYTES;
use crate::error::{Result, SegyError};
use crate::log::Verbosity;

fn default_max_traces() -> u64 {
    i32::MAX as u64
}

fn default_chunk_bytes() -> usize {
    DEFAULT_CHUNK_BYTES
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiolConfig {
    /// Hard limit on the trace count of files being written.
    #[serde(default = "default_max_traces")]
    pub max_traces: u64,
    /// Memory budget for one streaming read or write.
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
    #[serde(default)]
    pub verbosity: Verbosity,
    /// Whether rule sets built on behalf of the caller cover the whole header.
    #[serde(default = "default_true")]
    pub full_extent_rules: bool,
    /// Where intermediate files go. Defaults to the output file's directory.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for PiolConfig {
    fn default() -> Self {
        Self {
            max_traces: default_max_traces(),
            chunk_bytes: default_chunk_bytes(),
            verbosity: Verbosity::default(),
            full_extent_rules: true,
            temp_dir: None,
        }
    }
}

impl PiolConfig {
    #[must_use]
    pub fn builder() -> PiolConfigBuilder {
        PiolConfigBuilder::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs_err::read_to_string(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_bytes == 0 {
            return Err(SegyError::Config {
                reason: "chunk_bytes must be non-zero".into(),
            });
        }
        if self.max_traces == 0 {
            return Err(SegyError::Config {
                reason: "max_traces must be non-zero".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PiolConfigBuilder {
    config: PiolConfig,
}

impl PiolConfigBuilder {
    #[must_use]
    pub fn max_traces(mut self, max_traces: u64) -> Self {
        self.config.max_traces = max_traces;
        self
    }

    #[must_use]
    pub fn chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.config.chunk_bytes = chunk_bytes;
        self
    }

    #[must_use]
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.config.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn full_extent_rules(mut self, full: bool) -> Self {
        self.config.full_extent_rules = full;
        self
    }

    #[must_use]
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<PiolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
