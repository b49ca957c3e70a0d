//! Configuration for FineDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FineError, Result};

/// Default TCP port of the FineDB protocol
pub const DEFAULT_PORT: u16 = 11138;

/// Main configuration for a FineDB server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the LMDB environment (data.mdb, lock.mdb)
    pub data_dir: PathBuf,

    /// Maximum on-disk size of the environment (bytes)
    pub map_size: usize,

    /// Maximum number of concurrent read transactions
    pub max_readers: u32,

    /// Maximum number of named sub-databases
    pub max_dbs: u32,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Number of connection worker threads
    pub workers: usize,

    /// Connection read (idle) timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection send timeout (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./finedb_data"),
            map_size: 10 * 1024 * 1024, // 10 MB
            max_readers: 126,
            max_dbs: 16,
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            workers: 15,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(FineError::Config("at least one worker is required".into()));
        }
        if self.map_size == 0 {
            return Err(FineError::Config("map size must be positive".into()));
        }
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(FineError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Reader slots needed by the engine: every worker plus the writer
    /// and the listener may hold a read transaction at once.
    pub fn effective_max_readers(&self) -> u32 {
        let needed = u32::try_from(self.workers + 2).unwrap_or(u32::MAX);
        self.max_readers.max(needed)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the environment map size (in bytes)
    pub fn map_size(mut self, size: usize) -> Self {
        self.config.map_size = size;
        self
    }

    /// Set the maximum number of concurrent readers
    pub fn max_readers(mut self, count: u32) -> Self {
        self.config.max_readers = count;
        self
    }

    /// Set the maximum number of named sub-databases
    pub fn max_dbs(mut self, count: u32) -> Self {
        self.config.max_dbs = count;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the number of connection workers
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
