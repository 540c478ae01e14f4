use std::path::{Path, PathBuf};

use confstore_engine::{ConfigStore, EngineError, StoreConfig};
use confstore_storage::SqliteBackend;
use tempfile::TempDir;

/// Several independent store handles sharing one database file, standing in
/// for separate processes on one backend.
pub struct TestCluster {
    handles: Vec<ConfigStore<SqliteBackend>>,
    path: PathBuf,
    config: StoreConfig,
    _dir: TempDir,
}

impl TestCluster {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Result<Self, Box<dyn std::error::Error>> {
        crate::init_tracing();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("shared.db");
        Ok(Self {
            handles: Vec::new(),
            path,
            config,
            _dir: dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open a fresh handle on the shared file. Each thread should open its
    /// own rather than share one.
    pub fn open_handle(&self) -> Result<ConfigStore<SqliteBackend>, EngineError> {
        ConfigStore::open(&self.path, self.config.clone())
    }

    pub fn add_handle(&mut self) -> Result<usize, EngineError> {
        let handle = self.open_handle()?;
        let index = self.handles.len();
        self.handles.push(handle);
        Ok(index)
    }

    pub fn handle(&self, index: usize) -> &ConfigStore<SqliteBackend> {
        &self.handles[index]
    }

    pub fn handle_mut(&mut self, index: usize) -> &mut ConfigStore<SqliteBackend> {
        &mut self.handles[index]
    }
}
