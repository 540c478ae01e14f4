use confstore_core::ConfigValue;
use confstore_engine::{ConfigStore, DefaultingStrategy, EngineError, StoreConfig};
use confstore_storage::SqliteBackend;
use tempfile::TempDir;

use crate::params;

/// A config store on its own temporary database file.
pub struct TestStore {
    pub store: ConfigStore<SqliteBackend>,
    _dir: TempDir,
}

impl TestStore {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_strategy(
        strategy: DefaultingStrategy,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(StoreConfig {
            defaulting_strategy: strategy,
            ..StoreConfig::default()
        })
    }

    pub fn with_config(config: StoreConfig) -> Result<Self, Box<dyn std::error::Error>> {
        crate::init_tracing();
        let dir = tempfile::tempdir()?;
        let store = ConfigStore::open(dir.path().join("config.db"), config)?;
        Ok(Self { store, _dir: dir })
    }

    /// Write one value into the scope and activate that scope's new revision.
    /// Returns the revision written.
    pub fn publish(
        &self,
        name: &str,
        value: impl Into<ConfigValue>,
        pairs: &[(&str, &str)],
    ) -> Result<u64, EngineError> {
        let written = self
            .store
            .set(name, value)
            .with_parameters(params(pairs))
            .execute()?;
        let revision = written.keys[0].revision;
        self.store
            .activate_scope_revision(revision, params(pairs))?;
        Ok(revision)
    }

    /// Text value of `name` for the given parameters, following the store's
    /// defaulting strategy.
    pub fn text(&self, name: &str, pairs: &[(&str, &str)]) -> Result<Option<String>, EngineError> {
        let result = self
            .store
            .get(name)
            .with_parameters(params(pairs))
            .execute()?;
        Ok(result.as_text().map(str::to_string))
    }
}
