use confstore_core::{CoreError, ParameterSet};
use confstore_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ambiguous scope {query}: matches both {first} and {second}, neither contains the other")]
    AmbiguousScope {
        query: ParameterSet,
        first: ParameterSet,
        second: ParameterSet,
    },

    #[error("invalid revision {requested} for scope {scope}: working revision is {working}")]
    InvalidRevision {
        scope: ParameterSet,
        requested: u64,
        working: u64,
    },

    #[error("unknown scope: {0}")]
    UnknownScope(ParameterSet),

    #[error("property {name} set twice for scope {scope} in one batch")]
    DuplicateKey { name: String, scope: ParameterSet },

    #[error("expected exactly one result, got {0}")]
    NotSingular(usize),

    #[error("write conflicted {attempts} times, giving up")]
    RetriesExhausted { attempts: u32 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Backend connectivity failures. Reads can be retried as-is; a write
    /// batch that failed this way did not commit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(e) if e.is_unavailable())
    }

    pub(crate) fn is_write_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::Storage(StorageError::ConditionFailed { .. })
        )
    }
}

impl From<rmp_serde::encode::Error> for EngineError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for EngineError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}
