use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("condition failed on {key}: expected version {expected:?}, found {actual:?}")]
    ConditionFailed {
        key: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },
}

impl StorageError {
    /// Connectivity failures the caller may retry. Nothing was committed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::CannotOpen
                ) =>
            {
                StorageError::Unavailable(e.to_string())
            }
            _ => StorageError::Sqlite(e),
        }
    }
}
