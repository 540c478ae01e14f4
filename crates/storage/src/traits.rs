use crate::error::StorageError;

/// A stored value together with the version the backend assigned to it.
/// Versions start at 1 and increase by one on every put to the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Get { key: String },
    Put { key: String, value: Vec<u8> },
    /// Fails the whole transaction unless `key` is currently at `version`.
    /// `None` requires the key to be absent.
    Expect { key: String, version: Option<u64> },
    ScanPrefix { prefix: String },
}

impl KvOp {
    pub fn get(key: impl Into<String>) -> Self {
        Self::Get { key: key.into() }
    }

    pub fn put(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self::Put {
            key: key.into(),
            value,
        }
    }

    pub fn expect(key: impl Into<String>, version: Option<u64>) -> Self {
        Self::Expect {
            key: key.into(),
            version,
        }
    }

    pub fn scan_prefix(prefix: impl Into<String>) -> Self {
        Self::ScanPrefix {
            prefix: prefix.into(),
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::Put { .. })
    }
}

/// One result per `KvOp`, in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvResult {
    Value(Option<Versioned>),
    Written { version: u64 },
    Matched,
    Entries(Vec<(String, Versioned)>),
}

/// Transactional key-value store the configuration engine runs on.
///
/// `execute_transaction` is all-or-nothing: if any op fails, including an
/// `Expect`, no write in the batch becomes visible. The standalone reads are
/// not transactional with each other.
pub trait KvBackend {
    fn execute_transaction(&self, ops: &[KvOp]) -> Result<Vec<KvResult>, StorageError>;

    fn get(&self, key: &str) -> Result<Option<Versioned>, StorageError>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Versioned)>, StorageError>;

    /// The entry with the greatest key that starts with `prefix` and is not
    /// above `key`.
    fn floor(&self, prefix: &str, key: &str)
    -> Result<Option<(String, Versioned)>, StorageError>;
}
