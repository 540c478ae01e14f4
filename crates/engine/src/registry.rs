use confstore_core::ParameterSet;
use confstore_storage::{KvBackend, KvOp};
use serde::{Deserialize, Serialize};

use crate::config::RetryPolicy;
use crate::error::EngineError;
use crate::keys;
use crate::txn::run_optimistic;

/// Per-scope revision pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Canonical (name-sorted) parameters of the scope.
    pub scope: ParameterSet,
    /// Highest revision ever written for the scope.
    pub working_revision: u64,
    /// Revision served to reads without an explicit revision.
    pub active_revision: Option<u64>,
}

impl MetadataRecord {
    fn new(scope: &ParameterSet) -> Self {
        Self {
            scope: scope.canonical(),
            working_revision: 0,
            active_revision: None,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, EngineError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// A record as read from the backend plus the version an update must expect.
/// `version == None` means the record has never been persisted.
#[derive(Debug, Clone)]
pub(crate) struct LoadedRecord {
    pub record: MetadataRecord,
    pub version: Option<u64>,
}

impl LoadedRecord {
    pub fn exists(&self) -> bool {
        self.version.is_some()
    }
}

pub struct MetadataRegistry<'a, B> {
    backend: &'a B,
    retry: RetryPolicy,
}

impl<'a, B: KvBackend> MetadataRegistry<'a, B> {
    pub fn new(backend: &'a B, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub fn load(&self, scope: &ParameterSet) -> Result<Option<MetadataRecord>, EngineError> {
        let loaded = self.load_versioned(scope)?;
        Ok(loaded.exists().then_some(loaded.record))
    }

    /// The scope's record, or a fresh unsaved one (working revision 0).
    pub fn get_or_create(&self, scope: &ParameterSet) -> Result<MetadataRecord, EngineError> {
        Ok(self.load_versioned(scope)?.record)
    }

    pub(crate) fn load_versioned(&self, scope: &ParameterSet) -> Result<LoadedRecord, EngineError> {
        match self.backend.get(&keys::meta_key(&scope.scope_id()))? {
            Some(stored) => Ok(LoadedRecord {
                record: MetadataRecord::decode(&stored.value)?,
                version: Some(stored.version),
            }),
            None => Ok(LoadedRecord {
                record: MetadataRecord::new(scope),
                version: None,
            }),
        }
    }

    /// Version of the scope epoch, which moves whenever a scope is first
    /// created. Read it before taking a `records()` snapshot that a later
    /// transaction relies on.
    pub(crate) fn epoch(&self) -> Result<Option<u64>, EngineError> {
        Ok(self
            .backend
            .get(keys::SCOPE_EPOCH_KEY)?
            .map(|stored| stored.version))
    }

    /// Fail the transaction if any scope was created since `epoch` was read.
    pub(crate) fn stage_epoch_guard(&self, epoch: Option<u64>, ops: &mut Vec<KvOp>) {
        ops.push(KvOp::expect(keys::SCOPE_EPOCH_KEY, epoch));
    }

    /// Every scope that has been written at least once.
    pub fn records(&self) -> Result<Vec<MetadataRecord>, EngineError> {
        self.backend
            .scan_prefix(keys::META_PREFIX)?
            .iter()
            .map(|(_, stored)| MetadataRecord::decode(&stored.value))
            .collect()
    }

    /// Stage the next working revision for `loaded`'s scope. The write only
    /// lands if the record is still at the version it was loaded with.
    pub(crate) fn stage_bump(
        &self,
        loaded: &LoadedRecord,
        ops: &mut Vec<KvOp>,
    ) -> Result<u64, EngineError> {
        let mut record = loaded.record.clone();
        record.working_revision += 1;
        let key = keys::meta_key(&record.scope.scope_id());
        ops.push(KvOp::expect(key.clone(), loaded.version));
        ops.push(KvOp::put(key, record.encode()?));
        if !loaded.exists() {
            ops.push(KvOp::put(keys::SCOPE_EPOCH_KEY, Vec::new()));
        }
        Ok(record.working_revision)
    }

    pub(crate) fn stage_set_active(
        &self,
        loaded: &LoadedRecord,
        revision: u64,
        ops: &mut Vec<KvOp>,
    ) -> Result<(), EngineError> {
        let record = &loaded.record;
        if !loaded.exists() {
            return Err(EngineError::UnknownScope(record.scope.clone()));
        }
        if revision == 0 || revision > record.working_revision {
            return Err(EngineError::InvalidRevision {
                scope: record.scope.clone(),
                requested: revision,
                working: record.working_revision,
            });
        }
        let mut updated = record.clone();
        updated.active_revision = Some(revision);
        let key = keys::meta_key(&record.scope.scope_id());
        ops.push(KvOp::expect(key.clone(), loaded.version));
        ops.push(KvOp::put(key, updated.encode()?));
        Ok(())
    }

    /// Allocate the next revision for `scope` on its own, without writing a
    /// revision entry.
    pub fn bump_working(&self, scope: &ParameterSet) -> Result<u64, EngineError> {
        run_optimistic(self.retry, || {
            let loaded = self.load_versioned(scope)?;
            let mut ops = Vec::with_capacity(2);
            let revision = self.stage_bump(&loaded, &mut ops)?;
            self.backend.execute_transaction(&ops)?;
            Ok(revision)
        })
    }

    /// Point `scope` at `revision`. No conflict detection; see
    /// `ConfigStore::activate_scope_revision` for the checked path.
    pub fn set_active(&self, scope: &ParameterSet, revision: u64) -> Result<(), EngineError> {
        run_optimistic(self.retry, || {
            let loaded = self.load_versioned(scope)?;
            let mut ops = Vec::with_capacity(2);
            self.stage_set_active(&loaded, revision, &mut ops)?;
            self.backend.execute_transaction(&ops)?;
            Ok(())
        })
    }
}
