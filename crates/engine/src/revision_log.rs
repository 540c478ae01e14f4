use confstore_core::{BatchId, ConfigValue, ParameterSet};
use confstore_storage::{KvBackend, KvOp};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::keys;

/// One immutable value of a property within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub revision: u64,
    pub value: ConfigValue,
    /// Write batch that recorded this entry.
    pub batch_id: BatchId,
}

impl RevisionEntry {
    fn encode(&self) -> Result<Vec<u8>, EngineError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Append-only store of revision entries keyed by (property, scope, revision).
pub struct RevisionLog<'a, B> {
    backend: &'a B,
}

impl<'a, B: KvBackend> RevisionLog<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Stage an entry. The put is guarded so an existing entry is never
    /// overwritten; revision numbers come from the registry bump staged in
    /// the same transaction.
    pub(crate) fn stage_append(
        &self,
        property: &str,
        scope: &ParameterSet,
        entry: &RevisionEntry,
        ops: &mut Vec<KvOp>,
    ) -> Result<(), EngineError> {
        let key = keys::rev_key(property, &scope.scope_id(), entry.revision);
        ops.push(KvOp::expect(key.clone(), None));
        ops.push(KvOp::put(key, entry.encode()?));
        Ok(())
    }

    /// The value of `property` in `scope` as of `revision`: the entry with
    /// the greatest revision not above it.
    pub fn read(
        &self,
        property: &str,
        scope: &ParameterSet,
        revision: u64,
    ) -> Result<Option<RevisionEntry>, EngineError> {
        let prefix = keys::rev_prefix(property, &scope.scope_id());
        let upper = keys::rev_key(property, &scope.scope_id(), revision);
        match self.backend.floor(&prefix, &upper)? {
            Some((key, stored)) if keys::parse_revision(&key, &prefix).is_some() => {
                Ok(Some(RevisionEntry::decode(&stored.value)?))
            }
            _ => Ok(None),
        }
    }

    /// The entry written at exactly `revision`, if the property changed then.
    pub fn read_exact(
        &self,
        property: &str,
        scope: &ParameterSet,
        revision: u64,
    ) -> Result<Option<RevisionEntry>, EngineError> {
        let key = keys::rev_key(property, &scope.scope_id(), revision);
        match self.backend.get(&key)? {
            Some(stored) => Ok(Some(RevisionEntry::decode(&stored.value)?)),
            None => Ok(None),
        }
    }

    /// All entries of `property` in `scope`, oldest first.
    pub fn history(
        &self,
        property: &str,
        scope: &ParameterSet,
    ) -> Result<Vec<RevisionEntry>, EngineError> {
        let prefix = keys::rev_prefix(property, &scope.scope_id());
        let mut entries = Vec::new();
        for (key, stored) in self.backend.scan_prefix(&prefix)? {
            // Keys under the prefix that are not revision keys are not ours.
            if keys::parse_revision(&key, &prefix).is_none() {
                continue;
            }
            entries.push(RevisionEntry::decode(&stored.value)?);
        }
        Ok(entries)
    }
}
