use confstore_core::{BatchId, ParameterSet};
use confstore_storage::KvBackend;
use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::EngineError;
use crate::ops::{ActivateOp, ActivateResult, SetOp, WriteResult, WrittenKey};
use crate::planner::ScopeIndex;
use crate::registry::MetadataRegistry;
use crate::revision_log::{RevisionEntry, RevisionLog};
use crate::txn::run_optimistic;

/// Stages write batches and activations as single backend transactions.
pub struct WriteEngine<'a, B> {
    backend: &'a B,
    registry: MetadataRegistry<'a, B>,
    log: RevisionLog<'a, B>,
    retry: RetryPolicy,
}

impl<'a, B: KvBackend> WriteEngine<'a, B> {
    pub fn new(backend: &'a B, retry: RetryPolicy) -> Self {
        Self {
            backend,
            registry: MetadataRegistry::new(backend, retry),
            log: RevisionLog::new(backend),
            retry,
        }
    }

    /// Write every set in one transaction. Each distinct scope in the batch
    /// gets exactly one new revision, shared by all sets targeting it.
    pub fn write(&self, sets: &[&SetOp]) -> Result<WriteResult, EngineError> {
        let mut scopes: Vec<ParameterSet> = Vec::new();
        let mut planned: Vec<(usize, &SetOp)> = Vec::with_capacity(sets.len());
        for &op in sets {
            let scope = ParameterSet::from_parameters(op.parameters.iter().cloned())?;
            if planned
                .iter()
                .any(|(i, prev)| prev.name == op.name && scopes[*i] == scope)
            {
                return Err(EngineError::DuplicateKey {
                    name: op.name.clone(),
                    scope,
                });
            }
            let index = match scopes.iter().position(|s| *s == scope) {
                Some(index) => index,
                None => {
                    scopes.push(scope);
                    scopes.len() - 1
                }
            };
            planned.push((index, op));
        }

        if planned.is_empty() {
            return Ok(WriteResult {
                batch_id: BatchId::new(),
                keys: Vec::new(),
            });
        }

        run_optimistic(self.retry, || {
            let batch_id = BatchId::new();
            let mut ops = Vec::new();

            let mut revisions = Vec::with_capacity(scopes.len());
            for scope in &scopes {
                let loaded = self.registry.load_versioned(scope)?;
                revisions.push(self.registry.stage_bump(&loaded, &mut ops)?);
            }

            let mut keys = Vec::with_capacity(planned.len());
            for (index, op) in &planned {
                let entry = RevisionEntry {
                    revision: revisions[*index],
                    value: op.value.clone(),
                    batch_id,
                };
                self.log
                    .stage_append(&op.name, &scopes[*index], &entry, &mut ops)?;
                keys.push(WrittenKey {
                    name: op.name.clone(),
                    parameters: scopes[*index].clone(),
                    revision: entry.revision,
                });
            }

            self.backend.execute_transaction(&ops)?;
            debug!(%batch_id, keys = keys.len(), scopes = scopes.len(), "write batch committed");
            Ok(WriteResult { batch_id, keys })
        })
    }

    /// Point the scope named by `op` at a revision, after checking that no
    /// two unrelated existing scopes both cover it. The commit is guarded by
    /// the scope epoch, so a scope created after the check forces a retry.
    pub fn activate(&self, op: &ActivateOp) -> Result<ActivateResult, EngineError> {
        let scope = ParameterSet::from_parameters(op.parameters.iter().cloned())?;

        run_optimistic(self.retry, || {
            let epoch = self.registry.epoch()?;
            let index = ScopeIndex::new(self.registry.records()?);
            index.check_conflicts(&scope)?;

            let loaded = self.registry.load_versioned(&scope)?;
            if !loaded.exists() {
                return Err(EngineError::UnknownScope(loaded.record.scope));
            }
            let revision = op.revision.unwrap_or(loaded.record.working_revision);

            let mut ops = Vec::with_capacity(3);
            self.registry.stage_epoch_guard(epoch, &mut ops);
            self.registry.stage_set_active(&loaded, revision, &mut ops)?;
            self.backend.execute_transaction(&ops)?;

            debug!(%scope, revision, previous = ?loaded.record.active_revision, "scope activated");
            Ok(ActivateResult {
                scope: loaded.record.scope.clone(),
                revision,
                previous: loaded.record.active_revision,
            })
        })
    }
}
