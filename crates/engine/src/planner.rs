use confstore_core::{ParameterFilter, ParameterSet};
use confstore_storage::KvBackend;
use tracing::trace;

use crate::config::DefaultingStrategy;
use crate::error::EngineError;
use crate::ops::{ListMode, QueryResult};
use crate::registry::{MetadataRecord, MetadataRegistry};
use crate::revision_log::RevisionLog;

/// Snapshot of all metadata records, loaded once per batch of reads.
#[derive(Debug, Clone, Default)]
pub struct ScopeIndex {
    records: Vec<MetadataRecord>,
}

impl ScopeIndex {
    pub fn new(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    pub fn find(&self, scope: &ParameterSet) -> Option<&MetadataRecord> {
        self.records.iter().find(|r| &r.scope == scope)
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    /// This index as it will look once each of `scopes` has been written one
    /// more time. Scopes not yet recorded appear at working revision 1.
    pub fn with_pending_writes(&self, scopes: &[ParameterSet]) -> ScopeIndex {
        let mut records = self.records.clone();
        for scope in scopes {
            match records.iter_mut().find(|r| &r.scope == scope) {
                Some(record) => record.working_revision += 1,
                None => records.push(MetadataRecord {
                    scope: scope.canonical(),
                    working_revision: 1,
                    active_revision: None,
                }),
            }
        }
        ScopeIndex::new(records)
    }

    /// Checks an activation of `scope` would pass against this snapshot and
    /// returns the revision it would activate.
    pub fn check_activation(
        &self,
        scope: &ParameterSet,
        revision: Option<u64>,
    ) -> Result<u64, EngineError> {
        self.check_conflicts(scope)?;
        let record = self
            .find(scope)
            .ok_or_else(|| EngineError::UnknownScope(scope.canonical()))?;
        let revision = revision.unwrap_or(record.working_revision);
        if revision == 0 || revision > record.working_revision {
            return Err(EngineError::InvalidRevision {
                scope: record.scope.clone(),
                requested: revision,
                working: record.working_revision,
            });
        }
        Ok(revision)
    }

    /// Reject `query` when it covers two existing scopes that are not nested
    /// in one another: there is no single most specific scope to act on.
    pub fn check_conflicts(&self, query: &ParameterSet) -> Result<(), EngineError> {
        let covered: Vec<&ParameterSet> = self
            .records
            .iter()
            .map(|r| &r.scope)
            .filter(|s| s.is_subset_of(query))
            .collect();

        for (i, first) in covered.iter().enumerate() {
            for second in &covered[i + 1..] {
                if !first.relation(second).is_nested() {
                    return Err(EngineError::AmbiguousScope {
                        query: query.clone(),
                        first: (*first).clone(),
                        second: (*second).clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

pub struct QueryPlanner<'a, B> {
    registry: MetadataRegistry<'a, B>,
    log: RevisionLog<'a, B>,
    strategy: DefaultingStrategy,
}

impl<'a, B: KvBackend> QueryPlanner<'a, B> {
    pub fn new(
        registry: MetadataRegistry<'a, B>,
        log: RevisionLog<'a, B>,
        strategy: DefaultingStrategy,
    ) -> Self {
        Self {
            registry,
            log,
            strategy,
        }
    }

    pub fn load_index(&self) -> Result<ScopeIndex, EngineError> {
        Ok(ScopeIndex::new(self.registry.records()?))
    }

    /// Read `name` in the exact scope as of `revision`. Revisions outside
    /// the scope's written range read as not found.
    pub fn resolve_at_revision(
        &self,
        name: &str,
        parameters: &ParameterSet,
        revision: u64,
    ) -> Result<QueryResult, EngineError> {
        let Some(record) = self.registry.load(parameters)? else {
            return Ok(QueryResult::not_found(name, parameters));
        };
        if revision == 0 || revision > record.working_revision {
            return Ok(QueryResult::not_found(name, parameters));
        }
        match self.log.read(name, parameters, revision)? {
            Some(entry) => Ok(QueryResult::found(
                name,
                parameters,
                &record.scope,
                entry.revision,
                entry.value,
            )),
            None => Ok(QueryResult::not_found(name, parameters)),
        }
    }

    /// Read the active value of `name`, following the defaulting strategy.
    pub fn resolve_active(
        &self,
        name: &str,
        parameters: &ParameterSet,
        index: &ScopeIndex,
    ) -> Result<QueryResult, EngineError> {
        index.check_conflicts(parameters)?;

        let candidates = match self.strategy {
            DefaultingStrategy::None => vec![parameters.clone()],
            DefaultingStrategy::Lookup => parameters.lookup_chain(),
        };

        for candidate in &candidates {
            let Some(record) = index.find(candidate) else {
                trace!(%name, scope = %candidate, "no metadata for candidate scope");
                continue;
            };
            let Some(active) = record.active_revision else {
                trace!(%name, scope = %candidate, "candidate scope never activated");
                continue;
            };
            if let Some(entry) = self.log.read(name, candidate, active)? {
                return Ok(QueryResult::found(
                    name,
                    parameters,
                    &record.scope,
                    entry.revision,
                    entry.value,
                ));
            }
        }
        Ok(QueryResult::not_found(name, parameters))
    }

    /// Active values of `name` in every scope matched by `filter`, ordered by
    /// scope. Scopes without an active revision or without an entry for
    /// `name` are skipped.
    pub fn list(
        &self,
        name: &str,
        filter: &ParameterFilter,
        mode: ListMode,
        index: &ScopeIndex,
    ) -> Result<Vec<QueryResult>, EngineError> {
        let mut matching: Vec<&MetadataRecord> = index
            .records()
            .iter()
            .filter(|r| match mode {
                ListMode::Exact => filter.matches_exact(&r.scope),
                ListMode::AllMatching => filter.matches_all(&r.scope),
            })
            .collect();
        matching.sort_by_cached_key(|r| r.scope.to_string());

        let mut results = Vec::new();
        for record in matching {
            let Some(active) = record.active_revision else {
                continue;
            };
            if let Some(entry) = self.log.read(name, &record.scope, active)? {
                results.push(QueryResult::found(
                    name,
                    &record.scope,
                    &record.scope,
                    entry.revision,
                    entry.value,
                ));
            }
        }
        Ok(results)
    }
}
