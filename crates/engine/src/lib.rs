pub mod builder;
pub mod config;
pub mod error;
pub mod keys;
pub mod ops;
pub mod planner;
pub mod registry;
pub mod revision_log;
mod txn;
pub mod writer;

pub use builder::{GetBatch, ListQuery, SetBatch};
pub use config::{DefaultingStrategy, RetryPolicy, StoreConfig};
pub use error::EngineError;
pub use ops::{
    ActivateOp, ActivateResult, ConfigOp, GetOp, ListMode, ListOp, OpOutcome, QueryResult, SetOp,
    WriteResult, WrittenKey,
};
pub use planner::{QueryPlanner, ScopeIndex};
pub use registry::{MetadataRecord, MetadataRegistry};
pub use revision_log::{RevisionEntry, RevisionLog};
pub use writer::WriteEngine;

use std::path::Path;

use confstore_core::{ConfigValue, Parameter, ParameterFilter, ParameterSet};
use confstore_storage::{KvBackend, SqliteBackend};

/// A configuration source: versioned, parameter-scoped values over a
/// transactional key-value backend.
///
/// Handles are cheap to open; any number of them, in any number of
/// processes, may share one backend.
pub struct ConfigStore<B> {
    backend: B,
    config: StoreConfig,
}

impl ConfigStore<SqliteBackend> {
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let backend = SqliteBackend::open_with_timeout(path, config.busy_timeout())?;
        Ok(Self { backend, config })
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Self::new(SqliteBackend::open_in_memory()?, StoreConfig::default())
    }
}

impl<B: KvBackend> ConfigStore<B> {
    pub fn new(backend: B, config: StoreConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn defaulting_strategy(&self) -> DefaultingStrategy {
        self.config.defaulting_strategy
    }

    pub fn with_defaulting_strategy(mut self, strategy: DefaultingStrategy) -> Self {
        self.config.defaulting_strategy = strategy;
        self
    }

    pub fn set_defaulting_strategy(&mut self, strategy: DefaultingStrategy) {
        self.config.defaulting_strategy = strategy;
    }

    pub fn registry(&self) -> MetadataRegistry<'_, B> {
        MetadataRegistry::new(&self.backend, self.config.retry_policy())
    }

    pub fn revision_log(&self) -> RevisionLog<'_, B> {
        RevisionLog::new(&self.backend)
    }

    pub(crate) fn writer(&self) -> WriteEngine<'_, B> {
        WriteEngine::new(&self.backend, self.config.retry_policy())
    }

    fn planner(&self) -> QueryPlanner<'_, B> {
        QueryPlanner::new(
            self.registry(),
            self.revision_log(),
            self.config.defaulting_strategy,
        )
    }

    // ========================================================================
    // Fluent API
    // ========================================================================

    pub fn set(&self, name: impl Into<String>, value: impl Into<ConfigValue>) -> SetBatch<'_, B> {
        SetBatch::new(self, name.into(), value.into())
    }

    pub fn get(&self, name: impl Into<String>) -> GetBatch<'_, B> {
        let name: String = name.into();
        GetBatch::new(self, [name])
    }

    pub fn get_many<I, S>(&self, names: I) -> GetBatch<'_, B>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GetBatch::new(self, names)
    }

    pub fn list(&self, name: impl Into<String>) -> ListQuery<'_, B> {
        ListQuery::new(self, name.into())
    }

    /// Activate the latest working revision of the unparameterized scope.
    pub fn activate(&self) -> Result<ActivateResult, EngineError> {
        self.writer().activate(&ActivateOp {
            parameters: Vec::new(),
            revision: None,
        })
    }

    pub fn activate_revision(&self, revision: u64) -> Result<ActivateResult, EngineError> {
        self.writer().activate(&ActivateOp {
            parameters: Vec::new(),
            revision: Some(revision),
        })
    }

    pub fn activate_scope<I, P>(&self, params: I) -> Result<ActivateResult, EngineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        self.writer().activate(&ActivateOp {
            parameters: params.into_iter().map(Into::into).collect(),
            revision: None,
        })
    }

    pub fn activate_scope_revision<I, P>(
        &self,
        revision: u64,
        params: I,
    ) -> Result<ActivateResult, EngineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        self.writer().activate(&ActivateOp {
            parameters: params.into_iter().map(Into::into).collect(),
            revision: Some(revision),
        })
    }

    /// Working and active revision of the exact scope, if it was ever written.
    pub fn get_meta_data<I, P>(&self, params: I) -> Result<Option<MetadataRecord>, EngineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        let scope = ParameterSet::from_parameters(params)?;
        self.registry().load(&scope)
    }

    /// Every recorded value of `name` in the exact scope, oldest first.
    pub fn history<I, P>(&self, name: &str, params: I) -> Result<Vec<RevisionEntry>, EngineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        let scope = ParameterSet::from_parameters(params)?;
        self.revision_log().history(name, &scope)
    }

    pub fn scopes(&self) -> Result<Vec<MetadataRecord>, EngineError> {
        self.registry().records()
    }

    // ========================================================================
    // Batch execution
    // ========================================================================

    /// Execute a mixed batch. All sets commit first as one transaction, then
    /// activations run in order (each atomic), then reads see the result.
    /// Outcomes are returned in the order of `ops`.
    ///
    /// Every activation and read is checked against the scopes as they will
    /// stand after the sets before anything is written, so a batch that fails
    /// on those checks leaves the store untouched.
    pub fn execute(&self, ops: Vec<ConfigOp>) -> Result<Vec<OpOutcome>, EngineError> {
        let mut outcomes: Vec<Option<OpOutcome>> = vec![None; ops.len()];
        let planner = self.planner();

        let needs_index = ops.iter().any(|op| {
            matches!(
                op,
                ConfigOp::Get(GetOp { revision: None, .. })
                    | ConfigOp::List(_)
                    | ConfigOp::Activate(_)
            )
        });
        let mut index = if needs_index {
            planner.load_index()?
        } else {
            ScopeIndex::default()
        };
        preflight(&ops, &index)?;

        let sets: Vec<(usize, &SetOp)> = ops
            .iter()
            .enumerate()
            .filter_map(|(i, op)| match op {
                ConfigOp::Set(set) => Some((i, set)),
                _ => None,
            })
            .collect();
        if !sets.is_empty() {
            let refs: Vec<&SetOp> = sets.iter().map(|(_, set)| *set).collect();
            let written = self.writer().write(&refs)?;
            for ((i, _), key) in sets.iter().zip(written.keys) {
                outcomes[*i] = Some(OpOutcome::Written(key));
            }
        }

        let mut activated = false;
        for (i, op) in ops.iter().enumerate() {
            if let ConfigOp::Activate(activate) = op {
                outcomes[i] = Some(OpOutcome::Activated(self.writer().activate(activate)?));
                activated = true;
            }
        }

        if needs_index && (activated || !sets.is_empty()) {
            index = planner.load_index()?;
        }

        for (i, op) in ops.iter().enumerate() {
            match op {
                ConfigOp::Get(get) => {
                    let params = ParameterSet::from_parameters(get.parameters.iter().cloned())?;
                    let result = match get.revision {
                        Some(revision) => planner.resolve_at_revision(&get.name, &params, revision)?,
                        None => planner.resolve_active(&get.name, &params, &index)?,
                    };
                    outcomes[i] = Some(OpOutcome::Value(result));
                }
                ConfigOp::List(list) => {
                    let filter = ParameterFilter::from_parameters(list.filter.iter().cloned())?;
                    let results = planner.list(&list.name, &filter, list.mode, &index)?;
                    outcomes[i] = Some(OpOutcome::Listed(results));
                }
                ConfigOp::Set(_) | ConfigOp::Activate(_) => {}
            }
        }

        Ok(outcomes.into_iter().flatten().collect())
    }
}

/// Validate a mixed batch against `index` projected past its sets.
fn preflight(ops: &[ConfigOp], index: &ScopeIndex) -> Result<(), EngineError> {
    let mut written: Vec<ParameterSet> = Vec::new();
    for op in ops {
        if let ConfigOp::Set(set) = op {
            let scope = ParameterSet::from_parameters(set.parameters.iter().cloned())?;
            if !written.contains(&scope) {
                written.push(scope);
            }
        }
    }
    let projected = index.with_pending_writes(&written);

    for op in ops {
        match op {
            ConfigOp::Activate(activate) => {
                let scope = ParameterSet::from_parameters(activate.parameters.iter().cloned())?;
                projected.check_activation(&scope, activate.revision)?;
            }
            ConfigOp::Get(get) => {
                let params = ParameterSet::from_parameters(get.parameters.iter().cloned())?;
                if get.revision.is_none() {
                    projected.check_conflicts(&params)?;
                }
            }
            ConfigOp::List(list) => {
                ParameterFilter::from_parameters(list.filter.iter().cloned())?;
            }
            ConfigOp::Set(_) => {}
        }
    }
    Ok(())
}
