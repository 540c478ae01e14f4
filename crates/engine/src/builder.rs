//! Fluent batch builders. Each builder accumulates typed ops and runs them
//! through the store as one unit.

use confstore_core::{ConfigValue, Parameter};
use confstore_storage::KvBackend;

use crate::ConfigStore;
use crate::error::EngineError;
use crate::ops::{ConfigOp, GetOp, ListMode, ListOp, OpOutcome, QueryResult, SetOp, WriteResult};

pub struct SetBatch<'a, B> {
    store: &'a ConfigStore<B>,
    ops: Vec<SetOp>,
}

impl<'a, B: KvBackend> SetBatch<'a, B> {
    pub(crate) fn new(store: &'a ConfigStore<B>, name: String, value: ConfigValue) -> Self {
        Self {
            store,
            ops: vec![SetOp {
                name,
                value,
                parameters: Vec::new(),
            }],
        }
    }

    /// Parameters of the most recently added set.
    pub fn with_parameters<I, P>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        if let Some(op) = self.ops.last_mut() {
            op.parameters.extend(params.into_iter().map(Into::into));
        }
        self
    }

    pub fn and_set(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.ops.push(SetOp {
            name: name.into(),
            value: value.into(),
            parameters: Vec::new(),
        });
        self
    }

    pub fn and(mut self, other: SetBatch<'a, B>) -> Self {
        self.ops.extend(other.ops);
        self
    }

    pub fn into_ops(self) -> Vec<ConfigOp> {
        self.ops.into_iter().map(ConfigOp::Set).collect()
    }

    pub fn execute(self) -> Result<WriteResult, EngineError> {
        let refs: Vec<&SetOp> = self.ops.iter().collect();
        self.store.writer().write(&refs)
    }
}

pub struct GetBatch<'a, B> {
    store: &'a ConfigStore<B>,
    ops: Vec<GetOp>,
    /// First op of the group that `with_parameters`/`at_revision` apply to.
    group_start: usize,
}

impl<'a, B: KvBackend> GetBatch<'a, B> {
    pub(crate) fn new<I, S>(store: &'a ConfigStore<B>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            ops: names.into_iter().map(get_op).collect(),
            group_start: 0,
        }
    }

    pub fn with_parameters<I, P>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        let params: Vec<Parameter> = params.into_iter().map(Into::into).collect();
        for op in &mut self.ops[self.group_start..] {
            op.parameters.extend(params.iter().cloned());
        }
        self
    }

    pub fn at_revision(mut self, revision: u64) -> Self {
        for op in &mut self.ops[self.group_start..] {
            op.revision = Some(revision);
        }
        self
    }

    pub fn and_get(mut self, name: impl Into<String>) -> Self {
        self.group_start = self.ops.len();
        self.ops.push(get_op(name));
        self
    }

    pub fn and(mut self, other: GetBatch<'a, B>) -> Self {
        self.group_start = self.ops.len() + other.group_start;
        self.ops.extend(other.ops);
        self
    }

    pub fn into_ops(self) -> Vec<ConfigOp> {
        self.ops.into_iter().map(ConfigOp::Get).collect()
    }

    /// Result of a batch holding exactly one get.
    pub fn execute(self) -> Result<QueryResult, EngineError> {
        let mut results = self.execute_all()?;
        if results.len() != 1 {
            return Err(EngineError::NotSingular(results.len()));
        }
        Ok(results.remove(0))
    }

    pub fn execute_all(self) -> Result<Vec<QueryResult>, EngineError> {
        let store = self.store;
        let outcomes = store.execute(self.into_ops())?;
        Ok(outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                OpOutcome::Value(result) => Some(result),
                _ => None,
            })
            .collect())
    }
}

fn get_op(name: impl Into<String>) -> GetOp {
    GetOp {
        name: name.into(),
        parameters: Vec::new(),
        revision: None,
    }
}

pub struct ListQuery<'a, B> {
    store: &'a ConfigStore<B>,
    name: String,
    filter: Vec<Parameter>,
}

impl<'a, B: KvBackend> ListQuery<'a, B> {
    pub(crate) fn new(store: &'a ConfigStore<B>, name: String) -> Self {
        Self {
            store,
            name,
            filter: Vec::new(),
        }
    }

    /// Filter terms; use `Parameter::any(name)` to match every value of a name.
    pub fn with_parameters<I, P>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        self.filter.extend(params.into_iter().map(Into::into));
        self
    }

    pub fn into_op(self, mode: ListMode) -> ConfigOp {
        ConfigOp::List(ListOp {
            name: self.name,
            filter: self.filter,
            mode,
        })
    }

    /// Active values in scopes whose parameters are exactly the filter.
    pub fn execute(self) -> Result<Vec<QueryResult>, EngineError> {
        self.run(ListMode::Exact)
    }

    /// Active values in every scope that covers the filter.
    pub fn execute_all(self) -> Result<Vec<QueryResult>, EngineError> {
        self.run(ListMode::AllMatching)
    }

    fn run(self, mode: ListMode) -> Result<Vec<QueryResult>, EngineError> {
        let store = self.store;
        let outcomes = store.execute(vec![self.into_op(mode)])?;
        Ok(outcomes
            .into_iter()
            .flat_map(|outcome| match outcome {
                OpOutcome::Listed(results) => results,
                _ => Vec::new(),
            })
            .collect())
    }
}
