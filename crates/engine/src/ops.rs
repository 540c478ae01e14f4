use confstore_core::{BatchId, ConfigValue, Parameter, ParameterSet};
use url::Url;

/// A single step of a batch. Builders accumulate these and the store
/// executes them as one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOp {
    Set(SetOp),
    Get(GetOp),
    Activate(ActivateOp),
    List(ListOp),
}

impl ConfigOp {
    pub fn set(name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        ConfigOp::Set(SetOp {
            name: name.into(),
            value: value.into(),
            parameters: Vec::new(),
        })
    }

    pub fn get(name: impl Into<String>) -> Self {
        ConfigOp::Get(GetOp {
            name: name.into(),
            parameters: Vec::new(),
            revision: None,
        })
    }

    pub fn activate(revision: Option<u64>) -> Self {
        ConfigOp::Activate(ActivateOp {
            parameters: Vec::new(),
            revision,
        })
    }

    pub fn list(name: impl Into<String>, mode: ListMode) -> Self {
        ConfigOp::List(ListOp {
            name: name.into(),
            filter: Vec::new(),
            mode,
        })
    }

    pub fn with_parameters<I, P>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        let params = params.into_iter().map(Into::into);
        match &mut self {
            ConfigOp::Set(op) => op.parameters.extend(params),
            ConfigOp::Get(op) => op.parameters.extend(params),
            ConfigOp::Activate(op) => op.parameters.extend(params),
            ConfigOp::List(op) => op.filter.extend(params),
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOp {
    pub name: String,
    pub value: ConfigValue,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetOp {
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// Read this scope revision instead of the active one.
    pub revision: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivateOp {
    pub parameters: Vec<Parameter>,
    /// Defaults to the scope's working revision.
    pub revision: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Scope parameters equal the filter.
    Exact,
    /// Scope parameters cover the filter, possibly with more names.
    AllMatching,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListOp {
    pub name: String,
    pub filter: Vec<Parameter>,
    pub mode: ListMode,
}

/// Outcome of a read.
///
/// A result is *found* when some scope holds an entry for the property,
/// including `Null` and `Unset` entries. It is *present* when the entry
/// carries a value or is `Unset`; a `Null` entry reads as not present.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub name: String,
    /// Parameters of the query.
    pub parameters: ParameterSet,
    /// Scope the value was served from.
    pub scope: Option<ParameterSet>,
    /// Revision of the entry that supplied the value.
    pub revision: Option<u64>,
    value: Option<ConfigValue>,
}

impl QueryResult {
    pub(crate) fn not_found(name: &str, parameters: &ParameterSet) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.clone(),
            scope: None,
            revision: None,
            value: None,
        }
    }

    pub(crate) fn found(
        name: &str,
        parameters: &ParameterSet,
        scope: &ParameterSet,
        revision: u64,
        value: ConfigValue,
    ) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.clone(),
            scope: Some(scope.clone()),
            revision: Some(revision),
            value: Some(value),
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_present(&self) -> bool {
        matches!(&self.value, Some(v) if !v.is_null())
    }

    pub fn is_unset(&self) -> bool {
        matches!(&self.value, Some(ConfigValue::Unset))
    }

    pub fn is_null(&self) -> bool {
        matches!(&self.value, Some(ConfigValue::Null))
    }

    pub fn value(&self) -> Option<&ConfigValue> {
        self.value.as_ref()
    }

    pub fn as_text(&self) -> Option<&str> {
        self.value.as_ref().and_then(ConfigValue::as_text)
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.value.as_ref().and_then(ConfigValue::as_integer)
    }

    pub fn as_float(&self) -> Option<f64> {
        self.value.as_ref().and_then(ConfigValue::as_float)
    }

    pub fn as_boolean(&self) -> Option<bool> {
        self.value.as_ref().and_then(ConfigValue::as_boolean)
    }

    pub fn as_uri(&self) -> Option<&Url> {
        self.value.as_ref().and_then(ConfigValue::as_uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenKey {
    pub name: String,
    pub parameters: ParameterSet,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub batch_id: BatchId,
    /// One entry per set, in the order the sets were given.
    pub keys: Vec<WrittenKey>,
}

impl WriteResult {
    pub fn revision_of(&self, name: &str, parameters: &ParameterSet) -> Option<u64> {
        self.keys
            .iter()
            .find(|k| k.name == name && &k.parameters == parameters)
            .map(|k| k.revision)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateResult {
    pub scope: ParameterSet,
    pub revision: u64,
    pub previous: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpOutcome {
    Written(WrittenKey),
    Value(QueryResult),
    Activated(ActivateResult),
    Listed(Vec<QueryResult>),
}
