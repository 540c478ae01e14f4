use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::ScopeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterValue {
    Exact(String),
    /// Matches any value for the parameter name. Only meaningful in list filters.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: ParameterValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParameterValue::Exact(value.into()),
        }
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParameterValue::Any,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        match &self.value {
            ParameterValue::Exact(v) => Some(v),
            ParameterValue::Any => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.value, ParameterValue::Any)
    }

    fn matches(&self, value: &str) -> bool {
        match &self.value {
            ParameterValue::Exact(v) => v == value,
            ParameterValue::Any => true,
        }
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for Parameter {
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

/// How two parameter sets relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRelation {
    Equal,
    /// `self` is a strict subset of the other set.
    Subset,
    /// `self` is a strict superset of the other set.
    Superset,
    /// Neither set is nested in the other.
    Disjoint,
}

impl ScopeRelation {
    pub fn is_nested(&self) -> bool {
        !matches!(self, Self::Disjoint)
    }
}

/// A concrete scope: parameters with unique names and exact values.
///
/// Equality ignores order. The order in which parameters were supplied is kept
/// because LOOKUP defaulting strips the most recently supplied one first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    params: Vec<(String, String)>,
}

impl ParameterSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_parameters<I, P>(params: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        let mut set = Self::empty();
        for param in params {
            let param = param.into();
            let value = match param.value {
                ParameterValue::Exact(v) => v,
                ParameterValue::Any => return Err(CoreError::WildcardNotAllowed(param.name)),
            };
            set.push(param.name, value)?;
        }
        Ok(set)
    }

    fn push(&mut self, name: String, value: String) -> Result<(), CoreError> {
        if name.is_empty() {
            return Err(CoreError::InvalidParameter("parameter name is empty".into()));
        }
        if self.get(&name).is_some() {
            return Err(CoreError::DuplicateParameter(name));
        }
        self.params.push((name, value));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in the order they were supplied.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_subset_of(&self, other: &ParameterSet) -> bool {
        self.len() <= other.len() && self.iter().all(|(n, v)| other.get(n) == Some(v))
    }

    pub fn relation(&self, other: &ParameterSet) -> ScopeRelation {
        match (self.is_subset_of(other), other.is_subset_of(self)) {
            (true, true) => ScopeRelation::Equal,
            (true, false) => ScopeRelation::Subset,
            (false, true) => ScopeRelation::Superset,
            (false, false) => ScopeRelation::Disjoint,
        }
    }

    /// Candidate scopes for LOOKUP defaulting: this set, then each set obtained
    /// by dropping the most recently supplied parameter, ending at the empty set.
    pub fn lookup_chain(&self) -> Vec<ParameterSet> {
        let mut chain = Vec::with_capacity(self.len() + 1);
        let mut current = self.clone();
        loop {
            let done = current.is_empty();
            chain.push(current.clone());
            if done {
                break;
            }
            current.params.pop();
        }
        chain
    }

    /// Same parameters sorted by name. Stored representation of a scope.
    pub fn canonical(&self) -> ParameterSet {
        let mut params = self.params.clone();
        params.sort();
        ParameterSet { params }
    }

    pub fn scope_id(&self) -> ScopeId {
        let canonical = self.canonical();
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(canonical.len() as u64).to_be_bytes());
        for (name, value) in canonical.iter() {
            hasher.update(&(name.len() as u64).to_be_bytes());
            hasher.update(name.as_bytes());
            hasher.update(&(value.len() as u64).to_be_bytes());
            hasher.update(value.as_bytes());
        }
        ScopeId::from_bytes(*hasher.finalize().as_bytes())
    }
}

impl PartialEq for ParameterSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset_of(other)
    }
}

impl Eq for ParameterSet {}

impl Hash for ParameterSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().params.hash(state);
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.canonical().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

/// Parameter filter used by listing. Terms may be wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterFilter {
    terms: Vec<Parameter>,
}

impl ParameterFilter {
    pub fn from_parameters<I, P>(params: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameter>,
    {
        let mut terms: Vec<Parameter> = Vec::new();
        for param in params {
            let param = param.into();
            if param.name.is_empty() {
                return Err(CoreError::InvalidParameter("parameter name is empty".into()));
            }
            if terms.iter().any(|t| t.name == param.name) {
                return Err(CoreError::DuplicateParameter(param.name));
            }
            terms.push(param);
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[Parameter] {
        &self.terms
    }

    fn satisfied_by(&self, scope: &ParameterSet) -> bool {
        self.terms
            .iter()
            .all(|t| scope.get(&t.name).is_some_and(|v| t.matches(v)))
    }

    /// Scope names are exactly the filter's names and every value matches.
    pub fn matches_exact(&self, scope: &ParameterSet) -> bool {
        scope.len() == self.terms.len() && self.satisfied_by(scope)
    }

    /// Scope supplies every filter name with a matching value; extra names allowed.
    pub fn matches_all(&self, scope: &ParameterSet) -> bool {
        self.satisfied_by(scope)
    }
}
