use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

/// A value written for a configuration key.
///
/// `Unset` is a recorded tombstone: the property reads as unset but its
/// history is kept. `Null` is an explicit empty value, distinct from a key
/// that was never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigValue {
    Unset,
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uri(Url),
}

impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unset, Self::Unset) => true,
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Uri(a), Self::Uri(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConfigValue {}

impl ConfigValue {
    pub fn uri(input: &str) -> Result<Self, CoreError> {
        Url::parse(input)
            .map(ConfigValue::Uri)
            .map_err(|e| CoreError::InvalidUri {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ConfigValue::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(n) => Some(*n),
            ConfigValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uri(&self) -> Option<&Url> {
        match self {
            ConfigValue::Uri(u) => Some(u),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Text(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Text(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Integer(n)
    }
}

impl From<i32> for ConfigValue {
    fn from(n: i32) -> Self {
        ConfigValue::Integer(n.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::Float(n)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Boolean(b)
    }
}

impl From<Url> for ConfigValue {
    fn from(u: Url) -> Self {
        ConfigValue::Uri(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_survive_msgpack() {
        for value in [ConfigValue::Unset, ConfigValue::Null] {
            let bytes = rmp_serde::to_vec(&value).unwrap();
            assert_eq!(rmp_serde::from_slice::<ConfigValue>(&bytes).unwrap(), value);
        }
        let bytes = rmp_serde::to_vec(&ConfigValue::Unset).unwrap();
        assert!(rmp_serde::from_slice::<ConfigValue>(&bytes).unwrap().is_unset());
    }

    #[test]
    fn uri_is_validated() {
        let v = ConfigValue::uri("https://example.com/config").unwrap();
        assert_eq!(v.as_uri().map(|u| u.host_str()), Some(Some("example.com")));
        assert!(matches!(
            ConfigValue::uri("not a uri"),
            Err(CoreError::InvalidUri { .. })
        ));
    }

    #[test]
    fn typed_accessors() {
        let v: ConfigValue = 42i64.into();
        assert_eq!(v.as_integer(), Some(42));
        assert_eq!(v.as_float(), Some(42.0));
        assert_eq!(v.as_text(), None);
        assert_eq!(ConfigValue::from("abc").as_text(), Some("abc"));
        assert_eq!(ConfigValue::from(true).as_boolean(), Some(true));
    }
}
