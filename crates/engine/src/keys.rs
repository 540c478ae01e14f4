//! Backend key layout.
//!
//! `meta/<scope>` holds one metadata record per scope.
//! `rev/<len>:<property>/<scope>/<revision>` holds one revision entry; the
//! length prefix keeps property names containing `/` from aliasing, and the
//! zero-padded revision keeps prefix scans in revision order.
//! `scopes/epoch` is a bare counter whose version moves on scope creation.

use confstore_core::ScopeId;

pub const META_PREFIX: &str = "meta/";

/// Bumped in the same transaction that creates any scope.
pub const SCOPE_EPOCH_KEY: &str = "scopes/epoch";

pub fn meta_key(scope: &ScopeId) -> String {
    format!("{META_PREFIX}{}", scope.to_hex())
}

pub fn rev_prefix(property: &str, scope: &ScopeId) -> String {
    format!("rev/{}:{}/{}/", property.len(), property, scope.to_hex())
}

pub fn rev_key(property: &str, scope: &ScopeId, revision: u64) -> String {
    format!("{}{:020}", rev_prefix(property, scope), revision)
}

pub fn parse_revision(key: &str, prefix: &str) -> Option<u64> {
    key.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use confstore_core::ParameterSet;

    #[test]
    fn revision_keys_sort_numerically() {
        let scope = ParameterSet::empty().scope_id();
        assert!(rev_key("p", &scope, 9) < rev_key("p", &scope, 10));
        let prefix = rev_prefix("p", &scope);
        assert_eq!(parse_revision(&rev_key("p", &scope, 42), &prefix), Some(42));
    }

    #[test]
    fn property_names_do_not_alias() {
        let scope = ParameterSet::empty().scope_id();
        let short = rev_prefix("a", &scope);
        let long = rev_key("a/b", &scope, 1);
        assert!(!long.starts_with(&short));
    }
}
