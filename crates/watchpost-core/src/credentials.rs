//! Credential validation.
//!
//! The session layer only asks one question of the platform: does this
//! application key exist for the principal? [`StaticKeyValidator`] answers
//! from a configured key table. Expiry is not checked.

use std::collections::{HashMap, HashSet};

/// Principal whose application keys are accepted by default.
pub const DEFAULT_PRINCIPAL: &str = "Administrator";

/// Answers whether an application key identifies an existing credential.
pub trait CredentialValidator: Send + Sync {
    /// `true` if `key` is a known application key of `principal`.
    fn credential_exists(&self, principal: &str, key: &str) -> bool;
}

/// In-memory key table, keyed by principal.
#[derive(Clone, Debug, Default)]
pub struct StaticKeyValidator {
    keys: HashMap<String, HashSet<String>>,
}

impl StaticKeyValidator {
    /// Empty table. Rejects every key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding `keys` for a single principal. Empty keys are skipped.
    pub fn for_principal<I, S>(principal: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut validator = Self::new();
        let principal = principal.into();
        for key in keys {
            validator.insert(principal.clone(), key);
        }
        validator
    }

    /// Add one key for `principal`. Empty keys are ignored.
    pub fn insert(&mut self, principal: impl Into<String>, key: impl Into<String>) {
        let key = key.into();
        if key.is_empty() {
            return;
        }
        let _ = self.keys.entry(principal.into()).or_default().insert(key);
    }

    /// Number of keys across all principals.
    pub fn len(&self) -> usize {
        self.keys.values().map(HashSet::len).sum()
    }

    /// Whether the table holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialValidator for StaticKeyValidator {
    fn credential_exists(&self, principal: &str, key: &str) -> bool {
        !key.is_empty()
            && self
                .keys
                .get(principal)
                .is_some_and(|keys| keys.contains(key))
    }
}
