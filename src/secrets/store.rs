//! Environment store: allowlisted runtime settings shared with handlers.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::security::access_control::{is_allowlisted, ENV_ALLOWLIST};

/// Concurrent map of allowlisted keys to values.
///
/// Clones share the same map. The process environment is read once at
/// startup and never written.
#[derive(Clone, Default)]
pub struct EnvStore {
    values: Arc<DashMap<String, String>>,
}

impl EnvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a lookup function (normally `std::env::var`), allowlisted keys only.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = Self::new();
        for &key in ENV_ALLOWLIST {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                store.values.insert(key.to_string(), value);
            }
        }
        store
    }

    pub fn from_process_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Store a value. Callers enforce the allowlist before reaching here.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Configured allowlisted keys, sorted.
    pub fn configured_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| is_allowlisted(key))
            .collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for EnvStore {
    // Values are secrets; only keys are printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvStore")
            .field("keys", &self.configured_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_only_allowlisted_keys() {
        let store = EnvStore::from_lookup(|key| match key {
            "GROQ_API_KEY" => Some("gsk_test".into()),
            "FRED_API_KEY" => Some("   ".into()),
            "PATH" => Some("/usr/bin".into()),
            _ => None,
        });
        assert_eq!(store.get("GROQ_API_KEY").as_deref(), Some("gsk_test"));
        assert!(!store.contains("FRED_API_KEY"));
        assert!(!store.contains("PATH"));
    }

    #[test]
    fn clones_share_state() {
        let store = EnvStore::new();
        let view = store.clone();
        store.set("EIA_API_KEY", "abc");
        assert_eq!(view.get("EIA_API_KEY").as_deref(), Some("abc"));
        assert!(view.remove("EIA_API_KEY"));
        assert!(!store.contains("EIA_API_KEY"));
    }

    #[test]
    fn debug_hides_values() {
        let store = EnvStore::new();
        store.set("GROQ_API_KEY", "gsk_secret_value");
        let printed = format!("{store:?}");
        assert!(printed.contains("GROQ_API_KEY"));
        assert!(!printed.contains("gsk_secret_value"));
    }
}
