//! Flat key/value configuration store.
//!
//! String values keyed by name, typically seeded from environment variables
//! at startup and read by request handlers.

use std::ffi::OsString;

use dashmap::DashMap;

use crate::environment::{ProcessVars, Vars};

#[derive(Debug, Default)]
pub struct ConfigStore {
    values: DashMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every key.
    pub fn reset(&self) {
        self.values.clear();
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Insert or replace a value.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    /// Read the process variable `key`, storing it when set and non-empty.
    pub fn load_from_env(&self, key: &str) -> Option<String> {
        self.load_from(&ProcessVars, key)
    }

    /// Like [`load_from_env`](Self::load_from_env) with an explicit source.
    pub fn load_from(&self, vars: &dyn Vars, key: &str) -> Option<String> {
        let value = vars.var(key).filter(|v| !v.is_empty());
        match &value {
            Some(value) => self.put(key, value.clone()),
            None => tracing::debug!(key, "No value found in environment"),
        }
        value
    }

    /// Copy every process variable into the store.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn load_all_from_env(&self) {
        self.load_all_from(std::env::vars_os());
    }

    fn load_all_from<I>(&self, vars: I)
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        for (key, value) in vars {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => self.put(key, value),
                (key, _) => {
                    let key = key.unwrap_or_else(|k| k.to_string_lossy().into_owned());
                    tracing::debug!(key = %key, "Skipping non-Unicode environment variable");
                }
            }
        }
    }

    /// Stored keys in ascending order.
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}
