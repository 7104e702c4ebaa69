//! Named resource registry.
//!
//! # Data Flow
//! ```text
//! producer
//!     → register(name, value)          eager, initialized immediately
//!     → register_lazy(name, init)      deferred, init runs on first get
//!
//! consumer
//!     → get::<T>(name)
//!         → lookup entry               NotFound / Uninitializable
//!         → entry once-guard           init runs at most once, callers wait
//!         → re-read entry              init replaced it via register()
//!         → checked downcast           TypeMismatch
//! ```
//!
//! # Design Decisions
//! - Explicit object shared as `Arc<Registry>`, not a process global
//! - Sharded map for name → entry; once-guard is per entry, so lookups of
//!   different names never contend on initialization
//! - No map shard is locked while an initializer runs (initializers call
//!   `register` for their own name)
//! - Re-registering a name replaces the entry (last write wins)
//! - Failed initialization is terminal; nothing is retried

mod entry;
mod error;

pub use error::RegistryError;

use std::any::{type_name, Any};
use std::sync::Arc;

use dashmap::DashMap;

use crate::observability::metrics;
use entry::Entry;

/// Thread-safe registry of named, shared resources.
#[derive(Debug, Default)]
pub struct Registry {
    entries: DashMap<String, Arc<Entry>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard every entry.
    ///
    /// Intended for test isolation and final teardown; callers must make sure
    /// no registration or lookup is in flight.
    pub fn reset(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        metrics::record_registry_size(0);
        tracing::debug!(dropped, "Registry reset");
    }

    /// Number of registered names, lazy or realized.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether `name` is registered. Never triggers initialization.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Register an already-initialized resource, replacing any previous entry.
    pub fn register<T>(&self, name: impl Into<String>, value: T) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
    {
        self.register_arc(name, Arc::new(value))
    }

    /// Register a resource that is already shared.
    pub fn register_arc<T>(&self, name: impl Into<String>, value: Arc<T>) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
    {
        let name = checked_name(name.into())?;
        let entry = Entry::ready(name.clone(), value);
        self.insert(name, entry, type_name::<T>());
        Ok(())
    }

    /// Register a resource whose value is produced on first [`get`](Self::get).
    ///
    /// `init` receives this registry and must call [`register`](Self::register)
    /// with the same name. It runs at most once, even under concurrent lookups.
    /// It must not look up its own name.
    pub fn register_lazy<F>(&self, name: impl Into<String>, init: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&Registry) + Send + 'static,
    {
        let name = checked_name(name.into())?;
        let entry = Entry::lazy(name.clone(), Box::new(init));
        self.insert(name, entry, "lazy");
        Ok(())
    }

    /// Reserve a name whose value will be supplied later through
    /// [`register`](Self::register). Until then lookups fail with
    /// [`RegistryError::Uninitializable`].
    pub fn reserve(&self, name: impl Into<String>) -> Result<(), RegistryError> {
        let name = checked_name(name.into())?;
        let entry = Entry::reserved(name.clone());
        self.insert(name, entry, "reserved");
        Ok(())
    }

    /// Retrieve the resource registered under `name` as a `T`.
    ///
    /// Runs the entry's initializer first if it has not fired yet.
    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, RegistryError>
    where
        T: Any + Send + Sync,
    {
        let entry = self.lookup(name)?;

        if !entry.is_initialized() && !entry.is_lazy() {
            return Err(RegistryError::Uninitializable(name.to_string()));
        }

        if entry.is_lazy() && entry.initialize(self) {
            metrics::record_initialization();
        }

        // The initializer normally replaces the entry through `register`.
        let entry = self.lookup(name)?;
        let value = entry.downcast::<T>();
        if let Err(err) = &value {
            tracing::debug!(resource = %name, error = %err, "Resource lookup failed");
        }
        value
    }

    /// All registered names in ascending lexical order.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn lookup(&self, name: &str) -> Result<Arc<Entry>, RegistryError> {
        // Clone the Arc out so the shard lock is released before any
        // initializer runs.
        self.entries
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn insert(&self, name: String, entry: Entry, kind: &'static str) {
        let replaced = self.entries.insert(name.clone(), Arc::new(entry)).is_some();
        metrics::record_registry_size(self.entries.len());
        tracing::debug!(resource = %name, kind, replaced, "Resource registered");
    }
}

fn checked_name(name: String) -> Result<String, RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::InvalidName);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Client {
        endpoint: String,
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = Registry::new();
        assert_eq!(
            registry.get::<u32>("missing").unwrap_err(),
            RegistryError::NotFound("missing".into())
        );
        assert_eq!(
            registry.get::<String>("missing").unwrap_err(),
            RegistryError::NotFound("missing".into())
        );
    }

    #[test]
    fn eager_value_round_trips() {
        let registry = Registry::new();
        registry
            .register("db", Client { endpoint: "db:5432".into() })
            .unwrap();

        let client = registry.get::<Client>("db").unwrap();
        assert_eq!(client.endpoint, "db:5432");
    }

    #[test]
    fn register_arc_shares_the_same_allocation() {
        let registry = Registry::new();
        let shared = Arc::new(Client { endpoint: "x".into() });
        registry.register_arc("c", Arc::clone(&shared)).unwrap();

        assert!(Arc::ptr_eq(&shared, &registry.get::<Client>("c").unwrap()));
    }

    #[test]
    fn wrong_type_is_a_mismatch() {
        let registry = Registry::new();
        registry.register("x", 42i32).unwrap();

        match registry.get::<String>("x") {
            Err(RegistryError::TypeMismatch { name, expected, found }) => {
                assert_eq!(name, "x");
                assert_eq!(expected, type_name::<String>());
                assert_eq!(found, type_name::<i32>());
            }
            other => panic!("expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = Registry::new();
        assert_eq!(registry.register("", 1u8), Err(RegistryError::InvalidName));
        assert_eq!(registry.register_lazy("", |_| {}), Err(RegistryError::InvalidName));
        assert_eq!(registry.reserve(""), Err(RegistryError::InvalidName));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn lazy_initializer_runs_on_first_get_only() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry
            .register_lazy("api", move |r| {
                counter.fetch_add(1, Ordering::SeqCst);
                r.register("api", Client { endpoint: "api:443".into() }).unwrap();
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let first = registry.get::<Client>("api").unwrap();
        let second = registry.get::<Client>("api").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn eager_registration_never_runs_an_initializer() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry
            .register_lazy("svc", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        registry.register("svc", 7u64).unwrap();

        assert_eq!(*registry.get::<u64>("svc").unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn initializer_that_never_registers_leaves_no_value() {
        let registry = Registry::new();
        registry.register_lazy("broken", |_| {}).unwrap();

        for _ in 0..2 {
            match registry.get::<Client>("broken") {
                Err(RegistryError::TypeMismatch { found, .. }) => assert_eq!(found, entry::ABSENT),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn reserved_name_is_uninitializable_until_registered() {
        let registry = Registry::new();
        registry.reserve("later").unwrap();
        assert_eq!(
            registry.get::<u8>("later").unwrap_err(),
            RegistryError::Uninitializable("later".into())
        );

        registry.register("later", 3u8).unwrap();
        assert_eq!(*registry.get::<u8>("later").unwrap(), 3);
    }

    #[test]
    fn list_names_is_sorted_and_reset_clears() {
        let registry = Registry::new();
        registry.register("b", 1u8).unwrap();
        registry.register_lazy("a", |_| {}).unwrap();
        assert_eq!(registry.list_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.count(), 2);

        registry.reset();
        assert!(registry.list_names().is_empty());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn reregistering_overwrites() {
        let registry = Registry::new();
        registry.register("n", 1u8).unwrap();
        registry.register("n", "two".to_string()).unwrap();

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get::<String>("n").unwrap().as_str(), "two");
    }

    #[test]
    fn contains_does_not_initialize() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry
            .register_lazy("c", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(registry.contains("c"));
        assert!(!registry.contains("d"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
