//! A single named slot in the registry.

use std::any::{type_name, Any};
use std::sync::{Arc, Mutex, Once, PoisonError};

use super::{Registry, RegistryError};

/// Deferred initializer. Must call [`Registry::register`] for its own name.
pub(crate) type Initializer = Box<dyn FnOnce(&Registry) + Send + 'static>;

/// Marker recorded as the found type when an entry holds no value.
pub(crate) const ABSENT: &str = "no value";

/// A realized resource together with the name of its concrete type.
#[derive(Clone)]
struct Stored {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Registry entry.
///
/// Entries are replaced wholesale on re-registration; the stored value is
/// never mutated in place. The initializer slot is emptied by the once-guard
/// the first time it fires.
pub(crate) struct Entry {
    name: String,
    stored: Option<Stored>,
    initializer: Mutex<Option<Initializer>>,
    lazy: bool,
    once: Once,
}

impl Entry {
    /// An entry holding an already-initialized resource.
    pub(crate) fn ready<T: Any + Send + Sync>(name: String, value: Arc<T>) -> Self {
        Self {
            name,
            stored: Some(Stored {
                value,
                type_name: type_name::<T>(),
            }),
            initializer: Mutex::new(None),
            lazy: false,
            once: Once::new(),
        }
    }

    /// An entry whose value is produced by `init` on first use.
    pub(crate) fn lazy(name: String, init: Initializer) -> Self {
        Self {
            name,
            stored: None,
            initializer: Mutex::new(Some(init)),
            lazy: true,
            once: Once::new(),
        }
    }

    /// An entry with neither a value nor an initializer.
    pub(crate) fn reserved(name: String) -> Self {
        Self {
            name,
            stored: None,
            initializer: Mutex::new(None),
            lazy: false,
            once: Once::new(),
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.stored.is_some()
    }

    /// Whether the entry was registered with an initializer, fired or not.
    pub(crate) fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Run the initializer at most once. Concurrent callers block until the
    /// single run has finished.
    ///
    /// Returns `true` only for the caller whose closure actually ran.
    pub(crate) fn initialize(&self, registry: &Registry) -> bool {
        let mut ran = false;
        // `call_once_force` so a panicking initializer does not poison every
        // later lookup; the slot is already empty by then.
        self.once.call_once_force(|_| {
            let init = self
                .initializer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(init) = init {
                tracing::debug!(resource = %self.name, "Running lazy initializer");
                init(registry);
                ran = true;
            }
        });
        ran
    }

    /// Checked downcast of the stored value.
    pub(crate) fn downcast<T: Any + Send + Sync>(&self) -> Result<Arc<T>, RegistryError> {
        let mismatch = |found| RegistryError::TypeMismatch {
            name: self.name.clone(),
            expected: type_name::<T>(),
            found,
        };

        let stored = self.stored.as_ref().ok_or_else(|| mismatch(ABSENT))?;
        Arc::clone(&stored.value)
            .downcast::<T>()
            .map_err(|_| mismatch(stored.type_name))
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("type_name", &self.stored.as_ref().map(|s| s.type_name))
            .field("lazy", &self.lazy)
            .field("fired", &self.once.is_completed())
            .finish()
    }
}
