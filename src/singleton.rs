//! Lazily constructed, process-wide instances keyed by type.
//!
//! Data tables are expensive to load, so each loader type is built once and
//! shared. Unlike `OnceLock`, a failed construction leaves the entry empty so
//! a later call can retry (for example after the data on disk was fixed).
//!
//! # Lifecycle
//!
//! ```text
//!            initialize()             construct() ok
//!   Empty ───────────────► Constructing ───────────────► Ready
//!     ▲                         │
//!     └─────────────────────────┘
//!          construct() failed
//! ```
//!
//! # Thread Safety
//!
//! Each type has its own construction lock, held for the whole construction.
//! Concurrent callers for the same type wait for the first one, then either
//! receive its instance or, if it failed, try again themselves. Reading an
//! instance never waits for a construction in progress.

use std::any::{Any, TypeId};
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::LoadError;
use crate::factory::LoadFactory;

/// Observable state of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No instance; the next `initialize` constructs one.
    Empty,
    /// A construction is running.
    Constructing,
    /// The instance is published.
    Ready,
}

enum Slot<T> {
    Empty,
    Constructing,
    Ready(Arc<T>),
}

impl<T> Slot<T> {
    fn state(&self) -> EntryState {
        match self {
            Slot::Empty => EntryState::Empty,
            Slot::Constructing => EntryState::Constructing,
            Slot::Ready(_) => EntryState::Ready,
        }
    }

    fn instance(&self) -> Option<Arc<T>> {
        match self {
            Slot::Ready(instance) => Some(Arc::clone(instance)),
            _ => None,
        }
    }
}

/// Per-type entry.
struct Entry<T> {
    construct: Mutex<()>,
    slot: RwLock<Slot<T>>,
}

impl<T> Entry<T> {
    fn new() -> Self {
        Self {
            construct: Mutex::new(()),
            slot: RwLock::new(Slot::Empty),
        }
    }
}

/// Puts the slot back to `Empty` if construction unwinds.
struct ConstructionGuard<'a, T> {
    slot: &'a RwLock<Slot<T>>,
    armed: bool,
}

impl<T> Drop for ConstructionGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            *self.slot.write() = Slot::Empty;
        }
    }
}

// =============================================================================
// SingletonRegistry
// =============================================================================

/// Registry of lazily constructed instances, one per [`LoadFactory`] type.
///
/// Most code uses the process-wide registry through [`initialize`] and
/// [`instance`]; separate registries are useful for tests and tools.
///
/// # Example
///
/// ```ignore
/// use game_data::{GameComponents, LoadArgs, SingletonRegistry};
///
/// let registry = SingletonRegistry::new();
/// let components = registry.initialize::<GameComponents>(LoadArgs::silent(vfs));
/// ```
#[derive(Default)]
pub struct SingletonRegistry {
    entries: RwLock<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SingletonRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the entry for `T`.
    fn entry<T: LoadFactory>(&self) -> Arc<Entry<T>> {
        if let Some(entry) = self.lookup::<T>() {
            return entry;
        }

        let mut entries = self.entries.write();
        let slot = entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(Entry::<T>::new()));
        match Arc::clone(slot).downcast::<Entry<T>>() {
            Ok(entry) => entry,
            // Unreachable while keys are `TypeId::of::<T>()`.
            Err(_) => {
                let entry = Arc::new(Entry::<T>::new());
                *slot = entry.clone();
                entry
            }
        }
    }

    /// Get the entry for `T` without creating it.
    fn lookup<T: LoadFactory>(&self) -> Option<Arc<Entry<T>>> {
        let entry = self.entries.read().get(&TypeId::of::<T>()).cloned()?;
        entry.downcast::<Entry<T>>().ok()
    }

    /// Initialize the instance of `T`.
    ///
    /// Returns the existing instance if there is one. Otherwise constructs
    /// it from `args`; on failure the entry stays empty and `None` is
    /// returned.
    ///
    /// # Note
    ///
    /// `args` are only used by the call that actually constructs. Once the
    /// instance exists, later calls return it and ignore their arguments,
    /// even if they differ.
    pub fn initialize<T: LoadFactory>(&self, args: T::Args) -> Option<Arc<T>> {
        match self.try_initialize::<T>(args) {
            Ok(instance) => Some(instance),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }

    /// Like [`initialize`](Self::initialize), but reports why construction failed.
    pub fn try_initialize<T: LoadFactory>(&self, args: T::Args) -> Result<Arc<T>, LoadError> {
        let entry = self.entry::<T>();
        if let Some(instance) = entry.slot.read().instance() {
            return Ok(instance);
        }

        let _lock = entry.construct.lock();
        // Another caller may have finished while we waited.
        if let Some(instance) = entry.slot.read().instance() {
            return Ok(instance);
        }

        *entry.slot.write() = Slot::Constructing;
        let mut guard = ConstructionGuard {
            slot: &entry.slot,
            armed: true,
        };

        let type_name = std::any::type_name::<T>();
        log::debug!("constructing {type_name}");
        let result = T::construct(args).and_then(|value| {
            if value.initialized() {
                Ok(value)
            } else {
                Err(LoadError::construction_failed::<T>(
                    "instance reported itself as not initialized",
                ))
            }
        });

        guard.armed = false;
        match result {
            Ok(value) => {
                let instance = Arc::new(value);
                *entry.slot.write() = Slot::Ready(Arc::clone(&instance));
                log::info!("{type_name} ready");
                Ok(instance)
            }
            Err(e) => {
                *entry.slot.write() = Slot::Empty;
                Err(e)
            }
        }
    }

    /// Get the instance of `T` if it has been initialized.
    ///
    /// Never constructs and never waits for a construction in progress.
    pub fn instance<T: LoadFactory>(&self) -> Option<Arc<T>> {
        self.lookup::<T>()?.slot.read().instance()
    }

    /// Current state of the entry for `T`.
    pub fn state<T: LoadFactory>(&self) -> EntryState {
        self.lookup::<T>()
            .map_or(EntryState::Empty, |entry| entry.slot.read().state())
    }

    /// Check if the instance of `T` is ready.
    pub fn is_ready<T: LoadFactory>(&self) -> bool {
        self.state::<T>() == EntryState::Ready
    }

    /// Drop the published instance of `T` so the next `initialize` reloads it.
    ///
    /// Waits for a construction in progress. Holders of the old instance keep
    /// it alive; it is returned.
    pub fn reset<T: LoadFactory>(&self) -> Option<Arc<T>> {
        let entry = self.lookup::<T>()?;
        let _lock = entry.construct.lock();
        let previous = std::mem::replace(&mut *entry.slot.write(), Slot::Empty);
        previous.instance()
    }
}

impl std::fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

// =============================================================================
// Global Registry
// =============================================================================

/// Process-wide registry.
static GLOBAL_REGISTRY: LazyLock<SingletonRegistry> = LazyLock::new(SingletonRegistry::new);

/// Get the process-wide registry.
pub fn global() -> &'static SingletonRegistry {
    &GLOBAL_REGISTRY
}

/// Initialize the process-wide instance of `T`.
///
/// See [`SingletonRegistry::initialize`].
pub fn initialize<T: LoadFactory>(args: T::Args) -> Option<Arc<T>> {
    global().initialize::<T>(args)
}

/// Initialize the process-wide instance of `T`, reporting failures.
pub fn try_initialize<T: LoadFactory>(args: T::Args) -> Result<Arc<T>, LoadError> {
    global().try_initialize::<T>(args)
}

/// Get the process-wide instance of `T` if it has been initialized.
pub fn instance<T: LoadFactory>() -> Option<Arc<T>> {
    global().instance::<T>()
}
