//! The construction contract implemented by every data table.

use std::fmt;
use std::sync::Arc;

use crate::error::LoadError;
use crate::progress::{Progress, SilentProgress};
use crate::vfs::GameVfs;

/// How a type is built from its constructor arguments.
///
/// The [`SingletonRegistry`](crate::SingletonRegistry) calls through this
/// trait. An implementation must either return a fully populated value or
/// fail; partially parsed state never leaves `construct`.
///
/// # Example
///
/// ```ignore
/// use game_data::{LoadArgs, LoadError, LoadFactory};
///
/// struct Items { /* ... */ }
///
/// impl LoadFactory for Items {
///     type Args = LoadArgs;
///
///     fn construct(args: LoadArgs) -> Result<Self, LoadError> {
///         args.progress.report("Loading items...");
///         let text = args.vfs.read_to_string("/data/items.xml")?;
///         // parse `text` into a local table, then:
///         Ok(Items { /* ... */ })
///     }
/// }
/// ```
pub trait LoadFactory: Sized + Send + Sync + 'static {
    /// Constructor arguments.
    type Args;

    /// Build a new instance.
    fn construct(args: Self::Args) -> Result<Self, LoadError>;

    /// Post-construction validation.
    ///
    /// Returning `false` makes the registry discard the instance as if
    /// construction had failed.
    fn initialized(&self) -> bool {
        true
    }
}

/// Standard constructor arguments: a filesystem and a progress channel.
#[derive(Clone)]
pub struct LoadArgs {
    /// Filesystem to load from.
    pub vfs: Arc<GameVfs>,
    /// Receiver of status messages.
    pub progress: Arc<dyn Progress>,
    /// Document to load instead of the loader's configured one.
    pub root: Option<String>,
}

impl LoadArgs {
    /// Create arguments with a progress reporter.
    pub fn new(vfs: Arc<GameVfs>, progress: impl Progress + 'static) -> Self {
        Self {
            vfs,
            progress: Arc::new(progress),
            root: None,
        }
    }

    /// Load from `path` instead of the loader's configured document.
    pub fn with_root(mut self, path: impl Into<String>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// The root document override, or `default`.
    pub fn root_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.root.as_deref().unwrap_or(default)
    }

    /// Create arguments that discard progress messages.
    pub fn silent(vfs: Arc<GameVfs>) -> Self {
        Self::new(vfs, SilentProgress)
    }
}

impl fmt::Debug for LoadArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadArgs")
            .field("vfs", &self.vfs)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
