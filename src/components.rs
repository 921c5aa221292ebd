//! Component table: identifier to value mapping loaded from the component index.
//!
//! # Document Shape
//!
//! ```xml
//! <components>
//!   <!-- inline entries -->
//!   <index>
//!     <component id="engine.small" value="Small Engine"/>
//!   </index>
//!
//!   <!-- entries from another file, resolved relative to this one -->
//!   <index file="components/weapons.xml"/>
//!
//!   <!-- entries from every *.xml file in a directory, in name order -->
//!   <index dir="components/mods"/>
//! </components>
//! ```
//!
//! Referenced files have the same shape. A repeated `id` replaces the
//! earlier value.

use std::sync::{Arc, LazyLock};

use rustc_hash::FxHashMap;

use crate::config;
use crate::error::{LoadError, XmlError};
use crate::factory::{LoadArgs, LoadFactory};
use crate::progress::Progress;
use crate::singleton;
use crate::vfs::GameVfs;
use crate::xml::{
    AttributeSet, Flow, HandlerTable, ParseContext, ParseOutcome, ParseScope,
    UnknownElementPolicy, XmlLoader,
};

/// State accumulated while parsing.
struct Loading {
    components: FxHashMap<String, String>,
    progress: Arc<dyn Progress>,
}

/// Handlers shared by every load.
static HANDLERS: LazyLock<HandlerTable<Loading>> = LazyLock::new(|| {
    HandlerTable::new()
        .context(
            ParseContext::new(config::get().initial_context.clone())
                .unknown_elements(UnknownElementPolicy::Descend)
                .on("index", on_index),
        )
        .context(ParseContext::new("index").on("component", on_component))
});

fn on_index(
    scope: &mut ParseScope<'_, Loading>,
    state: &mut Loading,
    _name: &str,
    attrs: &AttributeSet,
) -> Result<Flow, XmlError> {
    if let Some(file) = attrs.get("file") {
        if include(scope, state, file)? == ParseOutcome::Stopped {
            return Ok(Flow::Stop);
        }
    }

    if let Some(dir) = attrs.get("dir") {
        let dir = scope.resolve(dir);
        let files: Vec<String> = scope
            .vfs()
            .list_children(&dir)?
            .into_iter()
            .filter(|path| path.ends_with(".xml"))
            // Subdirectories are listed too.
            .filter(|path| scope.vfs().exists(path))
            .collect();
        for file in &files {
            if include(scope, state, file)? == ParseOutcome::Stopped {
                return Ok(Flow::Stop);
            }
        }
    }

    scope.push_context("index")?;
    Ok(Flow::Continue)
}

fn include(
    scope: &ParseScope<'_, Loading>,
    state: &mut Loading,
    reference: &str,
) -> Result<ParseOutcome, XmlError> {
    state
        .progress
        .report(&format!("Loading {}...", scope.resolve(reference)));
    scope.include(reference, state)
}

fn on_component(
    scope: &mut ParseScope<'_, Loading>,
    state: &mut Loading,
    _name: &str,
    attrs: &AttributeSet,
) -> Result<Flow, XmlError> {
    let Some(id) = attrs.get("id") else {
        return Err(XmlError::handler(scope.path(), "<component> without an id"));
    };
    let value = attrs.get_or("value", "");

    if let Some(previous) = state.components.insert(id.to_string(), value.to_string()) {
        log::debug!("component '{id}' redefined in {} (was '{previous}')", scope.path());
    }
    Ok(Flow::Continue)
}

// =============================================================================
// GameComponents
// =============================================================================

/// Components in the game, keyed by identifier.
///
/// Normally obtained through the singleton registry:
///
/// ```ignore
/// use game_data::{GameComponents, LoadArgs};
///
/// let components = game_data::initialize::<GameComponents>(LoadArgs::silent(vfs))
///     .ok_or("failed to load components")?;
/// assert_eq!(components.component("engine.small"), Some("Small Engine"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GameComponents {
    components: FxHashMap<String, String>,
}

impl GameComponents {
    /// Load the table from `path`.
    ///
    /// On any failure the partially filled table is dropped.
    pub fn load(
        vfs: &GameVfs,
        path: &str,
        progress: Arc<dyn Progress>,
    ) -> Result<Self, LoadError> {
        progress.report("Loading components...");

        let mut state = Loading {
            components: FxHashMap::default(),
            progress,
        };
        let outcome = XmlLoader::new(&HANDLERS, vfs).parse_path(path, &mut state)?;
        if outcome == ParseOutcome::Stopped {
            return Err(LoadError::construction_failed::<Self>(format!(
                "parsing of {path} stopped early"
            )));
        }

        let count = state.components.len();
        state.progress.report(&format!("Loaded {count} components."));
        log::info!("loaded {count} components from {path}");
        Ok(Self {
            components: state.components,
        })
    }

    /// Get the value of a component, or `None` if the id is unknown.
    pub fn component(&self, id: &str) -> Option<&str> {
        self.components.get(id).map(String::as_str)
    }

    /// Check if a component id is known.
    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate over `(id, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.components.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The process-wide instance, if it has been initialized.
    pub fn instance() -> Option<Arc<Self>> {
        singleton::instance::<Self>()
    }
}

impl LoadFactory for GameComponents {
    type Args = LoadArgs;

    fn construct(args: LoadArgs) -> Result<Self, LoadError> {
        let path = args.root_or(&config::get().components_path).to_string();
        Self::load(&args.vfs, &path, Arc::clone(&args.progress)).map_err(|e| match e {
            LoadError::ConstructionFailed { .. } => e,
            other => LoadError::wrap::<Self>(other),
        })
    }
}
