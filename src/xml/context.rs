//! Parse contexts and the handler dispatch table.
//!
//! A loader describes its document shape as a set of named contexts, each
//! mapping element names to handlers:
//!
//! ```text
//! HandlerTable
//! ├── "root"  ── index     ─► on_index      (pushes "index")
//! └── "index" ── component ─► on_component
//! ```
//!
//! Dispatch is a lookup on `(active context, element name)`.

use rustc_hash::FxHashMap;

use super::attributes::AttributeSet;
use super::loader::ParseScope;
use crate::config;
use crate::error::XmlError;

/// What to do with an element that has no handler in the active context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownElementPolicy {
    /// Skip the element and its whole subtree.
    #[default]
    Ignore,
    /// Parse the element's children in the same context, as if the element
    /// were not there.
    Descend,
    /// Fail the parse with [`XmlError::UnknownElement`].
    Error,
}

/// Whether parsing of the current stream goes on after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep parsing.
    Continue,
    /// Abort the current stream; reported as [`ParseOutcome::Stopped`](super::ParseOutcome::Stopped).
    Stop,
}

impl From<bool> for Flow {
    fn from(keep_going: bool) -> Self {
        if keep_going { Flow::Continue } else { Flow::Stop }
    }
}

/// Start-element handler.
///
/// Receives the parse scope (to push contexts or include files), the loader's
/// state, the element name and its attributes.
pub type Handler<S> = Box<
    dyn Fn(&mut ParseScope<'_, S>, &mut S, &str, &AttributeSet) -> Result<Flow, XmlError>
        + Send
        + Sync,
>;

/// A named parser state and the element handlers valid while it is active.
pub struct ParseContext<S> {
    name: String,
    handlers: FxHashMap<String, Handler<S>>,
    unknown: Option<UnknownElementPolicy>,
}

impl<S> ParseContext<S> {
    /// Create a context with no handlers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: FxHashMap::default(),
            unknown: None,
        }
    }

    /// Register the handler for `element`, replacing any previous one.
    pub fn on<F>(mut self, element: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut ParseScope<'_, S>, &mut S, &str, &AttributeSet) -> Result<Flow, XmlError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(element.into(), Box::new(handler));
        self
    }

    /// Override the loader's unknown-element policy inside this context.
    pub fn unknown_elements(mut self, policy: UnknownElementPolicy) -> Self {
        self.unknown = Some(policy);
        self
    }

    /// Context name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler registered for `element`.
    pub fn handler(&self, element: &str) -> Option<&Handler<S>> {
        self.handlers.get(element)
    }

    /// Policy set on this context, if any.
    pub fn policy(&self) -> Option<UnknownElementPolicy> {
        self.unknown
    }
}

impl<S> std::fmt::Debug for ParseContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut elements: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        elements.sort_unstable();
        f.debug_struct("ParseContext")
            .field("name", &self.name)
            .field("elements", &elements)
            .field("unknown", &self.unknown)
            .finish()
    }
}

/// All contexts of one document shape, plus the context runs start in.
pub struct HandlerTable<S> {
    initial: String,
    contexts: FxHashMap<String, ParseContext<S>>,
}

impl<S> HandlerTable<S> {
    /// Create an empty table starting in the configured initial context.
    pub fn new() -> Self {
        Self::with_initial(config::get().initial_context.clone())
    }

    /// Create an empty table starting in `initial`.
    pub fn with_initial(initial: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            contexts: FxHashMap::default(),
        }
    }

    /// Add a context, replacing one with the same name.
    pub fn context(mut self, context: ParseContext<S>) -> Self {
        self.contexts.insert(context.name.clone(), context);
        self
    }

    /// Name of the context every run starts in.
    pub fn initial(&self) -> &str {
        &self.initial
    }

    /// Look up a context.
    pub fn get(&self, name: &str) -> Option<&ParseContext<S>> {
        self.contexts.get(name)
    }

    /// Check if a context is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.contexts.contains_key(name)
    }

    /// Handler for `element` in `context`.
    pub fn lookup(&self, context: &str, element: &str) -> Option<&Handler<S>> {
        self.get(context)?.handler(element)
    }
}

impl<S> Default for HandlerTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for HandlerTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field("initial", &self.initial)
            .field("contexts", &self.contexts)
            .finish()
    }
}
