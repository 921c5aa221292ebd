//! Configuration for game-data loading.
//!
//! This module provides runtime configuration for the XML loaders.
//! Use [`ConfigBuilder`] at application startup to override the defaults.

use std::sync::OnceLock;

use crate::xml::UnknownElementPolicy;

/// Global configuration, initialized via [`ConfigBuilder::init`].
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Default limit for nested file references.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

/// Default VFS path of the component index.
pub const DEFAULT_COMPONENTS_PATH: &str = "/data/components.xml";

/// Name of the context every parser run starts in.
pub const DEFAULT_INITIAL_CONTEXT: &str = "root";

/// Runtime configuration for game-data loading.
#[derive(Debug, Clone)]
pub struct Config {
    /// How many levels of file indirection a document may use.
    pub max_include_depth: usize,
    /// Policy for elements without a handler, unless a context overrides it.
    pub unknown_elements: UnknownElementPolicy,
    /// VFS path the component table is loaded from.
    pub components_path: String,
    /// Name of the context pushed at the start of every parser run.
    pub initial_context: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            unknown_elements: UnknownElementPolicy::Ignore,
            components_path: DEFAULT_COMPONENTS_PATH.to_string(),
            initial_context: DEFAULT_INITIAL_CONTEXT.to_string(),
        }
    }
}

/// Configuration builder for fluent API.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    max_include_depth: Option<usize>,
    unknown_elements: Option<UnknownElementPolicy>,
    components_path: Option<String>,
    initial_context: Option<String>,
}

impl ConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the file indirection limit.
    ///
    /// Default: 16
    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = Some(depth);
        self
    }

    /// Set the default policy for unhandled elements.
    ///
    /// Default: [`UnknownElementPolicy::Ignore`]
    pub fn unknown_elements(mut self, policy: UnknownElementPolicy) -> Self {
        self.unknown_elements = Some(policy);
        self
    }

    /// Set the VFS path of the component index.
    ///
    /// Default: "/data/components.xml"
    pub fn components_path(mut self, path: impl Into<String>) -> Self {
        self.components_path = Some(path.into());
        self
    }

    /// Set the name of the initial parse context.
    ///
    /// Default: "root"
    pub fn initial_context(mut self, name: impl Into<String>) -> Self {
        self.initial_context = Some(name.into());
        self
    }

    /// Build the configuration without installing it.
    pub fn build(self) -> Config {
        let defaults = Config::default();
        Config {
            max_include_depth: self.max_include_depth.unwrap_or(defaults.max_include_depth),
            unknown_elements: self.unknown_elements.unwrap_or(defaults.unknown_elements),
            components_path: self.components_path.unwrap_or(defaults.components_path),
            initial_context: self.initial_context.unwrap_or(defaults.initial_context),
        }
    }

    /// Build and initialize the global configuration.
    ///
    /// This can only be called once. Subsequent calls are ignored.
    /// Returns `true` if configuration was set, `false` if already initialized.
    ///
    /// # Example
    ///
    /// ```
    /// use game_data::config::ConfigBuilder;
    ///
    /// ConfigBuilder::new()
    ///     .components_path("/gamedata/components.xml")
    ///     .init();
    /// ```
    pub fn init(self) -> bool {
        CONFIG.set(self.build()).is_ok()
    }
}

/// Initialize with default configuration.
///
/// This is equivalent to `ConfigBuilder::new().init()`.
pub fn init_default() -> bool {
    ConfigBuilder::new().init()
}

/// Get the current configuration, or default if not initialized.
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}
