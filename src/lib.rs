//! # game-data
//!
//! Loading framework for structured game data.
//!
//! Game data lives in XML documents spread over several storage layers (an
//! archived base layer, loose override files). This crate reads them through
//! one virtual filesystem and exposes the result as typed tables, each built
//! lazily and exactly once per process:
//!
//! - **Virtual filesystem**: ordered backing sources, later ones shadow earlier ones
//! - **XML loader**: streaming parser driven by a stack of named contexts
//! - **Load factory**: the contract a table implements to be built from a
//!   filesystem plus a progress channel
//! - **Singleton registry**: lazy, thread-safe, retryable construction per type
//!
//! ## Quick Start
//!
//! ```ignore
//! use game_data::{GameComponents, GameVfs, LoadArgs, LogProgress};
//! use std::sync::Arc;
//!
//! let vfs = Arc::new(
//!     GameVfs::builder()
//!         .source(my_archive)          // base layer
//!         .dir("mods/override")        // loose files win
//!         .build(),
//! );
//!
//! // Build once (typically on a worker thread behind a splash screen)
//! let components = game_data::initialize::<GameComponents>(LoadArgs::new(vfs, LogProgress))
//!     .ok_or("component table failed to load")?;
//!
//! // Anywhere else, later
//! let components = GameComponents::instance().unwrap();
//! println!("{:?}", components.component("engine.small"));
//! ```
//!
//! ## Modules
//!
//! - [`vfs`]: Virtual filesystem and backing sources
//! - [`xml`]: Context-stack XML loader
//! - [`singleton`]: Lazy instance registry
//! - [`config`]: Runtime configuration (root paths, include depth, unknown elements)
//! - [`components`]: The component table

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod components;
pub mod config;
pub mod error;
pub mod factory;
pub mod progress;
pub mod singleton;
pub mod vfs;
pub mod xml;

// =============================================================================
// Prelude - import commonly used items with a single `use`
// =============================================================================

/// Prelude module for convenient imports.
///
/// ```ignore
/// use game_data::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        GameComponents, GameVfs, LoadArgs, LoadError, LoadFactory, Progress, SingletonRegistry,
    };
    pub use crate::xml::{AttributeSet, Flow, HandlerTable, ParseContext, ParseScope, XmlLoader};
}

// =============================================================================
// Loading
// =============================================================================

pub use factory::{LoadArgs, LoadFactory};
pub use progress::{LogProgress, Progress, SilentProgress};
pub use singleton::{initialize, instance, try_initialize, EntryState, SingletonRegistry};

// =============================================================================
// Infrastructure
// =============================================================================

pub use config::{Config, ConfigBuilder};
pub use error::{LoadError, VfsError, XmlError};
pub use vfs::{BackingSource, DirSource, GameVfs, MapSource, VfsHandle};
pub use xml::{ParseOutcome, UnknownElementPolicy};

// =============================================================================
// Tables
// =============================================================================

pub use components::GameComponents;
