//! Virtual filesystem with layered backing sources.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Lookup Flow                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  "data\\items.xml" ──► normalize() ──► "/data/items.xml"    │
//! │                             │                               │
//! │                             ├─► source[n-1] (override)      │
//! │                             │     └─► hit? return handle    │
//! │                             ├─► ...                         │
//! │                             └─► source[0]   (base)          │
//! │                                   └─► miss: NotFound        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`BackingSource`] is the extension point: [`MapSource`] and [`DirSource`]
//! are provided, archive readers implement the same trait.

mod handle;
pub mod path;
mod source;
mod stack;

pub use handle::VfsHandle;
pub use source::{BackingSource, DirSource, MapSource};
pub use stack::{decode_utf8, GameVfs, GameVfsBuilder};
