//! Error types for the filesystem, parser and loader layers.

use thiserror::Error;

/// Error raised by the virtual filesystem.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No backing source contains the path.
    #[error("file not found in any source: {path}")]
    NotFound {
        /// The normalized path that was looked up.
        path: String,
    },

    /// A source knows the path but reading it failed.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// The normalized path being read.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid UTF-8.
    #[error("file is not valid UTF-8: {path}")]
    InvalidUtf8 {
        /// The normalized path being decoded.
        path: String,
    },
}

impl VfsError {
    /// Create a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an I/O error for a path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Error raised while parsing an XML stream.
///
/// A handler asking to stop is not an error; see
/// [`ParseOutcome::Stopped`](crate::xml::ParseOutcome::Stopped).
#[derive(Debug, Error)]
pub enum XmlError {
    /// Structurally invalid markup, including unclosed elements at end of stream.
    #[error("malformed XML in {path} at byte {position}: {message}")]
    Malformed {
        /// Path of the document being parsed.
        path: String,
        /// Byte offset reported by the reader.
        position: u64,
        /// Description of the problem.
        message: String,
    },

    /// An element with no handler in a context whose policy rejects unknown elements.
    #[error("unexpected element <{element}> in context '{context}' ({path})")]
    UnknownElement {
        /// Path of the document being parsed.
        path: String,
        /// Name of the active context.
        context: String,
        /// Name of the rejected element.
        element: String,
    },

    /// File indirection nested deeper than the configured limit.
    #[error("include depth limit of {limit} exceeded at {path}")]
    IncludeDepthExceeded {
        /// Path that would have been opened.
        path: String,
        /// The configured limit.
        limit: usize,
    },

    /// A handler rejected the data it was given.
    #[error("invalid data in {path}: {message}")]
    Handler {
        /// Path of the document being parsed.
        path: String,
        /// Description supplied by the handler.
        message: String,
    },

    /// Opening or reading a file failed.
    #[error(transparent)]
    Vfs(#[from] VfsError),
}

impl XmlError {
    /// Create a malformed-markup error.
    pub fn malformed(path: impl Into<String>, position: u64, message: impl ToString) -> Self {
        Self::Malformed {
            path: path.into(),
            position,
            message: message.to_string(),
        }
    }

    /// Create a handler error.
    pub fn handler(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error comes from invalid markup rather than I/O or data.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Error returned by a [`LoadFactory`](crate::LoadFactory) construction.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The loader could not produce a fully initialized instance.
    #[error("failed to construct {type_name}: {reason}")]
    ConstructionFailed {
        /// Type name of the loader.
        type_name: &'static str,
        /// Why construction failed.
        reason: String,
    },

    /// Parsing failed.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// Filesystem access failed outside of parsing.
    #[error(transparent)]
    Vfs(#[from] VfsError),
}

impl LoadError {
    /// Create a construction failure for type `T`.
    pub fn construction_failed<T: ?Sized>(reason: impl Into<String>) -> Self {
        Self::ConstructionFailed {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Wrap any error as a construction failure for type `T`.
    pub fn wrap<T: ?Sized>(err: impl std::fmt::Display) -> Self {
        Self::construction_failed::<T>(err.to_string())
    }
}
