//! Sequential read stream over one resolved file.

use std::fmt;
use std::io::{self, Read};

use crate::error::VfsError;

/// An open file in the virtual filesystem.
///
/// Each handle owns its reader and position; handles opened on the same path
/// are independent of each other.
pub struct VfsHandle {
    path: String,
    source: String,
    reader: Box<dyn Read + Send>,
}

impl VfsHandle {
    pub(crate) fn new(path: String, source: &str, reader: Box<dyn Read + Send>) -> Self {
        Self {
            path,
            source: source.to_string(),
            reader,
        }
    }

    /// Normalized path this handle was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name of the backing source that served the file.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Read the remaining content.
    pub fn read_all(mut self) -> Result<Vec<u8>, VfsError> {
        let mut buf = Vec::new();
        self.reader
            .read_to_end(&mut buf)
            .map_err(|e| VfsError::io(self.path.clone(), e))?;
        Ok(buf)
    }
}

impl Read for VfsHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for VfsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VfsHandle")
            .field("path", &self.path)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
