//! Layered filesystem over an ordered list of backing sources.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::handle::VfsHandle;
use super::path::{join, normalize};
use super::source::{BackingSource, DirSource, MapSource};
use crate::error::VfsError;

/// Read-only virtual filesystem merging several backing sources.
///
/// Sources are ordered by priority: a source added later shadows every
/// source added before it at identical paths. The usual setup is an archived
/// base layer followed by a loose-file override layer:
///
/// ```text
/// GameVfs
/// ├── [1] mods/override   (DirSource)   ◄── consulted first
/// └── [0] base.pak        (archive)
/// ```
///
/// The filesystem is immutable once built and can be shared freely between
/// threads; every [`open`](Self::open) returns an independent stream.
pub struct GameVfs {
    sources: Vec<Arc<dyn BackingSource>>,
}

impl GameVfs {
    /// Create a filesystem from sources in base-to-override order.
    pub fn new(sources: Vec<Arc<dyn BackingSource>>) -> Self {
        Self { sources }
    }

    /// Start building a filesystem.
    pub fn builder() -> GameVfsBuilder {
        GameVfsBuilder::default()
    }

    /// Sources from highest to lowest priority.
    fn by_priority(&self) -> impl Iterator<Item = &Arc<dyn BackingSource>> {
        self.sources.iter().rev()
    }

    /// Names of the sources in base-to-override order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name())
    }

    /// Open a file for sequential reading.
    ///
    /// Returns [`VfsError::NotFound`] if no source contains the path.
    pub fn open(&self, path: &str) -> Result<VfsHandle, VfsError> {
        let path = normalize(path);
        for source in self.by_priority() {
            match source.open(&path) {
                Ok(Some(reader)) => {
                    log::trace!("vfs: {path} served by {}", source.name());
                    return Ok(VfsHandle::new(path, source.name(), reader));
                }
                Ok(None) => {}
                Err(e) => return Err(VfsError::io(path, e)),
            }
        }
        Err(VfsError::not_found(path))
    }

    /// Check whether any source contains the file.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// Name of the source that would serve `path`.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        let path = normalize(path);
        self.by_priority()
            .find(|source| source.contains(&path))
            .map(|source| source.name())
    }

    /// Read a whole file.
    pub fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        self.open(path)?.read_all()
    }

    /// Read a whole file as UTF-8, stripping a BOM if present.
    pub fn read_to_string(&self, path: &str) -> Result<String, VfsError> {
        let bytes = self.read(path)?;
        decode_utf8(&bytes)
            .map(str::to_string)
            .map_err(|_| VfsError::InvalidUtf8 {
                path: normalize(path),
            })
    }

    /// List the direct children of a directory across all sources.
    ///
    /// Returns full paths, deduplicated and sorted. Returns
    /// [`VfsError::NotFound`] if no source knows the directory.
    pub fn list_children(&self, dir: &str) -> Result<Vec<String>, VfsError> {
        let dir = normalize(dir);
        let mut names = BTreeSet::new();
        let mut known = false;

        for source in &self.sources {
            match source.list(&dir) {
                Ok(Some(children)) => {
                    known = true;
                    names.extend(children);
                }
                Ok(None) => {}
                Err(e) => return Err(VfsError::io(dir, e)),
            }
        }

        if !known {
            return Err(VfsError::not_found(dir));
        }
        Ok(names.into_iter().map(|name| join(&dir, &name)).collect())
    }

    /// Read several files, returning results in input order.
    ///
    /// With the `batch` feature the reads run in parallel.
    #[cfg(feature = "batch")]
    pub fn read_many<P: AsRef<str> + Sync>(&self, paths: &[P]) -> Vec<Result<Vec<u8>, VfsError>> {
        use rayon::prelude::*;

        paths.par_iter().map(|p| self.read(p.as_ref())).collect()
    }

    /// Read several files, returning results in input order.
    #[cfg(not(feature = "batch"))]
    pub fn read_many<P: AsRef<str>>(&self, paths: &[P]) -> Vec<Result<Vec<u8>, VfsError>> {
        paths.iter().map(|p| self.read(p.as_ref())).collect()
    }
}

impl fmt::Debug for GameVfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameVfs")
            .field("sources", &self.sources().collect::<Vec<_>>())
            .finish()
    }
}

/// Decode bytes as UTF-8, stripping BOM if present.
pub fn decode_utf8(buf: &[u8]) -> Result<&str, std::str::Utf8Error> {
    let buf = buf.strip_prefix(b"\xef\xbb\xbf").unwrap_or(buf);
    std::str::from_utf8(buf)
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`GameVfs`].
///
/// Sources are added in base-to-override order.
#[derive(Default)]
pub struct GameVfsBuilder {
    sources: Vec<Arc<dyn BackingSource>>,
}

impl GameVfsBuilder {
    /// Add any source on top of the ones added so far.
    pub fn source<S: BackingSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Add a loose-file directory.
    pub fn dir(self, root: impl AsRef<Path>) -> Self {
        self.source(DirSource::new(root))
    }

    /// Add an in-memory source.
    pub fn map(self, source: MapSource) -> Self {
        self.source(source)
    }

    /// Finish building.
    pub fn build(self) -> GameVfs {
        GameVfs::new(self.sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn layered() -> GameVfs {
        GameVfs::builder()
            .map(
                MapSource::new("base")
                    .with("/index.xml", "base")
                    .with("/data/a.xml", "a")
                    .with("/data/b.xml", "b-base"),
            )
            .map(
                MapSource::new("override")
                    .with("/index.xml", "override")
                    .with("/data/b.xml", "b-override")
                    .with("/data/c.xml", "c"),
            )
            .build()
    }

    #[test]
    fn test_override_shadows_base() {
        let vfs = layered();
        assert_eq!(vfs.read_to_string("/index.xml").unwrap(), "override");
        assert_eq!(vfs.resolve("/index.xml"), Some("override"));
        assert_eq!(vfs.read_to_string("/data/a.xml").unwrap(), "a");
        assert_eq!(vfs.resolve("data/a.xml"), Some("base"));
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let vfs = layered();
        let err = vfs.open("/nope.xml").unwrap_err();
        assert!(err.is_not_found());
        assert!(!vfs.exists("/nope.xml"));
    }

    #[test]
    fn test_handles_are_independent() {
        let vfs = layered();
        let mut first = vfs.open("/index.xml").unwrap();
        let mut second = vfs.open("/index.xml").unwrap();

        let mut buf = [0u8; 4];
        first.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"over");

        let mut all = String::new();
        second.read_to_string(&mut all).unwrap();
        assert_eq!(all, "override");
        assert_eq!(second.source(), "override");
    }

    #[test]
    fn test_list_children_merges_sources() {
        let vfs = layered();
        assert_eq!(
            vfs.list_children("/data").unwrap(),
            vec!["/data/a.xml", "/data/b.xml", "/data/c.xml"]
        );
        assert!(vfs.list_children("/missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_dir_over_map() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.xml"), "\u{feff}loose").unwrap();

        let vfs = GameVfs::builder()
            .map(MapSource::new("base").with("/index.xml", "archived"))
            .dir(dir.path())
            .build();
        assert_eq!(vfs.read_to_string("/index.xml").unwrap(), "loose");
    }

    #[test]
    fn test_read_many_keeps_order() {
        let vfs = layered();
        let results = vfs.read_many(&["/data/c.xml", "/missing.xml", "/data/a.xml"]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), b"c");
        assert!(results[1].as_ref().unwrap_err().is_not_found());
        assert_eq!(results[2].as_ref().unwrap(), b"a");
    }

    #[test]
    fn test_decode_utf8_invalid() {
        assert!(decode_utf8(&[0xff, 0xfe]).is_err());
        assert_eq!(decode_utf8(b"\xef\xbb\xbfok").unwrap(), "ok");
    }
}
