//! Backing sources for the virtual filesystem.
//!
//! A source is one physical location the filesystem can read from: a loose
//! directory, an in-memory map, or an archive reader provided by the
//! application.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::path::{child_of, normalize};

// =============================================================================
// BackingSource Trait
// =============================================================================

/// Trait for one layer of the virtual filesystem.
///
/// Paths passed in are already normalized (rooted, `/`-separated, no `.` or
/// `..` segments).
///
/// # Example
///
/// ```ignore
/// use game_data::vfs::{BackingSource, GameVfs};
/// use std::io::{self, Read};
///
/// struct PakSource { /* decoded archive index */ }
///
/// impl BackingSource for PakSource {
///     fn name(&self) -> &str { "base.pak" }
///
///     fn open(&self, path: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
///         // look up `path` in the archive index
///         Ok(None)
///     }
///
///     fn list(&self, dir: &str) -> io::Result<Option<Vec<String>>> {
///         Ok(None)
///     }
/// }
///
/// let vfs = GameVfs::builder()
///     .source(PakSource { })
///     .dir("mods/override")
///     .build();
/// ```
///
/// # Thread Safety
///
/// Sources are shared by every reader of the filesystem, so implementations
/// must be `Send + Sync` and must not keep a shared read cursor.
pub trait BackingSource: Send + Sync {
    /// Human-readable name, used in logs and [`VfsHandle::source`](super::VfsHandle::source).
    fn name(&self) -> &str;

    /// Open a file for reading.
    ///
    /// Return `Ok(None)` if this source does not contain the file, so that
    /// lower-priority sources are consulted.
    fn open(&self, path: &str) -> io::Result<Option<Box<dyn Read + Send>>>;

    /// List the names of the direct children of a directory.
    ///
    /// Return `Ok(None)` if this source does not know the directory.
    fn list(&self, dir: &str) -> io::Result<Option<Vec<String>>>;

    /// Check whether this source contains a file.
    fn contains(&self, path: &str) -> bool {
        matches!(self.open(path), Ok(Some(_)))
    }
}

// =============================================================================
// MapSource - In-memory Implementation
// =============================================================================

/// A simple map-based source.
///
/// Provides a convenient way to inject files without touching the disk.
///
/// # Example
///
/// ```
/// use game_data::vfs::MapSource;
///
/// let mut source = MapSource::new("patch");
/// source.insert("/data/components.xml", "<root/>");
/// assert!(source.contains_path("/data/components.xml"));
/// ```
#[derive(Clone, Default)]
pub struct MapSource {
    name: String,
    files: FxHashMap<String, Arc<[u8]>>,
}

impl MapSource {
    /// Create a new empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: FxHashMap::default(),
        }
    }

    /// Insert a file with string content.
    pub fn insert(&mut self, path: impl AsRef<str>, content: impl AsRef<str>) {
        self.insert_bytes(path, content.as_ref().as_bytes());
    }

    /// Insert a file with binary content.
    pub fn insert_bytes(&mut self, path: impl AsRef<str>, content: impl Into<Arc<[u8]>>) {
        self.files.insert(normalize(path.as_ref()), content.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, path: impl AsRef<str>, content: impl AsRef<str>) -> Self {
        self.insert(path, content);
        self
    }

    /// Check if a path exists.
    pub fn contains_path(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    /// Remove a file.
    pub fn remove(&mut self, path: &str) -> Option<Arc<[u8]>> {
        self.files.remove(&normalize(path))
    }

    /// Get the number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over all file paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl BackingSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, path: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
        Ok(self
            .files
            .get(path)
            .map(|data| Box::new(Cursor::new(Arc::clone(data))) as Box<dyn Read + Send>))
    }

    fn list(&self, dir: &str) -> io::Result<Option<Vec<String>>> {
        let children: BTreeSet<&str> = self
            .files
            .keys()
            .filter_map(|path| child_of(dir, path))
            .collect();
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(children.into_iter().map(str::to_string).collect()))
    }

    fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

// =============================================================================
// DirSource - Loose Files on Disk
// =============================================================================

/// Loose files below a host directory.
///
/// VFS paths are mapped below `root`; since paths are normalized before they
/// reach a source, a lookup can never leave the root directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    name: String,
    root: PathBuf,
}

impl DirSource {
    /// Create a source over `root`, named after the directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            name: root.display().to_string(),
            root,
        }
    }

    /// Override the source name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Host directory of this source.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a normalized VFS path to a host path.
    fn host_path(&self, path: &str) -> PathBuf {
        let mut host = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != "..") {
            host.push(segment);
        }
        host
    }
}

impl BackingSource for DirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, path: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
        let host = self.host_path(path);
        match fs::metadata(&host) {
            Ok(meta) if meta.is_file() => {
                let file = fs::File::open(&host)?;
                Ok(Some(Box::new(BufReader::new(file))))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self, dir: &str) -> io::Result<Option<Vec<String>>> {
        let entries = match fs::read_dir(self.host_path(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotADirectory => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(Some(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_source(source: &dyn BackingSource, path: &str) -> Option<String> {
        let mut reader = source.open(path).unwrap()?;
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        Some(text)
    }

    #[test]
    fn test_map_source_normalizes_keys() {
        let source = MapSource::new("mem").with("data\\a.xml", "<a/>");
        assert!(source.contains_path("/data/a.xml"));
        assert_eq!(read_source(&source, "/data/a.xml").as_deref(), Some("<a/>"));
        assert_eq!(read_source(&source, "/data/b.xml"), None);
    }

    #[test]
    fn test_map_source_list() {
        let source = MapSource::new("mem")
            .with("/data/b.xml", "")
            .with("/data/a.xml", "")
            .with("/data/sub/c.xml", "");
        assert_eq!(
            source.list("/data").unwrap(),
            Some(vec!["a.xml".to_string(), "b.xml".to_string(), "sub".to_string()])
        );
        assert_eq!(source.list("/nothing").unwrap(), None);
    }

    #[test]
    fn test_dir_source_reads_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/a.xml"), "<a/>").unwrap();

        let source = DirSource::new(dir.path());
        assert_eq!(read_source(&source, "/data/a.xml").as_deref(), Some("<a/>"));
        assert_eq!(read_source(&source, "/data/missing.xml"), None);
        // Directories are not files.
        assert_eq!(read_source(&source, "/data"), None);
    }

    #[test]
    fn test_dir_source_list() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/b.xml"), "").unwrap();
        fs::write(dir.path().join("data/a.xml"), "").unwrap();

        let source = DirSource::new(dir.path());
        assert_eq!(
            source.list("/data").unwrap(),
            Some(vec!["a.xml".to_string(), "b.xml".to_string()])
        );
        assert_eq!(source.list("/missing").unwrap(), None);
    }

    #[test]
    fn test_dir_source_stays_inside_root() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        fs::create_dir_all(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();

        let source = DirSource::new(&root);
        assert_eq!(read_source(&source, &normalize("/../secret.txt")), None);
        assert_eq!(read_source(&source, "/../secret.txt"), None);
    }
}
