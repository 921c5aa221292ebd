//! Path utilities.
//!
//! VFS paths are plain strings rooted at `/` with `/` separators, independent
//! of the host platform.

/// Normalize a VFS path to rooted form.
///
/// - Backslashes are treated as separators
/// - Empty and `.` segments are dropped
/// - `..` removes the previous segment and never climbs above the root
#[inline]
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    for segment in &segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Directory part of a normalized path (`/` for top-level files).
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Last segment of a normalized path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Resolve `reference` against the directory `base_dir`.
///
/// Rooted references are taken as-is.
pub fn join(base_dir: &str, reference: &str) -> String {
    if reference.starts_with('/') || reference.starts_with('\\') {
        normalize(reference)
    } else {
        normalize(&format!("{base_dir}/{reference}"))
    }
}

/// Check whether `path` is a direct child of the normalized directory `dir`,
/// returning the child segment.
pub fn child_of<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    let rest = if dir == "/" {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(dir)?.strip_prefix('/')?
    };
    let segment = rest.split('/').next()?;
    (!segment.is_empty()).then_some(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("data/index.xml"), "/data/index.xml");
        assert_eq!(normalize("/data//./index.xml"), "/data/index.xml");
        assert_eq!(normalize("\\data\\index.xml"), "/data/index.xml");
        assert_eq!(normalize("/data/sub/../index.xml"), "/data/index.xml");
        assert_eq!(normalize("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn test_parent_and_file_name() {
        assert_eq!(parent("/data/index.xml"), "/data");
        assert_eq!(parent("/index.xml"), "/");
        assert_eq!(file_name("/data/index.xml"), "index.xml");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/data", "parts/a.xml"), "/data/parts/a.xml");
        assert_eq!(join("/data", "../b.xml"), "/b.xml");
        assert_eq!(join("/data", "/other/c.xml"), "/other/c.xml");
    }

    #[test]
    fn test_child_of() {
        assert_eq!(child_of("/data", "/data/a.xml"), Some("a.xml"));
        assert_eq!(child_of("/data", "/data/sub/b.xml"), Some("sub"));
        assert_eq!(child_of("/data", "/database/a.xml"), None);
        assert_eq!(child_of("/", "/a.xml"), Some("a.xml"));
    }
}
