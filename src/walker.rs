//! Deterministic discovery of image files under a scan root.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{MvPeopleError, Result};

/// Extensions (lowercase, without the dot) that are treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

pub fn is_supported_image_format(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Walks a directory tree depth-first with siblings sorted by name.
///
/// Symbolic links are never followed and are never yielded, so link cycles cannot
/// occur. Unreadable directories are logged and skipped.
#[derive(Debug, Clone)]
pub struct ScanWalker {
    root: PathBuf,
}

impl ScanWalker {
    /// Canonicalizes `root` and checks that it is a directory.
    pub fn new(root: &Path) -> Result<Self> {
        let metadata = fs::metadata(root).map_err(|e| MvPeopleError::Scan {
            path: root.to_path_buf(),
            reason: format!("cannot access scan root: {e}"),
        })?;
        if !metadata.is_dir() {
            return Err(MvPeopleError::Scan {
                path: root.to_path_buf(),
                reason: "scan root is not a directory".to_string(),
            });
        }

        let root = fs::canonicalize(root).map_err(|e| MvPeopleError::Scan {
            path: root.to_path_buf(),
            reason: format!("cannot resolve scan root: {e}"),
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yields absolute image paths. Calling it again restarts from the top.
    pub fn images(&self) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_supported_image_format(entry.path()))
            .map(|entry| {
                debug!(path = %entry.path().display(), "found image");
                entry.into_path()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"x")
    }

    #[test]
    fn test_supported_formats() {
        let test_cases = vec![
            ("test.jpg", true),
            ("test.JPEG", true),
            ("test.Png", true),
            ("test.bmp", true),
            ("test.gif", true),
            ("test.tiff", true),
            ("test.txt", false),
            ("test", false),
            (".jpg", false),
        ];

        for (filename, expected) in test_cases {
            assert_eq!(
                is_supported_image_format(Path::new(filename)),
                expected,
                "{filename}"
            );
        }
    }

    #[test]
    fn test_walk_is_sorted_recursive_and_filtered() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        touch(&root.join("b.jpg"))?;
        touch(&root.join("a.PNG"))?;
        touch(&root.join("notes.txt"))?;
        touch(&root.join("sub/c.gif"))?;
        touch(&root.join("sub/deeper/d.jpeg"))?;
        fs::create_dir_all(root.join("empty.jpg.d"))?;

        let walker = ScanWalker::new(root)?;
        let found: Vec<PathBuf> = walker.images().collect();
        let canonical = fs::canonicalize(root)?;

        assert_eq!(
            found,
            vec![
                canonical.join("a.PNG"),
                canonical.join("b.jpg"),
                canonical.join("sub/c.gif"),
                canonical.join("sub/deeper/d.jpeg"),
            ]
        );
        assert!(found.iter().all(|p| p.is_absolute()));

        let again: Vec<PathBuf> = walker.images().collect();
        assert_eq!(found, again);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_scan_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = ScanWalker::new(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(MvPeopleError::Scan { .. })));
    }

    #[test]
    fn test_file_root_is_scan_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.jpg");
        touch(&file).unwrap();
        let result = ScanWalker::new(&file);
        assert!(matches!(result, Err(MvPeopleError::Scan { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_not_followed() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        touch(&root.join("sub/a.jpg"))?;
        std::os::unix::fs::symlink(root, root.join("sub/loop"))?;
        std::os::unix::fs::symlink(root.join("sub/a.jpg"), root.join("link.jpg"))?;

        let found: Vec<PathBuf> = ScanWalker::new(root)?.images().collect();
        assert_eq!(found, vec![fs::canonicalize(root)?.join("sub/a.jpg")]);
        Ok(())
    }
}
