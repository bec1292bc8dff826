//! Archive destination computation.
//!
//! Everything here works on path strings only and never touches the filesystem, so the
//! layout rules can be checked with synthetic paths.

use std::path::{Component, Path, PathBuf};

use crate::errors::{MvPeopleError, Result};

/// Resolves `.` and `..` components without consulting the filesystem.
///
/// A `..` directly under the root is dropped; leading `..` of a relative path is kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Computes where `source`, found under `scan_root`, lands inside `archive_dir`.
///
/// Without a structure root the archive is flat (`archive_dir/<file name>`). With one,
/// every directory between the structure root and the file is kept.
pub fn resolve(
    source: &Path,
    scan_root: &Path,
    archive_dir: &Path,
    structure_root: Option<&Path>,
) -> Result<PathBuf> {
    let source = normalize_lexically(source);
    let archive_dir = normalize_lexically(archive_dir);
    relative_to(&source, &normalize_lexically(scan_root))?;

    match structure_root {
        None => {
            let name = source.file_name().ok_or_else(|| MvPeopleError::Path {
                path: source.clone(),
                root: archive_dir.clone(),
                reason: "source has no file name".to_string(),
            })?;
            Ok(archive_dir.join(name))
        }
        Some(root) => {
            let root = normalize_lexically(root);
            let relative = relative_to(&source, &root)?;
            Ok(archive_dir.join(relative))
        }
    }
}

fn relative_to(path: &Path, root: &Path) -> Result<PathBuf> {
    match path.strip_prefix(root) {
        Ok(relative) if relative.components().next().is_some() => Ok(relative.to_path_buf()),
        Ok(_) => Err(MvPeopleError::Path {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
            reason: "path is the root itself".to_string(),
        }),
        Err(_) => Err(MvPeopleError::Path {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
            reason: "path is not under root".to_string(),
        }),
    }
}

/// Archive layout for one run: scan root, archive directory and optional structure root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    scan_root: PathBuf,
    archive_dir: PathBuf,
    structure_root: Option<PathBuf>,
}

impl PathResolver {
    /// Builds the layout, rejecting a scan root that lies outside the structure root.
    ///
    /// Every scanned file lives under the scan root, so this single check guarantees that
    /// [`PathResolver::resolve`] cannot fail on the root relationship mid-run.
    pub fn new(
        scan_root: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        structure_root: Option<PathBuf>,
    ) -> Result<Self> {
        let scan_root = normalize_lexically(&scan_root.into());
        let archive_dir = normalize_lexically(&archive_dir.into());
        let structure_root = structure_root.map(|root| normalize_lexically(&root));

        if let Some(root) = &structure_root {
            if !scan_root.starts_with(root) {
                return Err(MvPeopleError::Path {
                    path: scan_root,
                    root: root.clone(),
                    reason: "scanned folder is not under root".to_string(),
                });
            }
        }

        Ok(Self {
            scan_root,
            archive_dir,
            structure_root,
        })
    }

    pub fn scan_root(&self) -> &Path {
        &self.scan_root
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn structure_root(&self) -> Option<&Path> {
        self.structure_root.as_deref()
    }

    pub fn resolve(&self, source: &Path) -> Result<PathBuf> {
        resolve(
            source,
            &self.scan_root,
            &self.archive_dir,
            self.structure_root.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_archive_uses_file_name() -> Result<()> {
        let dest = resolve(
            Path::new("/photos/vacation/img1.jpg"),
            Path::new("/photos"),
            Path::new("/archive"),
            None,
        )?;
        assert_eq!(dest, Path::new("/archive/img1.jpg"));
        Ok(())
    }

    #[test]
    fn test_structure_root_preserves_segments() -> Result<()> {
        let dest = resolve(
            Path::new("/photos/vacation/2023/beach/img1.jpg"),
            Path::new("/photos/vacation"),
            Path::new("/archive"),
            Some(Path::new("/photos")),
        )?;
        assert_eq!(dest, Path::new("/archive/vacation/2023/beach/img1.jpg"));
        Ok(())
    }

    #[test]
    fn test_suffix_law_over_several_paths() -> Result<()> {
        let root = Path::new("/data/pictures");
        let cases = [
            "/data/pictures/a.png",
            "/data/pictures/x/y/z/b.JPG",
            "/data/pictures/with space/c.jpeg",
        ];

        for source in cases {
            let source = Path::new(source);
            let dest = resolve(source, root, Path::new("/arch"), Some(root))?;
            assert!(dest.starts_with("/arch"));
            assert_eq!(
                dest.strip_prefix("/arch").ok(),
                source.strip_prefix(root).ok()
            );
        }
        Ok(())
    }

    #[test]
    fn test_source_outside_root_is_rejected() {
        let result = resolve(
            Path::new("/elsewhere/img.jpg"),
            Path::new("/elsewhere"),
            Path::new("/archive"),
            Some(Path::new("/photos")),
        );
        assert!(matches!(result, Err(MvPeopleError::Path { .. })));
    }

    #[test]
    fn test_sibling_prefix_is_not_a_descendant() {
        // "/photos2" shares a string prefix with "/photos" but is not under it.
        let result = resolve(
            Path::new("/photos2/img.jpg"),
            Path::new("/photos2"),
            Path::new("/archive"),
            Some(Path::new("/photos")),
        );
        assert!(matches!(result, Err(MvPeopleError::Path { .. })));
    }

    #[test]
    fn test_dot_dot_cannot_escape_root() {
        let result = resolve(
            Path::new("/photos/../secret/img.jpg"),
            Path::new("/"),
            Path::new("/archive"),
            Some(Path::new("/photos")),
        );
        assert!(matches!(result, Err(MvPeopleError::Path { .. })));
    }

    #[test]
    fn test_source_outside_scan_root_is_rejected() {
        let result = resolve(
            Path::new("/downloads/img.jpg"),
            Path::new("/photos"),
            Path::new("/archive"),
            None,
        );
        assert!(matches!(result, Err(MvPeopleError::Path { .. })));

        let resolver = PathResolver::new("/photos/vacation", "/archive", Some("/photos".into()))
            .unwrap();
        assert_eq!(resolver.scan_root(), Path::new("/photos/vacation"));
        let result = resolver.resolve(Path::new("/photos/work/img.jpg"));
        assert!(matches!(result, Err(MvPeopleError::Path { .. })));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            Path::new("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/../a")), Path::new("/a"));
        assert_eq!(
            normalize_lexically(Path::new("../a/./b")),
            Path::new("../a/b")
        );
        assert_eq!(normalize_lexically(Path::new("./archive")), Path::new("archive"));
    }

    #[test]
    fn test_resolver_rejects_scan_root_outside_structure_root() {
        let result = PathResolver::new("/photos", "/archive", Some("/other".into()));
        assert!(matches!(result, Err(MvPeopleError::Path { .. })));
    }

    #[test]
    fn test_resolver_accepts_coinciding_roots() -> Result<()> {
        let resolver = PathResolver::new("/photos", "/archive", Some("/photos".into()))?;
        let dest = resolver.resolve(Path::new("/photos/sub/img.png"))?;
        assert_eq!(dest, Path::new("/archive/sub/img.png"));
        assert_eq!(resolver.structure_root(), Some(Path::new("/photos")));
        Ok(())
    }

    #[test]
    fn test_vacation_scenario() -> Result<()> {
        let resolver = PathResolver::new(
            "/home/u/photos/vacation",
            "/archive",
            Some("/home/u/photos".into()),
        )?;
        let dest = resolver.resolve(Path::new("/home/u/photos/vacation/img1.jpg"))?;
        assert_eq!(dest, Path::new("/archive/vacation/img1.jpg"));
        Ok(())
    }
}
