//! Moving files into the archive without ever overwriting an existing file.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::{MvPeopleError, Result};

/// Highest numeric suffix tried before giving up on a destination.
pub const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// A move that is ready to run: the destination is known to be free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePlan {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// `dir/name.ext` becomes `dir/name-<n>.ext`; a name without extension gets `name-<n>`.
pub fn suffixed_path(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{n}"),
    };
    path.with_file_name(name)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveMover;

impl ArchiveMover {
    pub const fn new() -> Self {
        Self
    }

    /// Checks the source, creates the destination's parent directories and picks a free
    /// name. A missing source leaves the archive untouched.
    pub fn plan(&self, source: &Path, destination: &Path) -> Result<ArchivePlan> {
        let move_error = |operation: &str, source_err: io::Error| MvPeopleError::Move {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            operation: operation.to_string(),
            source: source_err,
        };

        fs::symlink_metadata(source).map_err(|e| move_error("read source", e))?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| move_error("create archive directory", e))?;
        }

        let mut candidate = destination.to_path_buf();
        let mut n = 0;
        while is_taken(&candidate).map_err(|e| move_error("check destination", e))? {
            n += 1;
            if n > MAX_COLLISION_SUFFIX {
                return Err(move_error(
                    "find free destination name",
                    io::Error::new(io::ErrorKind::AlreadyExists, "too many name collisions"),
                ));
            }
            candidate = suffixed_path(destination, n);
        }

        if n > 0 {
            debug!(requested = %destination.display(), chosen = %candidate.display(), "destination taken, using suffix");
        }

        Ok(ArchivePlan {
            source: source.to_path_buf(),
            destination: candidate,
        })
    }

    /// Links then unlinks within a volume; across volumes copies first and deletes the
    /// source only after the copy is synced and in place. Neither path replaces a file
    /// that appeared at the destination after planning.
    pub fn execute(&self, plan: &ArchivePlan) -> Result<()> {
        let ArchivePlan {
            source,
            destination,
        } = plan;

        match link_then_remove(source, destination) {
            Ok(()) => {}
            Err(e) if crosses_devices(&e) => {
                debug!(source = %source.display(), "rename crosses devices, copying");
                copy_then_remove(source, destination).map_err(|e| MvPeopleError::Move {
                    from: source.clone(),
                    to: destination.clone(),
                    operation: "copy across devices".to_string(),
                    source: e,
                })?;
            }
            Err(e) => {
                return Err(MvPeopleError::Move {
                    from: source.clone(),
                    to: destination.clone(),
                    operation: "link into archive".to_string(),
                    source: e,
                })
            }
        }

        info!(from = %source.display(), to = %destination.display(), "archived");
        Ok(())
    }

    /// Plans and executes a move, returning the path the file ended up at.
    pub fn move_file(&self, source: &Path, destination: &Path) -> Result<PathBuf> {
        let plan = self.plan(source, destination)?;
        self.execute(&plan)?;
        Ok(plan.destination)
    }
}

fn is_taken(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn crosses_devices(err: &io::Error) -> bool {
    // EXDEV on unix, ERROR_NOT_SAME_DEVICE on windows
    const CROSS_DEVICE: i32 = if cfg!(windows) { 17 } else { 18 };
    err.raw_os_error() == Some(CROSS_DEVICE)
}

fn link_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists || crosses_devices(&e) => {
            return Err(e)
        }
        Err(e) => {
            // filesystems without hard links (FAT, some network shares)
            debug!(error = %e, "hard link unsupported, renaming");
            if is_taken(destination)? {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "destination already exists",
                ));
            }
            return fs::rename(source, destination);
        }
    }

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

pub(crate) fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(parent)?;

    let mut input = File::open(source)?;
    io::copy(&mut input, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged
        .as_file()
        .set_permissions(input.metadata()?.permissions())?;

    staged.persist_noclobber(destination).map_err(|e| e.error)?;
    fs::remove_file(source)
}
