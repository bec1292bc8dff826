use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detector::DEFAULT_CONFIDENCE;
use crate::errors::{MvPeopleError, Result};
use crate::renderer::{DEFAULT_MAX_WIDTH, DEFAULT_SIXEL_COMMAND};
use crate::resolver::{normalize_lexically, PathResolver};
use crate::walker::ScanWalker;

/// Scan a folder for images containing people and decide, one key press at a time,
/// whether to keep or archive each of them.
#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Folder to scan (recursively)
    pub folder: PathBuf,

    /// Directory to move archived images to
    #[arg(long, default_value = "./archive")]
    pub archive_dir: PathBuf,

    /// Root directory for preserving folder structure in the archive
    #[arg(long, value_name = "DIRECTORY")]
    pub root: Option<PathBuf>,

    /// ONNX person detection model (YOLO)
    #[arg(short, long, default_value = "models/yolov8n.onnx")]
    pub model_path: PathBuf,

    /// Minimum person score for an image to be flagged
    #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE, value_parser = check_confidence)]
    pub confidence: f32,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    /// Images wider than this are scaled down before display
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
    pub max_width: u32,

    /// Sixel encoder reading a PPM image on stdin
    #[arg(long, default_value = DEFAULT_SIXEL_COMMAND)]
    pub sixel_command: String,
}

/// Everything a run needs once the command line has been checked.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub walker: ScanWalker,
    pub resolver: PathResolver,
}

impl Config {
    /// Pre-flight checks. Nothing on disk is changed.
    pub fn validate(&self) -> Result<ScanTarget> {
        let walker = ScanWalker::new(&self.folder)?;

        let structure_root = self
            .root
            .as_deref()
            .map(|root| canonical_dir(root, walker.root()))
            .transpose()?;

        let archive_dir = absolute(&self.archive_dir)?;
        let resolver = PathResolver::new(walker.root(), archive_dir, structure_root)?;

        if !self.model_path.is_file() {
            return Err(MvPeopleError::Configuration {
                message: format!("model file not found: {}", self.model_path.display()),
            });
        }

        Ok(ScanTarget { walker, resolver })
    }
}

fn canonical_dir(root: &Path, scan_root: &Path) -> Result<PathBuf> {
    let not_a_dir = |reason: String| MvPeopleError::Path {
        path: scan_root.to_path_buf(),
        root: root.to_path_buf(),
        reason,
    };

    let canonical =
        fs::canonicalize(root).map_err(|e| not_a_dir(format!("cannot resolve root: {e}")))?;
    if !canonical.is_dir() {
        return Err(not_a_dir("root is not a directory".to_string()));
    }
    Ok(canonical)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| MvPeopleError::Configuration {
                message: format!("cannot determine working directory: {e}"),
            })?
            .join(path)
    };
    Ok(normalize_lexically(&joined))
}

fn check_confidence(s: &str) -> std::result::Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{s} is not a number: {e}"))?;
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(format!("{s} must be in (0, 1]"))
    }
}
