use std::path::PathBuf;
use thiserror::Error;

/// Boxed error from a collaborator (image decoder, runtime, subprocess).
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the people archiver.
///
/// `Scan`, `Path` and `Configuration` are pre-flight errors: they are raised before any
/// file is looked at and abort the run. Every other variant is scoped to a single file
/// and is reported by the session, which then moves on to the next candidate.
#[derive(Error, Debug)]
pub enum MvPeopleError {
    #[error("Scan error: {reason} ({path:?})")]
    Scan { path: PathBuf, reason: String },

    #[error("Path error: {reason} (path {path:?}, root {root:?})")]
    Path {
        path: PathBuf,
        root: PathBuf,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Detection failed: {operation} failed for {path:?}")]
    Detection {
        path: PathBuf,
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Render error: {operation} failed for {path:?}")]
    Render {
        path: PathBuf,
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Move error: {operation} failed moving {from:?} to {to:?}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Terminal error: {operation} failed")]
    Terminal {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl MvPeopleError {
    /// Whether the error aborts the whole run rather than a single file.
    pub const fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::Scan { .. } | Self::Path { .. } | Self::Configuration { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MvPeopleError>;

/// Convert ONNX Runtime errors to model errors.
impl From<ort::Error> for MvPeopleError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ndarray shape errors to model errors.
///
/// Shape errors only happen while reshaping inference output, so they belong with the
/// model rather than with the image that was fed in.
impl From<ndarray::ShapeError> for MvPeopleError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_classification() {
        let scan = MvPeopleError::Scan {
            path: "missing".into(),
            reason: "does not exist".to_string(),
        };
        let path = MvPeopleError::Path {
            path: "/a".into(),
            root: "/b".into(),
            reason: "not under root".to_string(),
        };
        let moved = MvPeopleError::Move {
            from: "/a.jpg".into(),
            to: "/b.jpg".into(),
            operation: "rename".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };

        assert!(scan.is_preflight());
        assert!(path.is_preflight());
        assert!(!moved.is_preflight());
    }

    #[test]
    fn test_display_mentions_paths() {
        let err = MvPeopleError::Path {
            path: "/photos/x.jpg".into(),
            root: "/other".into(),
            reason: "not under root".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("/photos/x.jpg"));
        assert!(message.contains("/other"));
    }
}
