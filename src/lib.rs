pub mod config;
pub mod detector;
pub mod errors;
pub mod mover;
pub mod renderer;
pub mod resolver;
pub mod session;
pub mod terminal;
pub mod traits;
pub mod walker;

pub mod mocks;

pub use config::{Config, ScanTarget};
pub use detector::YoloPersonDetector;
pub use errors::{MvPeopleError, Result};
pub use mover::{ArchiveMover, ArchivePlan};
pub use renderer::SixelRenderer;
pub use resolver::PathResolver;
pub use session::{Candidate, Decision, DecisionSession, DetectionOutcome, SessionSummary};
pub use terminal::TerminalKeys;
pub use traits::*;
pub use walker::{is_supported_image_format, ScanWalker};
