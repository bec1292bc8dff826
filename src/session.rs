//! The interactive keep / archive / quit loop.
//!
//! The loop is an explicit state machine. `Scanning` pulls the next file and runs the
//! detector; a flagged file moves through `Presenting` and `AwaitingInput` into one of
//! `Keeping`, `Archiving` or `Quitting`. `Terminated` is only reached by quitting or by
//! running out of files.
//!
//! An interrupt flag raised from outside (Ctrl+C outside raw mode) is honoured between
//! states: the session quits before the next file is scanned and before any move starts.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::style::Stylize;
use indicatif::ProgressBar;
use tracing::{debug, warn};

use crate::errors::{MvPeopleError, Result};
use crate::mover::ArchiveMover;
use crate::resolver::PathResolver;
use crate::traits::{ImageRenderer, KeyInput, KeySource, PersonDetector};

pub const PROMPT: &str = "Action ([k]eep, [a]rchive, [q]uit): ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionOutcome {
    Unknown,
    PersonPresent,
    PersonAbsent,
    Failed(String),
}

/// One image found by the walker, together with what the detector said about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub outcome: DetectionOutcome,
}

impl Candidate {
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            outcome: DetectionOutcome::Unknown,
        }
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Archive,
    Quit,
}

impl Decision {
    /// Maps a keystroke to a decision; unrecognised keys give `None`.
    pub fn from_key(key: KeyInput) -> Option<Self> {
        match key {
            KeyInput::Interrupt => Some(Self::Quit),
            KeyInput::Char(c) => match c.to_ascii_lowercase() {
                'k' => Some(Self::Keep),
                'a' => Some(Self::Archive),
                'q' => Some(Self::Quit),
                _ => None,
            },
        }
    }
}

#[derive(Debug)]
enum State {
    Scanning,
    Presenting(Candidate),
    AwaitingInput(Candidate),
    Keeping(Candidate),
    Archiving(Candidate),
    Quitting,
    Terminated,
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub scanned: usize,
    pub flagged: usize,
    pub kept: usize,
    pub archived: usize,
    pub move_failures: usize,
    pub detection_failures: usize,
    pub quit: bool,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned {}, flagged {}, kept {}, archived {}, move failures {}, detection failures {}",
            self.scanned,
            self.flagged,
            self.kept,
            self.archived,
            self.move_failures,
            self.detection_failures
        )
    }
}

pub struct DecisionSession<D, R, K, W> {
    detector: D,
    renderer: R,
    keys: K,
    out: W,
    resolver: PathResolver,
    mover: ArchiveMover,
    progress: ProgressBar,
    interrupted: Arc<AtomicBool>,
    summary: SessionSummary,
}

impl<D, R, K, W> DecisionSession<D, R, K, W>
where
    D: PersonDetector,
    R: ImageRenderer,
    K: KeySource,
    W: Write,
{
    pub fn new(detector: D, renderer: R, keys: K, resolver: PathResolver, out: W) -> Self {
        Self {
            detector,
            renderer,
            keys,
            out,
            resolver,
            mover: ArchiveMover::new(),
            progress: ProgressBar::hidden(),
            interrupted: Arc::new(AtomicBool::new(false)),
            summary: SessionSummary::default(),
        }
    }

    /// Reports scan progress on `progress`; it is cleared while the operator decides.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Quits as soon as `interrupted` is set, without starting another detection or move.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Processes `paths` in order until they run out or the operator quits.
    ///
    /// Per-file problems (detection, rendering, moving) are reported and skipped. Only a
    /// failure to write to the output ends the run with an error.
    pub fn run<I>(mut self, paths: I) -> Result<SessionSummary>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut paths = paths.into_iter();
        let mut state = State::Scanning;

        loop {
            state = match state {
                State::Terminated => break,
                State::Scanning => self.scan_next(&mut paths),
                interactive => {
                    let progress = self.progress.clone();
                    progress.suspend(|| self.interact(interactive))?
                }
            };
        }

        self.progress.finish_and_clear();
        Ok(self.summary)
    }

    fn scan_next(&mut self, paths: &mut impl Iterator<Item = PathBuf>) -> State {
        if self.is_interrupted() {
            debug!("interrupted, stopping the scan");
            return State::Quitting;
        }

        let Some(path) = paths.next() else {
            return State::Terminated;
        };

        let mut candidate = Candidate::new(path);
        self.summary.scanned += 1;
        self.progress
            .set_message(format!("Analyzing {}", candidate.display_name()));

        candidate.outcome = match self.detector.contains_person(&candidate.path) {
            Ok(true) => DetectionOutcome::PersonPresent,
            Ok(false) => DetectionOutcome::PersonAbsent,
            Err(e) => DetectionOutcome::Failed(e.to_string()),
        };
        self.progress.inc(1);

        if candidate.outcome == DetectionOutcome::PersonPresent {
            self.summary.flagged += 1;
            return State::Presenting(candidate);
        }

        if let DetectionOutcome::Failed(reason) = &candidate.outcome {
            self.summary.detection_failures += 1;
            warn!(path = %candidate.path.display(), %reason, "detection failed, skipping");
        } else {
            debug!(path = %candidate.path.display(), "no person");
        }
        State::Scanning
    }

    /// Drives the operator-facing states until the machine is back to scanning or done.
    fn interact(&mut self, mut state: State) -> Result<State> {
        loop {
            state = match state {
                done @ (State::Scanning | State::Terminated) => return Ok(done),
                State::Quitting => {
                    self.summary.quit = true;
                    self.say("Exiting...".red().bold())?;
                    State::Terminated
                }
                _ if self.is_interrupted() => State::Quitting,
                State::Presenting(candidate) => {
                    self.present(&candidate)?;
                    State::AwaitingInput(candidate)
                }
                State::AwaitingInput(candidate) => self.await_input(candidate)?,
                State::Keeping(_) => {
                    self.summary.kept += 1;
                    self.say("Kept.".green())?;
                    State::Scanning
                }
                State::Archiving(candidate) => {
                    self.archive(&candidate.path)?;
                    State::Scanning
                }
            };
        }
    }

    fn present(&mut self, candidate: &Candidate) -> Result<()> {
        self.say("")?;
        self.say(format!("Found person in: {}", candidate.display_name()).cyan().bold())?;

        if let Err(e) = self.renderer.render(&candidate.path) {
            warn!(path = %candidate.path.display(), error = %e, "render failed");
            self.say(format!("[Image: {}]", candidate.path.display()))?;
        }

        self.say("\n")?;
        self.prompt()
    }

    fn await_input(&mut self, candidate: Candidate) -> Result<State> {
        let key = match self.keys.read_key() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "cannot read keystroke, stopping");
                self.say("")?;
                self.say(format!("Input unavailable: {e}").red())?;
                return Ok(State::Quitting);
            }
        };

        let next = match Decision::from_key(key) {
            Some(Decision::Keep) => {
                self.say("Keep")?;
                State::Keeping(candidate)
            }
            Some(Decision::Archive) => {
                self.say("Archive")?;
                State::Archiving(candidate)
            }
            Some(Decision::Quit) => {
                self.say("Quit")?;
                State::Quitting
            }
            None => {
                debug!(?key, "ignoring key");
                self.say("")?;
                self.prompt()?;
                State::AwaitingInput(candidate)
            }
        };
        Ok(next)
    }

    fn archive(&mut self, source: &Path) -> Result<()> {
        let moved = self
            .resolver
            .resolve(source)
            .and_then(|destination| self.mover.move_file(source, &destination));

        match moved {
            Ok(destination) => {
                self.summary.archived += 1;
                self.say(format!("Archived to {}", destination.display()).red())
            }
            Err(e) => {
                self.summary.move_failures += 1;
                warn!(path = %source.display(), error = %e, "archive failed");
                self.say(format!("Failed to archive: {e}").red().bold())
            }
        }
    }

    fn say(&mut self, line: impl fmt::Display) -> Result<()> {
        writeln!(self.out, "{line}").map_err(|e| MvPeopleError::Terminal {
            operation: "write output".to_string(),
            source: e,
        })
    }

    fn prompt(&mut self) -> Result<()> {
        write!(self.out, "{}", PROMPT.yellow().bold())
            .and_then(|()| self.out.flush())
            .map_err(|e| MvPeopleError::Terminal {
                operation: "write prompt".to_string(),
                source: e,
            })
    }
}
