use crate::errors::Result;
use std::path::Path;

/// Binary person classifier over an image file.
///
/// The session only needs "person or not"; confidence scores and boxes stay inside the
/// implementation. An `Err` means the file could not be classified and is skipped.
pub trait PersonDetector {
    fn contains_person(&self, path: &Path) -> Result<bool>;
}

/// Draws an image file into the current terminal.
pub trait ImageRenderer {
    fn render(&self, path: &Path) -> Result<()>;
}

/// A single keystroke read from the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    /// Ctrl+C while waiting for a key.
    Interrupt,
}

/// Blocking source of single keystrokes.
pub trait KeySource {
    /// Waits without timeout for the next key press.
    fn read_key(&mut self) -> Result<KeyInput>;
}

impl<T: PersonDetector + ?Sized> PersonDetector for &T {
    fn contains_person(&self, path: &Path) -> Result<bool> {
        (**self).contains_person(path)
    }
}

impl<T: ImageRenderer + ?Sized> ImageRenderer for &T {
    fn render(&self, path: &Path) -> Result<()> {
        (**self).render(path)
    }
}

impl<T: KeySource + ?Sized> KeySource for &mut T {
    fn read_key(&mut self) -> Result<KeyInput> {
        (**self).read_key()
    }
}
