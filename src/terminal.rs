use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::debug;

use crate::errors::{MvPeopleError, Result};
use crate::traits::{KeyInput, KeySource};

fn terminal_error(operation: &str) -> impl FnOnce(std::io::Error) -> MvPeopleError + '_ {
    move |source| MvPeopleError::Terminal {
        operation: operation.to_string(),
        source,
    }
}

/// Restores cooked mode when dropped, also on the error path.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().map_err(terminal_error("enable raw mode"))?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            debug!(error = %e, "failed to leave raw mode");
        }
    }
}

/// Reads single key presses from the controlling terminal.
///
/// Raw mode is held only while waiting for a key, so everything printed in between
/// uses normal line handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalKeys;

impl TerminalKeys {
    pub const fn new() -> Self {
        Self
    }
}

/// Translates a crossterm key event; `None` for releases and non-character keys.
pub fn key_input(event: &KeyEvent) -> Option<KeyInput> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    match event.code {
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyInput::Interrupt)
        }
        KeyCode::Char(c) => Some(KeyInput::Char(c)),
        _ => None,
    }
}

impl KeySource for TerminalKeys {
    fn read_key(&mut self) -> Result<KeyInput> {
        let _raw = RawModeGuard::enable()?;
        loop {
            if let Event::Key(key) = event::read().map_err(terminal_error("read key"))? {
                if let Some(input) = key_input(&key) {
                    return Ok(input);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_char_press() {
        let event = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(key_input(&event), Some(KeyInput::Char('a')));
    }

    #[test]
    fn test_ctrl_c_is_interrupt() {
        let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_input(&event), Some(KeyInput::Interrupt));
    }

    #[test]
    fn test_release_and_special_keys_are_ignored() {
        let release = KeyEvent::new_with_kind(
            KeyCode::Char('q'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
        );
        assert_eq!(key_input(&release), None);

        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(key_input(&enter), None);
    }
}
