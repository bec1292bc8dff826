use crate::errors::{MvPeopleError, Result};
use crate::traits::{ImageRenderer, KeyInput, KeySource, PersonDetector};
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Detector double: every file is flagged unless its file name is listed otherwise.
#[derive(Debug, Clone, Default)]
pub struct MockPersonDetector {
    absent: HashSet<String>,
    failing: HashSet<String>,
}

impl MockPersonDetector {
    pub fn flag_all() -> Self {
        Self::default()
    }

    pub fn with_absent(mut self, name: &str) -> Self {
        self.absent.insert(name.to_string());
        self
    }

    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }
}

impl PersonDetector for MockPersonDetector {
    fn contains_person(&self, path: &Path) -> Result<bool> {
        let name = file_name(path);
        if self.failing.contains(&name) {
            return Err(MvPeopleError::Detection {
                path: path.to_path_buf(),
                operation: "mock detection".to_string(),
                source: "scripted failure".into(),
            });
        }
        Ok(!self.absent.contains(&name))
    }
}

/// Renderer double that records what it was asked to draw.
#[derive(Debug, Default)]
pub struct MockRenderer {
    fail: bool,
    rendered: RefCell<Vec<PathBuf>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn rendered(&self) -> Vec<PathBuf> {
        self.rendered.borrow().clone()
    }
}

impl ImageRenderer for MockRenderer {
    fn render(&self, path: &Path) -> Result<()> {
        self.rendered.borrow_mut().push(path.to_path_buf());
        if self.fail {
            return Err(MvPeopleError::Render {
                path: path.to_path_buf(),
                operation: "mock render".to_string(),
                source: "no graphics".into(),
            });
        }
        Ok(())
    }
}

/// Key source that replays a fixed script, then reports end of input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    keys: VecDeque<KeyInput>,
}

impl ScriptedKeys {
    pub fn new(keys: Vec<KeyInput>) -> Self {
        Self { keys: keys.into() }
    }

    pub fn from_chars(keys: &str) -> Self {
        Self::new(keys.chars().map(KeyInput::Char).collect())
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl KeySource for ScriptedKeys {
    fn read_key(&mut self) -> Result<KeyInput> {
        self.keys.pop_front().ok_or_else(|| MvPeopleError::Terminal {
            operation: "read key".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "key script exhausted"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_detector_rules() -> Result<()> {
        let detector = MockPersonDetector::flag_all()
            .with_absent("empty.jpg")
            .with_failure("broken.jpg");

        assert!(detector.contains_person(Path::new("/x/people.jpg"))?);
        assert!(!detector.contains_person(Path::new("/x/empty.jpg"))?);
        assert!(detector.contains_person(Path::new("/x/broken.jpg")).is_err());
        Ok(())
    }

    #[test]
    fn test_scripted_keys_run_out() {
        let mut keys = ScriptedKeys::from_chars("ak");
        assert_eq!(keys.read_key().ok(), Some(KeyInput::Char('a')));
        assert_eq!(keys.remaining(), 1);
        assert_eq!(keys.read_key().ok(), Some(KeyInput::Char('k')));
        assert!(keys.read_key().is_err());
    }
}
