use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::data::StandardsRegistry;

pub const TEST_STANDARDS_FILE: &str = "TEST_STANDARDS.md";
pub const VALIDATION_LOOP_FILE: &str = "VALIDATION_LOOP.md";

/// Standards documents read lazily from a directory, once per instance.
#[derive(Debug)]
pub struct FileStandardsRegistry {
    standards_dir: PathBuf,
    test_standards: OnceLock<String>,
    validation_loop: OnceLock<String>,
}

impl FileStandardsRegistry {
    pub fn new(standards_dir: impl Into<PathBuf>) -> Self {
        Self {
            standards_dir: standards_dir.into(),
            test_standards: OnceLock::new(),
            validation_loop: OnceLock::new(),
        }
    }

    pub fn standards_dir(&self) -> &Path {
        &self.standards_dir
    }

    fn load(&self, file: &str) -> String {
        let path = self.standards_dir.join(file);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), bytes = content.len(), "Loaded standards document");
                content
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Standards document unavailable");
                String::new()
            }
        }
    }
}

impl StandardsRegistry for FileStandardsRegistry {
    fn test_standards(&self) -> &str {
        self.test_standards.get_or_init(|| self.load(TEST_STANDARDS_FILE))
    }

    fn validation_loop(&self) -> &str {
        self.validation_loop.get_or_init(|| self.load(VALIDATION_LOOP_FILE))
    }
}
