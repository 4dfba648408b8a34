use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::contexts::FrameworkDetector;

const SKIPPED_DIRS: &[&str] = &["build", ".gradle", ".git", ".idea", "node_modules", ".testsmith"];

/// Detects a framework entrypoint by scanning Kotlin sources for a marker
/// annotation such as `@SpringBootApplication`.
#[derive(Debug, Clone)]
pub struct MarkerScanDetector {
    marker: String,
}

impl MarkerScanDetector {
    pub fn new(marker: impl Into<String>) -> Self {
        Self { marker: marker.into() }
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// First `.kt` file under `root` containing `marker`.
pub fn find_marker(root: &Path, marker: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "kt"))
        .find(|e| {
            std::fs::read_to_string(e.path())
                .map(|content| content.contains(marker))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
}

#[async_trait]
impl FrameworkDetector for MarkerScanDetector {
    async fn has_framework_entrypoint(&self, project_root: &Path) -> bool {
        let root = project_root.to_path_buf();
        let marker = self.marker.clone();
        match tokio::task::spawn_blocking(move || find_marker(&root, &marker)).await {
            Ok(Some(path)) => {
                debug!(entrypoint = %path.display(), "Framework entrypoint found");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Framework scan aborted");
                false
            }
        }
    }
}
