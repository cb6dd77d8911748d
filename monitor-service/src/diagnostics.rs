use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Keeps bodies that could not be parsed so they can be inspected by hand.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsWriter {
    dir: Option<PathBuf>,
}

impl DiagnosticsWriter {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Writes `body` to `<dir>/<uid>_<timestamp>.txt`. Failures are logged
    /// and otherwise ignored.
    pub async fn persist(&self, uid: &str, body: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let safe_uid: String = uid
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        let file_name = format!("{}_{}.txt", safe_uid, Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(file_name);

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Could not create diagnostics directory {}: {}", dir.display(), e);
            return None;
        }
        match tokio::fs::write(&path, body).await {
            Ok(()) => {
                info!(uid = %uid, "Saved unparseable response to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not write diagnostics file {}: {}", path.display(), e);
                None
            }
        }
    }
}
