use crate::HistoryLog;
use ngawatch_core::HistoryError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Plain text file, one identity per line, no header.
#[derive(Debug, Clone)]
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryLog for FileLog {
    fn read_all(&self) -> Result<Vec<String>, HistoryError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HistoryError::ReadFailed {
                    path: self.describe(),
                    source,
                })
            }
        };

        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn append(&mut self, line: &str) -> Result<(), HistoryError> {
        let append_failed = |source| HistoryError::AppendFailed {
            identity: line.to_string(),
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(append_failed)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(append_failed)?;

        // A hand edit or a torn write can leave the last line unterminated.
        let len = file.metadata().map_err(append_failed)?.len();
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).map_err(append_failed)?;
            file.read_exact(&mut last).map_err(append_failed)?;
            if last[0] != b'\n' {
                file.write_all(b"\n").map_err(append_failed)?;
            }
        }

        writeln!(file, "{}", line).map_err(append_failed)?;
        file.flush().map_err(append_failed)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory log for tests. Clones share the same lines, so a test can keep
/// a handle and inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Arc<Mutex<Vec<String>>>,
    fail_appends: Arc<AtomicBool>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let log = Self::new();
        if let Ok(mut guard) = log.lines.lock() {
            guard.extend(lines.into_iter().map(Into::into));
        }
        log
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Makes every following append fail, simulating a full or read-only disk.
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

impl HistoryLog for MemoryLog {
    fn read_all(&self) -> Result<Vec<String>, HistoryError> {
        Ok(self.lines())
    }

    fn append(&mut self, line: &str) -> Result<(), HistoryError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(HistoryError::AppendFailed {
                identity: line.to_string(),
                path: self.describe(),
                source: std::io::Error::new(ErrorKind::Other, "simulated write failure"),
            });
        }
        let mut guard = self.lines.lock().map_err(|_| HistoryError::Unavailable {
            reason: "memory log lock poisoned".to_string(),
        })?;
        guard.push(line.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}
