//! Durable set of post identities that have already been seen.
//!
//! The set lives in memory and every new identity is appended to a
//! [`HistoryLog`]. Identities are never removed; reloading the log rebuilds
//! the same set, whatever the order or duplication of its lines.

mod log;

pub use log::{FileLog, MemoryLog};

use ngawatch_core::{HistoryError, PostIdentity};
use std::collections::HashSet;
use tracing::{debug, info};

/// Append-only backing storage for an [`IdentityStore`].
pub trait HistoryLog {
    /// Every line ever appended. An absent log reads as empty.
    fn read_all(&self) -> Result<Vec<String>, HistoryError>;

    fn append(&mut self, line: &str) -> Result<(), HistoryError>;

    /// Human-readable location, used in log messages.
    fn describe(&self) -> String;
}

pub struct IdentityStore<L: HistoryLog> {
    seen: HashSet<PostIdentity>,
    log: L,
}

impl<L: HistoryLog> IdentityStore<L> {
    pub fn load(log: L) -> Result<Self, HistoryError> {
        let seen: HashSet<PostIdentity> = log
            .read_all()?
            .iter()
            .filter_map(|line| PostIdentity::from_persisted(line))
            .collect();

        info!("Loaded {} identities from {}", seen.len(), log.describe());
        Ok(Self { seen, log })
    }

    pub fn contains(&self, identity: &PostIdentity) -> bool {
        self.seen.contains(identity)
    }

    /// Marks `identity` as seen and appends it to the log.
    ///
    /// Returns `Ok(false)` without touching the log when the identity was
    /// already known. On an append failure the identity stays in the
    /// in-memory set and the error is returned for the caller to report.
    pub fn record(&mut self, identity: PostIdentity) -> Result<bool, HistoryError> {
        if self.seen.contains(&identity) {
            return Ok(false);
        }

        let line = identity.as_str().to_string();
        self.seen.insert(identity);
        self.log.append(&line)?;
        debug!("Recorded {} in {}", line, self.log.describe());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn log(&self) -> &L {
        &self.log
    }
}
