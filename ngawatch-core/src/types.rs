use serde::{Deserialize, Serialize};
use std::fmt;

/// Reply id carried by a thread's root post.
pub const ROOT_REPLY_ID: &str = "0";

/// A forum user being watched. Loaded once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredSubject {
    pub external_id: String,
    pub display_name: String,
}

impl MonitoredSubject {
    pub fn new(external_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A post normalized out of a raw listing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub thread_id: String,
    /// Empty or `"0"` when the post is the thread's root.
    pub reply_id: String,
    pub author_id: String,
    pub subject: String,
    pub body_text: String,
    /// False when the record's author is not the polled subject.
    pub raw_author_match: bool,
}

impl PostRecord {
    pub fn identity(&self) -> PostIdentity {
        PostIdentity::new(&self.thread_id, &self.reply_id)
    }

    pub fn is_root(&self) -> bool {
        is_root_reply_id(&self.reply_id)
    }

    pub fn classification(&self) -> Classification {
        if self.is_root() {
            Classification::NewThread
        } else {
            Classification::Reply
        }
    }
}

pub fn is_root_reply_id(reply_id: &str) -> bool {
    let trimmed = reply_id.trim();
    trimmed.is_empty() || trimmed.chars().all(|c| c == '0')
}

/// Canonical dedup key, `tid_<thread>_pid_<reply>`.
///
/// Both ids are trimmed and every root sentinel (empty, `"0"`, `"00"`) is
/// written as `0`, so the same pair always yields the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostIdentity(String);

impl PostIdentity {
    pub fn new(thread_id: &str, reply_id: &str) -> Self {
        let reply = if is_root_reply_id(reply_id) {
            ROOT_REPLY_ID
        } else {
            reply_id.trim()
        };
        Self(format!("tid_{}_pid_{}", thread_id.trim(), reply))
    }

    /// Wraps a line read back from the history log as-is.
    pub fn from_persisted(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    NewThread,
    Reply,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::NewThread => "new thread",
            Classification::Reply => "reply",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub identity: PostIdentity,
    pub subject_id: String,
    pub subject_display_name: String,
    pub classification: Classification,
    pub title: String,
    pub excerpt: String,
    pub target_url: String,
}

impl NotificationEvent {
    pub fn push_title(&self) -> String {
        format!("NGA update: {}", self.subject_display_name)
    }

    /// Markdown body understood by the push service.
    pub fn push_body(&self) -> String {
        format!(
            "**{}** (UID: {}) posted a {}:\n\n**Title:** {}\n\n> {}\n\n[Open on NGA]({})",
            self.subject_display_name,
            self.subject_id,
            self.classification.label(),
            self.title,
            self.excerpt,
            self.target_url
        )
    }
}
