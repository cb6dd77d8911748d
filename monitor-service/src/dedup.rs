use history_store::{HistoryLog, IdentityStore};
use ngawatch_core::{
    CoreError, ErrorExt, MonitoredSubject, NotificationEvent, PostRecord, WriteFailurePolicy,
    DEFAULT_BASE_URL,
};
use tracing::{debug, warn};

pub const EXCERPT_CHARS: usize = 100;
pub const UNTITLED_PLACEHOLDER: &str = "(untitled)";
pub const NON_TEXT_PLACEHOLDER: &str = "[image, attachment or other non-text content]";

/// Turns extracted records into notification events, recording each new
/// identity in the store as it goes.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    base_url: String,
    write_failure: WriteFailurePolicy,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, WriteFailurePolicy::default())
    }
}

impl Deduplicator {
    pub fn new(base_url: &str, write_failure: WriteFailurePolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            write_failure,
        }
    }

    /// Events for the records in `records` that are authored by `subject`
    /// and not yet in `store`, in encounter order.
    pub fn process<L: HistoryLog>(
        &self,
        records: &[PostRecord],
        store: &mut IdentityStore<L>,
        subject: &MonitoredSubject,
    ) -> Vec<NotificationEvent> {
        let mut events = Vec::new();

        for record in records {
            if !record.raw_author_match {
                debug!(
                    uid = %subject.external_id,
                    author = %record.author_id,
                    "Skipping post by another author"
                );
                continue;
            }

            let identity = record.identity();
            if store.contains(&identity) {
                continue;
            }

            if let Err(e) = store.record(identity.clone()) {
                CoreError::from(e).log_error();
                if self.write_failure == WriteFailurePolicy::SkipNotification {
                    warn!(%identity, "History write failed; withholding notification");
                    continue;
                }
            }

            events.push(NotificationEvent {
                identity,
                subject_id: subject.external_id.clone(),
                subject_display_name: subject.display_name.clone(),
                classification: record.classification(),
                title: render_title(&record.subject),
                excerpt: render_excerpt(&record.body_text),
                target_url: self.target_url(record),
            });
        }

        events
    }

    pub fn target_url(&self, record: &PostRecord) -> String {
        if record.is_root() {
            format!("{}/read.php?tid={}", self.base_url, record.thread_id.trim())
        } else {
            format!("{}/read.php?pid={}", self.base_url, record.reply_id.trim())
        }
    }
}

pub fn render_title(subject: &str) -> String {
    let title = collapse_whitespace(subject);
    if title.is_empty() {
        UNTITLED_PLACEHOLDER.to_string()
    } else {
        title
    }
}

/// First [`EXCERPT_CHARS`] characters of the body with line breaks flattened.
pub fn render_excerpt(body: &str) -> String {
    let flattened = body
        .replace("<br/>", " ")
        .replace("<br />", " ")
        .replace("<br>", " ");
    let text = collapse_whitespace(&flattened);
    if text.is_empty() {
        return NON_TEXT_PLACEHOLDER.to_string();
    }

    let mut chars = text.chars();
    let excerpt: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", excerpt)
    } else {
        excerpt
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
