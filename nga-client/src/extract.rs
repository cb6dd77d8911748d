use crate::html;
use crate::tree::{collect_mappings, MAX_WALK_DEPTH};
use ngawatch_core::{MonitoredSubject, PostRecord, ROOT_REPLY_ID};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const THREAD_ID_KEY: &str = "tid";
const REPLY_ID_KEY: &str = "pid";
const AUTHOR_ID_KEY: &str = "authorid";
const SUBJECT_KEY: &str = "subject";
const CONTENT_KEY: &str = "content";

/// Some deployments serve the JSON as a script assignment.
const SCRIPT_ASSIGNMENT_PREFIX: &str = "window.script_muti_get_var_store=";

/// Which listing representation a body is expected to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    LegacyHtml,
}

/// Result of reading one listing body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Posts(Vec<PostRecord>),
    /// The body was not structured data at all. Distinct from an empty
    /// listing so callers can log it and keep the body for inspection.
    Unparseable { reason: String },
}

impl Extraction {
    pub fn records(&self) -> &[PostRecord] {
        match self {
            Extraction::Posts(records) => records,
            Extraction::Unparseable { .. } => &[],
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Extraction::Unparseable { .. })
    }
}

/// Reads a listing body for `subject` in the given format. Never panics on
/// malformed input.
pub fn extract(raw: &str, subject: &MonitoredSubject, format: PayloadFormat) -> Extraction {
    match format {
        PayloadFormat::Json => extract_json(raw, subject),
        PayloadFormat::LegacyHtml => html::extract_html(raw, subject),
    }
}

pub fn extract_json(raw: &str, subject: &MonitoredSubject) -> Extraction {
    let body = strip_envelope(raw);
    if body.is_empty() {
        return Extraction::Unparseable {
            reason: "empty body".to_string(),
        };
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            let reason = match html::page_title(body) {
                Some(title) => format!("HTML page '{}' instead of JSON", title),
                None if body.starts_with('<') => "HTML page instead of JSON".to_string(),
                None => format!("invalid JSON: {}", e),
            };
            return Extraction::Unparseable { reason };
        }
    };

    let records = extract_value(&value, subject);
    if records.is_empty() {
        if let Some(error) = value.get("error") {
            warn!(uid = %subject.external_id, "Listing carried an error: {}", error);
        }
    }
    Extraction::Posts(records)
}

/// Walks an already parsed payload and converts every post-shaped node.
pub fn extract_value(value: &Value, subject: &MonitoredSubject) -> Vec<PostRecord> {
    let outcome = collect_mappings(value, MAX_WALK_DEPTH, is_post_node);
    if outcome.truncated {
        warn!(
            uid = %subject.external_id,
            "Payload nested deeper than {} levels; the excess was skipped",
            MAX_WALK_DEPTH
        );
    }

    let records: Vec<PostRecord> = outcome
        .matches
        .into_iter()
        .map(|node| record_from_node(node, subject))
        .collect();
    debug!(uid = %subject.external_id, "Extracted {} post records", records.len());
    records
}

/// A node is a post when it carries a usable thread id, a reply id and a body
/// field. Nodes with the ids but no body are thread summaries or other
/// metadata; the walk keeps searching inside them.
pub fn is_post_node(node: &Map<String, Value>) -> bool {
    let has_thread = node
        .get(THREAD_ID_KEY)
        .and_then(scalar_text)
        .map(|tid| !tid.is_empty() && tid != ROOT_REPLY_ID)
        .unwrap_or(false);
    let has_reply = node.contains_key(REPLY_ID_KEY);
    let has_body = node
        .get(CONTENT_KEY)
        .map(|content| !content.is_null())
        .unwrap_or(false);
    has_thread && has_reply && has_body
}

fn record_from_node(node: &Map<String, Value>, subject: &MonitoredSubject) -> PostRecord {
    let text = |key: &str| node.get(key).and_then(scalar_text).unwrap_or_default();

    let reply_id = text(REPLY_ID_KEY);
    let author_id = text(AUTHOR_ID_KEY);
    let raw_author_match = !author_id.is_empty() && author_id == subject.external_id.trim();

    PostRecord {
        thread_id: text(THREAD_ID_KEY),
        reply_id: if reply_id.is_empty() {
            ROOT_REPLY_ID.to_string()
        } else {
            reply_id
        },
        author_id,
        subject: text(SUBJECT_KEY),
        body_text: text(CONTENT_KEY),
        raw_author_match,
    }
}

/// Text of a scalar field; ids arrive as both strings and numbers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn strip_envelope(raw: &str) -> &str {
    let body = raw.trim_start_matches('\u{feff}').trim();
    let body = body.strip_prefix(SCRIPT_ASSIGNMENT_PREFIX).unwrap_or(body);
    body.trim().trim_end_matches(';').trim_end()
}
