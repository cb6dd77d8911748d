//! The old HTML search listing, one `div.row` per post with an `a.topic`
//! link to `read.php?tid=..&pid=..`.

use crate::extract::Extraction;
use ngawatch_core::{MonitoredSubject, PostRecord, ROOT_REPLY_ID};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

const ROW_SELECTOR: &str = "div.row";
const TOPIC_SELECTOR: &str = "a.topic";
const TITLE_SELECTOR: &str = "title";

/// Only used to resolve relative links; the host is never contacted.
const LINK_BASE: &str = "https://bbs.nga.cn/";

pub fn extract_html(raw: &str, subject: &MonitoredSubject) -> Extraction {
    let (Ok(row_selector), Ok(topic_selector), Ok(base)) = (
        Selector::parse(ROW_SELECTOR),
        Selector::parse(TOPIC_SELECTOR),
        Url::parse(LINK_BASE),
    ) else {
        return Extraction::Unparseable {
            reason: "listing selectors failed to build".to_string(),
        };
    };

    let document = Html::parse_document(raw);
    let mut rows = document.select(&row_selector).peekable();

    // Login and error pages carry no listing rows at all.
    if rows.peek().is_none() {
        let reason = match page_title(raw) {
            Some(title) => format!("HTML page '{}' has no listing rows", title),
            None => "HTML body has no listing rows".to_string(),
        };
        return Extraction::Unparseable { reason };
    }

    let mut records = Vec::new();
    for row in rows {
        let Some(link) = row.select(&topic_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some((thread_id, reply_id)) = ids_from_href(&base, href) else {
            debug!("Skipping topic link without a thread id: {}", href);
            continue;
        };

        // The listing is already filtered by author and shows no author id.
        records.push(PostRecord {
            thread_id,
            reply_id,
            author_id: subject.external_id.clone(),
            subject: collapse_whitespace(&link.text().collect::<String>()),
            body_text: String::new(),
            raw_author_match: true,
        });
    }

    debug!(
        uid = %subject.external_id,
        "Extracted {} post records from HTML listing",
        records.len()
    );
    Extraction::Posts(records)
}

/// `<title>` of an HTML document, if there is a non-empty one.
pub fn page_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with('<') {
        return None;
    }
    let selector = Selector::parse(TITLE_SELECTOR).ok()?;
    let document = Html::parse_document(trimmed);
    let title = document.select(&selector).next()?;
    let text = collapse_whitespace(&title.text().collect::<String>());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn ids_from_href(base: &Url, href: &str) -> Option<(String, String)> {
    let url = base.join(href.trim()).ok()?;
    let mut thread_id = None;
    let mut reply_id = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "tid" => thread_id = Some(value.trim().to_string()),
            "pid" => reply_id = Some(value.trim().to_string()),
            _ => {}
        }
    }

    let thread_id = thread_id.filter(|tid| !tid.is_empty())?;
    let reply_id = reply_id
        .filter(|pid| !pid.is_empty())
        .unwrap_or_else(|| ROOT_REPLY_ID.to_string());
    Some((thread_id, reply_id))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
