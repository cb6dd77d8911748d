use crate::dedup::Deduplicator;
use crate::diagnostics::DiagnosticsWriter;
use crate::notifier::NotificationSink;
use crate::source::PostSource;
use history_store::{HistoryLog, IdentityStore};
use nga_client::{extract, Extraction};
use ngawatch_core::{
    AppConfig, CoreError, ErrorExt, ErrorReporter, MonitoredSubject, NgaApiError,
    NotificationEvent,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Longest extra pause honoured when NGA answers with a retry-after.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Pause after a full round.
    pub round_interval: Duration,
    /// Pause between two subjects of the same round.
    pub subject_delay: Duration,
    /// Random extra pause, up to this much, added to `subject_delay`.
    pub subject_delay_jitter: Duration,
}

impl MonitorOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            round_interval: config.check_interval(),
            subject_delay: Duration::from_secs(config.monitor_settings.subject_delay),
            subject_delay_jitter: Duration::from_secs(config.monitor_settings.subject_delay_jitter),
        }
    }
}

/// Counters for one pass over every subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub subjects_polled: usize,
    pub subjects_failed: usize,
    pub new_posts: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    /// Events only logged, either because of first-round suppression or
    /// because the sink is disabled.
    pub not_pushed: usize,
    pub suppressed_round: bool,
}

/// Polls every subject in order, forever.
///
/// When the identity store starts out empty the first round runs suppressed:
/// new posts are recorded but only logged, so a cold start does not flood
/// the push quota with history.
pub struct MonitorService<S, N, L>
where
    S: PostSource,
    N: NotificationSink,
    L: HistoryLog,
{
    subjects: Vec<MonitoredSubject>,
    source: S,
    sink: N,
    store: IdentityStore<L>,
    dedup: Deduplicator,
    diagnostics: DiagnosticsWriter,
    options: MonitorOptions,
    reporter: ErrorReporter,
    suppressed: bool,
    rounds_completed: u64,
}

impl<S, N, L> MonitorService<S, N, L>
where
    S: PostSource,
    N: NotificationSink,
    L: HistoryLog,
{
    pub fn new(
        subjects: Vec<MonitoredSubject>,
        source: S,
        sink: N,
        store: IdentityStore<L>,
        dedup: Deduplicator,
        diagnostics: DiagnosticsWriter,
        options: MonitorOptions,
    ) -> Self {
        let suppressed = store.is_empty();
        if suppressed {
            info!("History is empty; the first round will record posts without pushing them");
        }

        Self {
            subjects,
            source,
            sink,
            store,
            dedup,
            diagnostics,
            options,
            reporter: ErrorReporter::new(),
            suppressed,
            rounds_completed: 0,
        }
    }

    pub async fn run(&mut self) {
        info!(
            "Monitoring {} users every {:?}",
            self.subjects.len(),
            self.options.round_interval
        );
        loop {
            let summary = self.run_round().await;
            info!(
                round = self.rounds_completed,
                polled = summary.subjects_polled,
                failed = summary.subjects_failed,
                new_posts = summary.new_posts,
                delivered = summary.delivered,
                "Round complete, waiting {:?}",
                self.options.round_interval
            );
            sleep(self.options.round_interval).await;
        }
    }

    pub async fn run_round(&mut self) -> RoundSummary {
        let mut summary = RoundSummary {
            suppressed_round: self.suppressed,
            ..RoundSummary::default()
        };

        let count = self.subjects.len();
        for index in 0..count {
            let subject = self.subjects[index].clone();
            info!(uid = %subject.external_id, user = %subject.display_name, "Checking user");

            let mut extra_wait = None;
            match self.poll_subject(&subject).await {
                Ok(events) => {
                    summary.new_posts += events.len();
                    self.dispatch(&events, &mut summary).await;
                }
                Err(e) => {
                    summary.subjects_failed += 1;
                    warn!(uid = %subject.external_id, "Skipping user this round");
                    self.reporter.report_warning(&e);
                    extra_wait = e.retry_after().map(|wait| wait.min(MAX_RATE_LIMIT_WAIT));
                }
            }
            summary.subjects_polled += 1;

            if index + 1 < count {
                let delay = self.subject_delay().max(extra_wait.unwrap_or_default());
                debug!("Waiting {:?} before the next user", delay);
                sleep(delay).await;
            }
        }

        if self.suppressed {
            info!(
                "First round recorded {} posts without pushing; notifications enabled from now on",
                summary.new_posts
            );
            self.suppressed = false;
        }
        self.rounds_completed += 1;
        summary
    }

    /// Fetch, extract and deduplicate one subject's listing.
    async fn poll_subject(
        &mut self,
        subject: &MonitoredSubject,
    ) -> Result<Vec<NotificationEvent>, CoreError> {
        let body = self.source.fetch(subject).await?;

        let records = match extract(&body, subject, self.source.format()) {
            Extraction::Posts(records) => records,
            Extraction::Unparseable { reason } => {
                self.diagnostics.persist(&subject.external_id, &body).await;
                return Err(NgaApiError::UnparseablePayload {
                    uid: subject.external_id.clone(),
                    reason,
                }
                .into());
            }
        };

        let events = self.dedup.process(&records, &mut self.store, subject);
        debug!(
            uid = %subject.external_id,
            records = records.len(),
            new = events.len(),
            "Listing processed"
        );
        Ok(events)
    }

    async fn dispatch(&self, events: &[NotificationEvent], summary: &mut RoundSummary) {
        for event in events {
            let title = event.push_title();
            if self.suppressed || !self.sink.is_enabled() {
                info!(
                    identity = %event.identity,
                    kind = event.classification.label(),
                    "Not pushed: {} | {} | {}",
                    title,
                    event.title,
                    event.target_url
                );
                summary.not_pushed += 1;
                continue;
            }

            match self.sink.send(&title, &event.push_body()).await {
                Ok(()) => {
                    info!(identity = %event.identity, "Pushed notification: {}", title);
                    summary.delivered += 1;
                }
                Err(e) => {
                    // The identity stays recorded; the post is not pushed again.
                    error!(identity = %event.identity, "Push failed: {}", e);
                    summary.delivery_failures += 1;
                }
            }
        }
    }

    fn subject_delay(&self) -> Duration {
        let jitter_ms = self.options.subject_delay_jitter.as_millis() as u64;
        self.options.subject_delay + Duration::from_millis(fastrand::u64(0..=jitter_ms))
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    pub fn store(&self) -> &IdentityStore<L> {
        &self.store
    }
}
