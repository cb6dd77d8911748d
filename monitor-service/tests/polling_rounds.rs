use async_trait::async_trait;
use history_store::{FileLog, HistoryLog, IdentityStore, MemoryLog};
use monitor_service::{
    Deduplicator, DiagnosticsWriter, MonitorOptions, MonitorService, NotificationSink, PostSource,
};
use nga_client::PayloadFormat;
use ngawatch_core::{
    CoreError, MonitoredSubject, NgaApiError, NotifyError, PostIdentity,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone)]
enum Reply {
    Body(String),
    Status(u16),
    RateLimited(u64),
}

#[derive(Clone, Default)]
struct FakeSource {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
}

impl FakeSource {
    fn set_body(&self, uid: &str, body: &str) {
        self.set(uid, Reply::Body(body.to_string()));
    }

    fn set_status(&self, uid: &str, status: u16) {
        self.set(uid, Reply::Status(status));
    }

    fn set_rate_limited(&self, uid: &str, retry_after: u64) {
        self.set(uid, Reply::RateLimited(retry_after));
    }

    fn set(&self, uid: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(uid.to_string(), reply);
    }
}

#[async_trait]
impl PostSource for FakeSource {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Json
    }

    async fn fetch(&self, subject: &MonitoredSubject) -> Result<String, CoreError> {
        let entry = self.replies.lock().unwrap().get(&subject.external_id).cloned();
        match entry {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status_code)) => Err(NgaApiError::ServerError { status_code }.into()),
            Some(Reply::RateLimited(retry_after)) => {
                Err(NgaApiError::RateLimitExceeded { retry_after }.into())
            }
            None => Ok("[]".to_string()),
        }
    }
}

#[derive(Clone)]
struct FakeSink {
    enabled: bool,
    fail: bool,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeSink {
    fn new() -> Self {
        Self {
            enabled: true,
            fail: false,
            sent: Arc::default(),
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        if self.fail {
            Err(NotifyError::Rejected { status_code: 500 })
        } else {
            Ok(())
        }
    }
}

fn subjects() -> Vec<MonitoredSubject> {
    vec![
        MonitoredSubject::new("42", "alpha"),
        MonitoredSubject::new("7", "beta"),
    ]
}

fn options() -> MonitorOptions {
    MonitorOptions {
        round_interval: Duration::ZERO,
        subject_delay: Duration::ZERO,
        subject_delay_jitter: Duration::ZERO,
    }
}

fn post(tid: &str, pid: &str, author: &str) -> String {
    format!(
        r#"{{"tid":"{}","pid":"{}","authorid":"{}","subject":"s{}","content":"c{}"}}"#,
        tid, pid, author, tid, pid
    )
}

fn listing(posts: &[String]) -> String {
    let entries: Vec<String> = posts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("\"{}\":{}", i, p))
        .collect();
    format!(r#"{{"data":{{"__R":{{{}}}}}}}"#, entries.join(","))
}

fn monitor<L: HistoryLog>(
    source: FakeSource,
    sink: FakeSink,
    store: IdentityStore<L>,
) -> MonitorService<FakeSource, FakeSink, L> {
    MonitorService::new(
        subjects(),
        source,
        sink,
        store,
        Deduplicator::default(),
        DiagnosticsWriter::disabled(),
        options(),
    )
}

fn paced_monitor<L: HistoryLog>(
    subjects: Vec<MonitoredSubject>,
    options: MonitorOptions,
    source: FakeSource,
    store: IdentityStore<L>,
) -> MonitorService<FakeSource, FakeSink, L> {
    MonitorService::new(
        subjects,
        source,
        FakeSink::new(),
        store,
        Deduplicator::default(),
        DiagnosticsWriter::disabled(),
        options,
    )
}

fn three_subjects() -> Vec<MonitoredSubject> {
    vec![
        MonitoredSubject::new("1", "one"),
        MonitoredSubject::new("2", "two"),
        MonitoredSubject::new("3", "three"),
    ]
}

fn paced(delay_ms: u64, jitter_ms: u64) -> MonitorOptions {
    MonitorOptions {
        round_interval: Duration::ZERO,
        subject_delay: Duration::from_millis(delay_ms),
        subject_delay_jitter: Duration::from_millis(jitter_ms),
    }
}

#[tokio::test]
async fn first_round_on_empty_history_is_suppressed() {
    let source = FakeSource::default();
    source.set_body("42", &listing(&[post("1", "0", "42"), post("1", "10", "42")]));
    source.set_body("7", &listing(&[post("2", "20", "7")]));
    let sink = FakeSink::new();

    let mut service = monitor(
        source.clone(),
        sink.clone(),
        IdentityStore::load(MemoryLog::new()).unwrap(),
    );
    assert!(service.is_suppressed());

    let first = service.run_round().await;
    assert!(first.suppressed_round);
    assert_eq!(first.new_posts, 3);
    assert_eq!(first.not_pushed, 3);
    assert_eq!(service.store().len(), 3);
    assert!(sink.sent().is_empty());
    assert!(!service.is_suppressed());

    let second = service.run_round().await;
    assert!(!second.suppressed_round);
    assert_eq!(second.new_posts, 0);
    assert!(sink.sent().is_empty());

    source.set_body(
        "7",
        &listing(&[post("2", "20", "7"), post("3", "0", "7")]),
    );
    let third = service.run_round().await;
    assert_eq!(third.delivered, 1);
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "NGA update: beta");
    assert!(sent[0].1.contains("new thread"));
    assert!(sent[0].1.contains("read.php?tid=3"));
    assert_eq!(service.rounds_completed(), 3);
}

#[tokio::test]
async fn suppression_ends_even_when_nothing_was_found() {
    let sink = FakeSink::new();
    let source = FakeSource::default();
    let mut service = monitor(
        source.clone(),
        sink.clone(),
        IdentityStore::load(MemoryLog::new()).unwrap(),
    );

    let first = service.run_round().await;
    assert!(first.suppressed_round);
    assert_eq!(first.new_posts, 0);

    source.set_body("42", &listing(&[post("5", "0", "42")]));
    service.run_round().await;
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn existing_history_pushes_immediately() {
    let source = FakeSource::default();
    source.set_body("42", &listing(&[post("1", "0", "42"), post("1", "11", "42")]));
    let sink = FakeSink::new();
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_1_pid_0"])).unwrap();

    let mut service = monitor(source, sink.clone(), store);
    assert!(!service.is_suppressed());

    let summary = service.run_round().await;
    assert_eq!(summary.new_posts, 1);
    assert_eq!(summary.delivered, 1);
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("reply"));
    assert!(sent[0].1.contains("read.php?pid=11"));
}

#[tokio::test]
async fn failing_subject_does_not_abort_the_round() {
    let source = FakeSource::default();
    source.set_status("42", 503);
    source.set_body("7", &listing(&[post("8", "0", "7")]));
    let sink = FakeSink::new();
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();

    let mut service = monitor(source, sink.clone(), store);
    let summary = service.run_round().await;
    assert_eq!(summary.subjects_polled, 2);
    assert_eq!(summary.subjects_failed, 1);
    assert_eq!(summary.delivered, 1);
    assert!(service.store().contains(&PostIdentity::new("8", "0")));
}

#[tokio::test]
async fn unparseable_payload_is_saved_for_diagnosis() {
    let dir = std::env::temp_dir().join(format!("ngawatch_diag_{}", uuid::Uuid::new_v4()));
    let source = FakeSource::default();
    source.set_body("42", "<html><title>502 Bad Gateway</title></html>");
    source.set_body("7", &listing(&[post("8", "0", "7")]));
    let sink = FakeSink::new();
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();

    let mut service = MonitorService::new(
        subjects(),
        source,
        sink.clone(),
        store,
        Deduplicator::default(),
        DiagnosticsWriter::new(Some(dir.clone())),
        options(),
    );
    let summary = service.run_round().await;
    assert_eq!(summary.subjects_failed, 1);
    assert_eq!(summary.delivered, 1);

    let saved: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .collect();
    assert_eq!(saved.len(), 1);
    let contents = std::fs::read_to_string(saved[0].path()).unwrap();
    assert!(contents.contains("502 Bad Gateway"));

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn failed_push_is_not_retried() {
    let source = FakeSource::default();
    source.set_body("42", &listing(&[post("1", "0", "42")]));
    let mut sink = FakeSink::new();
    sink.fail = true;
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();

    let mut service = monitor(source, sink.clone(), store);
    let first = service.run_round().await;
    assert_eq!(first.delivery_failures, 1);
    assert!(service.store().contains(&PostIdentity::new("1", "0")));

    let second = service.run_round().await;
    assert_eq!(second.new_posts, 0);
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn disabled_sink_only_logs() {
    let source = FakeSource::default();
    source.set_body("42", &listing(&[post("1", "0", "42")]));
    let mut sink = FakeSink::new();
    sink.enabled = false;
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();

    let mut service = monitor(source, sink.clone(), store);
    let summary = service.run_round().await;
    assert_eq!(summary.new_posts, 1);
    assert_eq!(summary.not_pushed, 1);
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn cross_author_posts_never_notify() {
    let source = FakeSource::default();
    source.set_body("42", &listing(&[post("1", "0", "999"), post("1", "5", "42")]));
    let sink = FakeSink::new();
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();

    let mut service = monitor(source, sink.clone(), store);
    let summary = service.run_round().await;
    assert_eq!(summary.new_posts, 1);
    assert!(!service.store().contains(&PostIdentity::new("1", "0")));
}

#[tokio::test]
async fn restart_does_not_renotify() {
    let path = std::env::temp_dir().join(format!(
        "ngawatch_restart_{}.txt",
        uuid::Uuid::new_v4()
    ));
    std::fs::write(&path, "tid_0_pid_0\n").unwrap();

    let source = FakeSource::default();
    source.set_body("42", &listing(&[post("1", "0", "42")]));
    source.set_body("7", &listing(&[post("2", "3", "7")]));

    let sink = FakeSink::new();
    let store = IdentityStore::load(FileLog::new(&path)).unwrap();
    let mut service = monitor(source.clone(), sink.clone(), store);
    assert_eq!(service.run_round().await.delivered, 2);
    drop(service);

    let restarted_sink = FakeSink::new();
    let store = IdentityStore::load(FileLog::new(&path)).unwrap();
    assert_eq!(store.len(), 3);
    let mut service = monitor(source, restarted_sink.clone(), store);
    assert!(!service.is_suppressed());
    assert_eq!(service.run_round().await.new_posts, 0);
    assert!(restarted_sink.sent().is_empty());

    std::fs::remove_file(path).ok();
}

#[tokio::test(start_paused = true)]
async fn delay_only_between_subjects() {
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();
    let mut service = paced_monitor(
        three_subjects(),
        paced(1_000, 200),
        FakeSource::default(),
        store,
    );

    let started = Instant::now();
    let summary = service.run_round().await;
    let elapsed = started.elapsed();

    assert_eq!(summary.subjects_polled, 3);
    // Two gaps for three subjects, each within delay..=delay+jitter.
    assert!(elapsed >= Duration::from_millis(2_000), "{:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(2_400), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn single_subject_round_does_not_wait() {
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();
    let mut service = paced_monitor(
        vec![MonitoredSubject::new("1", "one")],
        paced(5_000, 0),
        FakeSource::default(),
        store,
    );

    let started = Instant::now();
    service.run_round().await;
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_extends_the_next_wait() {
    let source = FakeSource::default();
    source.set_rate_limited("1", 10);
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();
    let mut service = paced_monitor(three_subjects(), paced(1_000, 0), source, store);

    let started = Instant::now();
    let summary = service.run_round().await;
    let elapsed = started.elapsed();

    assert_eq!(summary.subjects_failed, 1);
    // 10 s after the rate-limited subject, then the ordinary 1 s gap.
    assert!(elapsed >= Duration::from_secs(11), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(12), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_wait_is_capped() {
    let source = FakeSource::default();
    source.set_rate_limited("42", 3_600);
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();
    let mut service = paced_monitor(subjects(), paced(1_000, 0), source, store);

    let started = Instant::now();
    service.run_round().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(300), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(301), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_on_last_subject_does_not_wait() {
    let source = FakeSource::default();
    source.set_rate_limited("7", 120);
    let store = IdentityStore::load(MemoryLog::with_lines(["tid_0_pid_0"])).unwrap();
    let mut service = paced_monitor(subjects(), paced(1_000, 0), source, store);

    let started = Instant::now();
    let summary = service.run_round().await;

    assert_eq!(summary.subjects_failed, 1);
    assert!(started.elapsed() < Duration::from_secs(2));
}
