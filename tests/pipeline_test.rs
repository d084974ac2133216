use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use feed_digest::config::DigestConfig;
use feed_digest::fetcher::FeedSource;
use feed_digest::notify::{Notifier, NotifyError, OutboundMessage};
use feed_digest::pipeline::{DigestPipeline, RunOutcome, SkipReason};
use feed_digest::tracker::Tracker;
use feed_digest::types::{DigestError, FeedSnapshot, PostRecord, Result};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::info;

/// Feed source that serves one canned snapshot per run.
struct StaticFeed {
    snapshot: FeedSnapshot,
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch_snapshot(&self, _url: &str) -> Result<FeedSnapshot> {
        Ok(self.snapshot.clone())
    }
}

#[derive(Debug, Clone)]
struct ComposedMail {
    recipients: String,
    subject: String,
}

/// Notifier that records compositions and deliveries, optionally failing the
/// delivery leg.
struct RecordingNotifier {
    composed: Arc<Mutex<Vec<ComposedMail>>>,
    delivered: Arc<Mutex<usize>>,
    fail_delivery: bool,
}

impl RecordingNotifier {
    fn new(fail_delivery: bool) -> Self {
        Self {
            composed: Arc::new(Mutex::new(Vec::new())),
            delivered: Arc::new(Mutex::new(0)),
            fail_delivery,
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn compose(
        &self,
        _sender: &str,
        recipients: &str,
        subject: &str,
        _html_body: &str,
    ) -> std::result::Result<OutboundMessage, NotifyError> {
        self.composed.lock().unwrap().push(ComposedMail {
            recipients: recipients.to_string(),
            subject: subject.to_string(),
        });
        Ok(OutboundMessage::Encoded(String::new()))
    }

    async fn deliver(&self, _message: OutboundMessage) -> std::result::Result<(), NotifyError> {
        if self.fail_delivery {
            return Err(NotifyError::Api("mailbox on fire".to_string()));
        }
        *self.delivered.lock().unwrap() += 1;
        Ok(())
    }
}

struct TestEnv {
    tmp: TempDir,
    config: DigestConfig,
}

impl TestEnv {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let templates = tmp.path().join("templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(
            templates.join("daily.html"),
            "<html><body><p>{{ date }}</p>{% for post in posts %}<h2>{{ post.title }}</h2>{{ post.summary | safe }}{% endfor %}</body></html>",
        )
        .unwrap();

        let contacts = tmp.path().join("contacts.txt");
        fs::write(&contacts, "Alice, alice@x.com\n").unwrap();

        let config = DigestConfig {
            templates_folder: templates,
            template_name: "daily".to_string(),
            output_folder: tmp.path().join("out"),
            contacts,
            sender: "Feed Digest <digest@example.com>".to_string(),
            credentials: Default::default(),
        };
        Self { tmp, config }
    }

    fn namespace_dir(&self) -> std::path::PathBuf {
        self.config.namespace_dir()
    }

    fn pipeline(&self, snapshot: FeedSnapshot, notifier: Option<Box<dyn Notifier>>) -> DigestPipeline {
        DigestPipeline::new(
            self.config.clone(),
            Box::new(StaticFeed { snapshot }),
            notifier,
        )
    }
}

fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, hour, 0, 0).unwrap()
}

fn snapshot(updated_at: Option<DateTime<Utc>>) -> FeedSnapshot {
    FeedSnapshot {
        title: Some("Example Blog".to_string()),
        updated_at,
        entries: vec![PostRecord {
            title: "First post".to_string(),
            author: "Alice".to_string(),
            link: "https://example.com/1".to_string(),
            summary: "<p>Summary</p>".to_string(),
        }],
    }
}

fn digest_files(namespace: &Path) -> Vec<std::path::PathBuf> {
    match fs::read_dir(namespace) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|x| x == "html").unwrap_or(false))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

#[tokio::test]
async fn empty_feed_leaves_no_trace() {
    init_tracing();
    let env = TestEnv::new();

    let empty = FeedSnapshot {
        title: None,
        updated_at: Some(ts(10)),
        entries: Vec::new(),
    };
    let outcome = env.pipeline(empty, None).run("http://feed", false).await.unwrap();

    assert_eq!(outcome, RunOutcome::Skipped(SkipReason::NoEntries));
    assert!(!env.namespace_dir().exists(), "no output directory for an empty feed");
}

#[tokio::test]
async fn second_run_is_idempotent() {
    init_tracing();
    let env = TestEnv::new();

    let first = env
        .pipeline(snapshot(Some(ts(10))), None)
        .run("http://feed", false)
        .await
        .unwrap();
    assert!(matches!(first, RunOutcome::Completed { .. }));

    let second = env
        .pipeline(snapshot(Some(ts(10))), None)
        .run("http://feed", false)
        .await
        .unwrap();
    assert_eq!(second, RunOutcome::Skipped(SkipReason::AlreadyProcessed));

    let files = digest_files(&env.namespace_dir());
    info!("digest files after two runs: {:?}", files);
    assert_eq!(files.len(), 1, "exactly one digest from the first run");
    assert_eq!(Tracker::new(&env.namespace_dir()).read(), Some(ts(10)));
}

#[tokio::test]
async fn force_always_renders_and_rewrites_the_watermark() {
    init_tracing();
    let env = TestEnv::new();

    env.pipeline(snapshot(Some(ts(10))), None)
        .run("http://feed", false)
        .await
        .unwrap();

    // Second-resolution digest names: make sure the forced run lands on a new one.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let forced = env
        .pipeline(snapshot(Some(ts(10))), None)
        .run("http://feed", true)
        .await
        .unwrap();
    assert!(matches!(forced, RunOutcome::Completed { .. }));

    assert_eq!(digest_files(&env.namespace_dir()).len(), 2);
    assert_eq!(Tracker::new(&env.namespace_dir()).read(), Some(ts(10)));
}

#[tokio::test]
async fn watermark_never_moves_backward() {
    init_tracing();
    let env = TestEnv::new();

    env.pipeline(snapshot(Some(ts(8))), None)
        .run("http://feed", false)
        .await
        .unwrap();
    assert_eq!(Tracker::new(&env.namespace_dir()).read(), Some(ts(8)));

    let newer = env
        .pipeline(snapshot(Some(ts(12))), None)
        .run("http://feed", false)
        .await
        .unwrap();
    assert!(matches!(newer, RunOutcome::Completed { .. }));
    assert_eq!(Tracker::new(&env.namespace_dir()).read(), Some(ts(12)));

    // An older feed state is already covered by the watermark: skipped, and
    // the stored timestamp stays where it was.
    let older = env
        .pipeline(snapshot(Some(ts(8))), None)
        .run("http://feed", false)
        .await
        .unwrap();
    assert_eq!(older, RunOutcome::Skipped(SkipReason::AlreadyProcessed));
    assert_eq!(Tracker::new(&env.namespace_dir()).read(), Some(ts(12)));
}

#[tokio::test]
async fn feed_without_timestamp_always_renders_and_never_tracks() {
    init_tracing();
    let env = TestEnv::new();

    for _ in 0..2 {
        let outcome = env
            .pipeline(snapshot(None), None)
            .run("http://feed", false)
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
    }
    assert_eq!(Tracker::new(&env.namespace_dir()).read(), None);
}

#[tokio::test]
async fn missing_template_aborts_before_any_output() {
    init_tracing();
    let env = TestEnv::new();
    fs::remove_file(env.config.templates_folder.join("daily.html")).unwrap();

    let result = env
        .pipeline(snapshot(Some(ts(10))), None)
        .run("http://feed", false)
        .await;

    assert!(matches!(result, Err(DigestError::TemplateNotFound { .. })));
    assert!(!env.namespace_dir().exists(), "no output directory after a template failure");
}

#[tokio::test]
async fn quiet_mode_never_touches_the_contact_list() {
    init_tracing();
    let mut env = TestEnv::new();
    // Point at a file that does not exist: the run may only succeed if the
    // contact list is never read.
    env.config.contacts = env.tmp.path().join("no-such-contacts.txt");

    let outcome = env
        .pipeline(snapshot(Some(ts(10))), None)
        .run("http://feed", false)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { notified: false, .. }));
}

#[tokio::test]
async fn empty_contact_list_skips_notification_without_failing() {
    init_tracing();
    let env = TestEnv::new();
    fs::write(&env.config.contacts, "\n\n").unwrap();

    let notifier = RecordingNotifier::new(false);
    let composed = notifier.composed.clone();
    let outcome = env
        .pipeline(snapshot(Some(ts(10))), Some(Box::new(notifier)))
        .run("http://feed", false)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { notified: false, .. }));
    assert!(composed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn one_message_is_addressed_to_all_contacts() {
    init_tracing();
    let env = TestEnv::new();
    fs::write(&env.config.contacts, "Alice, alice@x.com\nbob@y.com\n").unwrap();

    let notifier = RecordingNotifier::new(false);
    let composed = notifier.composed.clone();
    let delivered = notifier.delivered.clone();
    let outcome = env
        .pipeline(snapshot(Some(ts(10))), Some(Box::new(notifier)))
        .run("http://feed", false)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { notified: true, .. }));
    assert_eq!(*delivered.lock().unwrap(), 1);

    let composed = composed.lock().unwrap();
    assert_eq!(composed.len(), 1);
    assert_eq!(composed[0].recipients, "Alice <alice@x.com>,bob@y.com");
    assert_eq!(composed[0].subject, "daily Posts");
}

#[tokio::test]
async fn delivery_failure_is_a_partial_success() {
    init_tracing();
    let env = TestEnv::new();

    let notifier = RecordingNotifier::new(true);
    let result = env
        .pipeline(snapshot(Some(ts(10))), Some(Box::new(notifier)))
        .run("http://feed", false)
        .await;

    // The error surfaces, but the digest was written and the watermark
    // advanced: the same feed state is not reprocessed next run.
    assert!(matches!(result, Err(DigestError::Delivery(_))));
    assert_eq!(digest_files(&env.namespace_dir()).len(), 1);
    assert_eq!(Tracker::new(&env.namespace_dir()).read(), Some(ts(10)));
}
