pub mod config;
pub mod contacts;
pub mod fetcher;
pub mod normalizer;
pub mod notify;
pub mod pipeline;
pub mod render;
pub mod tracker;
pub mod types;

pub use config::{CredentialsConfig, DigestConfig};
pub use fetcher::{FeedFetcher, FeedSource, FetchConfig, HttpFeedSource};
pub use notify::{GmailNotifier, Notifier, NotifyError, OutboundMessage, SmtpNotifier};
pub use pipeline::{DigestPipeline, RunOutcome, SkipReason};
pub use tracker::Tracker;
pub use types::{DigestError, FeedSnapshot, PostRecord, Result};
