use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::notify::NotifyError;

/// One fetched-and-normalized view of a feed, scoped to a single pipeline run.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub title: Option<String>,
    /// Feed-level "updated" timestamp. Absent when the feed does not carry one
    /// or carries one we cannot parse; this disables the freshness check for
    /// the run rather than failing it.
    pub updated_at: Option<DateTime<Utc>>,
    /// Entries in source order.
    pub entries: Vec<PostRecord>,
}

/// A single feed entry, extracted verbatim (no sanitization, no rewriting).
#[derive(Debug, Clone, Serialize)]
pub struct PostRecord {
    pub title: String,
    pub author: String,
    pub link: String,
    pub summary: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed fetch failed: {0}")]
    Fetch(String),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("template render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("contact list unreadable: {path}")]
    Contacts {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("delivery error: {0}")]
    Delivery(#[from] NotifyError),
}

pub type Result<T> = std::result::Result<T, DigestError>;
