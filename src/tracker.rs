use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Marker file name inside a namespace directory.
pub const TRACKER_FILE: &str = "TRACKER";

/// Watermark store: one RFC 3339 timestamp per output namespace, recording the
/// feed-level "updated" value of the last run that rendered output.
///
/// Persistence is best-effort on both sides. A read that fails for any reason
/// behaves as "no watermark" and a failed write is swallowed; the only cost of
/// either is reprocessing the same feed state on the next run.
pub struct Tracker {
    path: PathBuf,
}

impl Tracker {
    pub fn new(namespace_dir: &Path) -> Self {
        Self {
            path: namespace_dir.join(TRACKER_FILE),
        }
    }

    pub fn read(&self) -> Option<DateTime<Utc>> {
        let text = fs::read_to_string(&self.path).ok()?;
        let line = text.lines().next()?;
        DateTime::parse_from_rfc3339(line.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn write(&self, timestamp: DateTime<Utc>) {
        if let Err(e) = fs::write(&self.path, timestamp.to_rfc3339()) {
            debug!("Tracker write to {} failed: {}", self.path.display(), e);
        }
    }
}
