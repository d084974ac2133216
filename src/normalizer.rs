use crate::types::{DigestError, FeedSnapshot, PostRecord, Result};
use chrono::Utc;
use feed_rs::parser;
use tracing::{debug, info};

/// Turn raw feed bytes into a [`FeedSnapshot`].
///
/// Entry fields come through verbatim; missing fields degrade to empty
/// strings rather than dropping the entry. The feed-level "updated" value is
/// the RFC-822-style timestamp RSS carries in `lastBuildDate`; when it is
/// absent or unparsable the snapshot simply has no `updated_at`, which
/// disables the freshness check for this run.
pub fn normalize(content: &[u8]) -> Result<FeedSnapshot> {
    debug!("Parsing feed content ({} bytes)", content.len());

    let feed = parser::parse(content)
        .map_err(|e| DigestError::Parse(format!("failed to parse feed: {}", e)))?;

    let title = feed.title.map(|t| t.content);
    let updated_at = feed.updated.map(|dt| dt.with_timezone(&Utc));

    let entries: Vec<PostRecord> = feed.entries.into_iter().map(normalize_entry).collect();

    info!("Parsed feed with {} entries", entries.len());

    Ok(FeedSnapshot {
        title,
        updated_at,
        entries,
    })
}

fn normalize_entry(entry: feed_rs::model::Entry) -> PostRecord {
    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let author = entry
        .authors
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();
    let summary = entry.summary.map(|s| s.content).unwrap_or_default();

    PostRecord {
        title,
        author,
        link,
        summary,
    }
}
