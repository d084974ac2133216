use crate::config::DigestConfig;
use crate::contacts;
use crate::fetcher::FeedSource;
use crate::notify::Notifier;
use crate::render;
use crate::tracker::Tracker;
use crate::types::{DigestError, Result};
use chrono::Local;
use std::path::PathBuf;
use tracing::{info, warn};

/// Why a run ended without rendering. Skips are ordinary outcomes, not
/// failures; both leave the namespace untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The feed parsed but carried no entries.
    NoEntries,
    /// The watermark says this feed update was already processed.
    AlreadyProcessed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        digest_path: PathBuf,
        /// Whether a message was actually delivered (false when no backend is
        /// configured or the contact list was empty).
        notified: bool,
    },
    Skipped(SkipReason),
}

/// The feed-processing pipeline: fetch, freshness check, render, write,
/// notify, watermark. One instance handles one run over one namespace.
pub struct DigestPipeline {
    config: DigestConfig,
    source: Box<dyn FeedSource>,
    notifier: Option<Box<dyn Notifier>>,
}

impl DigestPipeline {
    pub fn new(
        config: DigestConfig,
        source: Box<dyn FeedSource>,
        notifier: Option<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            config,
            source,
            notifier,
        }
    }

    /// Run the pipeline once. `force` bypasses the freshness check.
    ///
    /// Errors out of this method are advisory to the process: the caller logs
    /// them and still exits cleanly. A delivery error is deliberately the last
    /// thing raised, after the digest exists and the watermark is written, so
    /// a partially successful run is reported as such.
    pub async fn run(&self, url: &str, force: bool) -> Result<RunOutcome> {
        info!("Parsing data from {}", url);
        let snapshot = self.source.fetch_snapshot(url).await?;

        if snapshot.entries.is_empty() {
            info!("No entries found");
            return Ok(RunOutcome::Skipped(SkipReason::NoEntries));
        }

        let namespace_dir = self.config.namespace_dir();
        let tracker = Tracker::new(&namespace_dir);

        if !force {
            if let (Some(updated_at), Some(watermark)) = (snapshot.updated_at, tracker.read()) {
                if watermark >= updated_at {
                    info!("Feed already processed");
                    return Ok(RunOutcome::Skipped(SkipReason::AlreadyProcessed));
                }
            }
        }

        info!("Found {} posts", snapshot.entries.len());

        let now = Local::now();
        let html = render::render_digest(
            &self.config.templates_folder,
            &self.config.template_name,
            &snapshot,
            now,
        )?;
        let digest_path = render::write_digest(&namespace_dir, now, &html)?;

        let notify_result = match &self.notifier {
            Some(notifier) => self.send_digest(notifier.as_ref(), &html).await,
            None => Ok(false),
        };

        // The feed state was processed (a digest exists), so the watermark
        // advances even when delivery failed; the error still surfaces below.
        if let Some(updated_at) = snapshot.updated_at {
            info!("Setting tracker info");
            tracker.write(updated_at);
        }

        let notified = notify_result?;
        Ok(RunOutcome::Completed {
            digest_path,
            notified,
        })
    }

    async fn send_digest(&self, notifier: &dyn Notifier, html: &str) -> Result<bool> {
        info!("Parsing contacts from {}", self.config.contacts.display());
        let contacts =
            contacts::parse_contacts(&self.config.contacts).map_err(|source| {
                DigestError::Contacts {
                    path: self.config.contacts.clone(),
                    source,
                }
            })?;

        if contacts.is_empty() {
            warn!("No contacts found, skipping notification");
            return Ok(false);
        }

        info!("Sending email to {} contacts", contacts.len());
        let subject = format!("{} Posts", self.config.template_name);
        let recipients = contacts.join(",");
        let message = notifier.compose(&self.config.sender, &recipients, &subject, html)?;
        notifier.deliver(message).await?;
        Ok(true)
    }
}
