//! Background ingestion from a paged, newest-first timeline.
//!
//! A poll pages backwards from the newest item until the source runs dry or
//! reaches the chain's cursor, trains every item, then advances the cursor to
//! the newest id seen and checkpoints the chain. Network calls never run
//! while the chain is locked; each `train` is a short, separate write.

pub mod twitter;

use crate::chain::Chain;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use twitter::TwitterSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineItem {
    pub id: u64,
    pub text: String,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Unexpected response status {0}")]
    Status(u16),
}

/// A source of externally numbered text items.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Returns items newer than `since_id` (0 = no lower bound) and no newer
    /// than `max_id`, newest first. An empty page means nothing is left.
    async fn fetch_page(
        &self,
        since_id: u64,
        max_id: Option<u64>,
    ) -> Result<Vec<TimelineItem>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Sleep between polls.
    pub interval: Duration,
    /// Shortest wait after a rate-limit response.
    pub min_rate_limit_wait: Duration,
    /// Where the chain is checkpointed after a productive poll.
    pub state_file: PathBuf,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            min_rate_limit_wait: Duration::from_secs(10),
            state_file: PathBuf::from("state"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub pages: usize,
    pub items: usize,
    pub trained: usize,
    pub rate_limited: usize,
    pub latest_id: Option<u64>,
}

/// Runs a single poll against `source`.
///
/// The whole batch is fetched before anything is learned, then trained
/// oldest first. Rate-limit responses are waited out and retried. Any other
/// failure ends the poll without training or moving the cursor.
pub async fn poll_once<S>(
    source: &S,
    chain: &Arc<Chain>,
    config: &PollerConfig,
) -> Result<PollReport, FetchError>
where
    S: TimelineSource + ?Sized,
{
    let since_id = chain.since_id();
    let mut report = PollReport::default();
    let mut batch: Vec<TimelineItem> = Vec::new();
    let mut max_id = None;

    loop {
        let page = match source.fetch_page(since_id, max_id).await {
            Ok(page) => page,
            Err(FetchError::RateLimited { retry_after }) => {
                let wait = retry_after.max(config.min_rate_limit_wait);
                warn!(?wait, "rate limited, waiting before retry");
                report.rate_limited += 1;
                tokio::time::sleep(wait).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        if page.is_empty() {
            debug!("no more results, end of timeline");
            break;
        }
        report.pages += 1;
        debug!(batch = page.len(), "fetched timeline page");

        let oldest = page.iter().map(|item| item.id).min().unwrap_or(0);
        batch.extend(page);
        if oldest <= since_id.saturating_add(1) {
            break;
        }
        max_id = Some(oldest - 1);
    }

    batch.sort_by_key(|item| item.id);
    report.items = batch.len();
    for item in &batch {
        if item.text.is_empty() {
            debug!(id = item.id, "skipping empty item");
        } else {
            chain.train(&item.text);
            report.trained += 1;
        }
    }

    if let Some(latest) = batch.last().map(|item| item.id).filter(|&id| id > 0) {
        report.latest_id = Some(latest);
        chain.advance_since_id(latest);
        checkpoint(chain, config).await;
    }

    info!(
        pages = report.pages,
        trained = report.trained,
        since_id = chain.since_id(),
        "timeline poll finished"
    );
    Ok(report)
}

/// Saves the chain on the blocking pool. Failures are logged; the next
/// productive poll retries.
async fn checkpoint(chain: &Arc<Chain>, config: &PollerConfig) {
    let chain = Arc::clone(chain);
    let path = config.state_file.clone();
    match tokio::task::spawn_blocking(move || chain.save(&path)).await {
        Ok(Ok(())) => debug!(path = %config.state_file.display(), "checkpointed chain"),
        Ok(Err(e)) => warn!(error = %e, "failed to save chain state"),
        Err(e) => warn!(error = %e, "checkpoint task failed"),
    }
}

/// Polls forever, sleeping `config.interval` between polls.
pub async fn run_poller<S>(source: Arc<S>, chain: Arc<Chain>, config: PollerConfig)
where
    S: TimelineSource + ?Sized,
{
    info!(interval = ?config.interval, "starting timeline poller");
    loop {
        if let Err(e) = poll_once(source.as_ref(), &chain, &config).await {
            warn!(error = %e, "timeline poll failed");
        }
        tokio::time::sleep(config.interval).await;
    }
}
