//! Vehicle position feed client
//!
//! The feed answers a GET with plain text, one vehicle per line. The request
//! carries the configured area so the server only reports nearby vehicles.

use crate::infra::config::Config;
use crate::infra::error::FetchError;
use anyhow::Context;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Source of raw feed snapshots
#[async_trait]
pub trait SnapshotSource: Send {
    /// Fetch one snapshot as raw lines (possibly none)
    async fn fetch_snapshot(&mut self) -> Result<Vec<String>, FetchError>;
}

/// Split a response body into record lines
///
/// Trailing whitespace is dropped first, so an empty or whitespace-only body
/// is an empty snapshot rather than one blank record.
pub fn split_snapshot(body: &str) -> Vec<String> {
    let trimmed = body.trim_end();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('\n').map(|line| line.trim_end_matches('\r').to_string()).collect()
}

/// HTTP client for the live feed
pub struct FeedClient {
    url: String,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.feed_timeout_ms()))
            .http1_only()
            .build()?;

        let url = config.feed_request_url();
        info!(url = %url, timeout_ms = %config.feed_timeout_ms(), "feed_client_initialized");

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for FeedClient {
    async fn fetch_snapshot(&mut self) -> Result<Vec<String>, FetchError> {
        let response = self.client.get(&self.url).header("Accept", "text/plain").send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(FetchError::Body)?;
        let lines = split_snapshot(&body);
        debug!(bytes = %body.len(), lines = %lines.len(), "feed_snapshot_received");
        Ok(lines)
    }
}

/// Prerecorded snapshots served in order, for replays and tests
#[derive(Debug, Default)]
pub struct RecordedFeed {
    queue: VecDeque<Result<Vec<String>, FetchError>>,
}

impl RecordedFeed {
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }

    /// Queue a snapshot given as raw lines
    pub fn push_snapshot<S: AsRef<str>>(&mut self, lines: &[S]) -> &mut Self {
        self.queue.push_back(Ok(lines.iter().map(|l| l.as_ref().to_string()).collect()));
        self
    }

    /// Queue a failed fetch
    pub fn push_failure(&mut self, error: FetchError) -> &mut Self {
        self.queue.push_back(Err(error));
        self
    }

    /// Load every file in a directory as one snapshot, in file name order
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read recording directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut feed = Self::new();
        for path in paths {
            let body = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
            feed.queue.push_back(Ok(split_snapshot(&body)));
        }
        Ok(feed)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl SnapshotSource for RecordedFeed {
    async fn fetch_snapshot(&mut self) -> Result<Vec<String>, FetchError> {
        self.queue
            .pop_front()
            .unwrap_or(Err(FetchError::Exhausted))
    }
}
