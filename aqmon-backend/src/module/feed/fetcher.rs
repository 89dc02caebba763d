//! Single-page retrieval from the remote feed.

use anyhow::Context;
use aqmon_common::StationRecord;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::parser::parse_page;
use crate::error::FetchError;

/// One page of records plus the link to the next page, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<StationRecord>,
    pub next: Option<String>,
}

/// Source of feed pages.
///
/// The sync controller only ever talks to this trait, which keeps it
/// testable with scripted in-memory feeds.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError>;
}

/// `reqwest`-backed fetcher with a bounded per-request timeout.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aqmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        tracing::debug!("Fetching feed page {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {}", status.as_u16())));
        }

        let body = response.text().await?;
        let page = parse_page(&body)?;

        tracing::debug!(
            "Feed page parsed: {} records, next page: {}",
            page.records.len(),
            page.next.is_some()
        );
        Ok(page)
    }
}
