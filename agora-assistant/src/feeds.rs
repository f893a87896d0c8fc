//! Read-only community data feeds.
//!
//! The platform's data lives in a hosted Postgres exposed through a
//! PostgREST API. The assistant only ever reads two tables from it: the
//! community directory and the marketplace listings.

use agora_common::{Error, Result, ResultExt};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A community directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecord {
    pub name: String,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// A marketplace listing. A `None` or zero price means the item is free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Source of community records.
#[async_trait]
pub trait CommunityFeed: Send + Sync {
    async fn communities(&self, limit: usize) -> Result<Vec<CommunityRecord>>;
}

/// Source of marketplace listings.
#[async_trait]
pub trait ListingFeed: Send + Sync {
    async fn listings(&self, limit: usize) -> Result<Vec<ListingRecord>>;
}

/// Feed used when no data source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFeed;

#[async_trait]
impl CommunityFeed for EmptyFeed {
    async fn communities(&self, _limit: usize) -> Result<Vec<CommunityRecord>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl ListingFeed for EmptyFeed {
    async fn listings(&self, _limit: usize) -> Result<Vec<ListingRecord>> {
        Ok(Vec::new())
    }
}

/// PostgREST client for the community tables.
#[derive(Clone)]
pub struct RestFeed {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestFeed {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
        }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        order: &str,
        limit: usize,
    ) -> Result<Vec<T>> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let limit = limit.to_string();

        let mut req = self.client.get(&url).query(&[
            ("select", columns),
            ("order", order),
            ("limit", limit.as_str()),
        ]);

        if let Some(ref key) = self.api_key {
            req = req
                .header("apikey", key.as_str())
                .header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout.with_context(format!("reading {}", table))
            } else {
                Error::External(format!("{} request failed: {}", table, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "{} returned {}: {}",
                table,
                status.as_u16(),
                agora_common::util::truncate_with_ellipsis(&body, 200)
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::External(format!("{} body read failed: {}", table, e)))?;

        serde_json::from_slice(&bytes).context(format!("decoding {}", table))
    }
}

#[async_trait]
impl CommunityFeed for RestFeed {
    async fn communities(&self, limit: usize) -> Result<Vec<CommunityRecord>> {
        self.select(
            "communities",
            "name,member_count,tags",
            "member_count.desc",
            limit,
        )
        .await
    }
}

#[async_trait]
impl ListingFeed for RestFeed {
    async fn listings(&self, limit: usize) -> Result<Vec<ListingRecord>> {
        self.select(
            "marketplace_listings",
            "title,category,price",
            "created_at.desc",
            limit,
        )
        .await
    }
}

/// Build both feeds from config: the REST feed when a URL is set, else empty feeds.
pub fn feeds_from_config(
    config: &agora_common::Config,
) -> (Arc<dyn CommunityFeed>, Arc<dyn ListingFeed>) {
    match config.feeds.url.as_deref() {
        Some(url) if !url.is_empty() => {
            let feed = Arc::new(RestFeed::new(
                url,
                config.secrets.feeds_api_key.as_deref(),
                Duration::from_secs(config.feeds.timeout_secs),
            ));
            let communities: Arc<dyn CommunityFeed> = feed.clone();
            let listings: Arc<dyn ListingFeed> = feed;
            (communities, listings)
        }
        _ => {
            tracing::info!("No community data source configured, answers will not be grounded");
            let communities: Arc<dyn CommunityFeed> = Arc::new(EmptyFeed);
            let listings: Arc<dyn ListingFeed> = Arc::new(EmptyFeed);
            (communities, listings)
        }
    }
}
