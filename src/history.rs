use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::fmt;

use crate::model::ScanRecord;

/// Durable log of completed classification results. Appended to once per
/// successfully classified task; concurrent writers across devices are
/// last-write-wins, which is acceptable because every task belongs to
/// exactly one originating device.
#[async_trait]
pub trait HistoryArchive: Send + Sync {
    async fn append(&self, record: &ScanRecord) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpHistoryArchive {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl fmt::Debug for HttpHistoryArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpHistoryArchive")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpHistoryArchive {
    pub fn new(endpoint: &str, api_key: String) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("invalid history endpoint")?;
        Ok(Self::with_endpoint(endpoint, api_key))
    }

    pub fn with_endpoint(endpoint: Url, api_key: String) -> Self {
        let http = Client::builder()
            .user_agent("cropscan/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl HistoryArchive for HttpHistoryArchive {
    async fn append(&self, record: &ScanRecord) -> Result<()> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .header("apikey", &self.api_key)
            .json(record)
            .send()
            .await
            .context("history append request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("history archive returned {}: {}", status, text));
        }
        Ok(())
    }
}
