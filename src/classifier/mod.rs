use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::json;
use std::fmt;
use tracing::info;

use crate::classifier::model::ClassifyResp;
use crate::model::Classification;

pub mod model;

/// External AI vision service that labels a captured image with crop and
/// disease information. Idempotent from the caller's perspective, so a
/// failed call is always safe to retry.
#[async_trait]
pub trait ClassifierService: Send + Sync {
    async fn classify(&self, payload_data: &str) -> Result<Classification>;
}

#[derive(Clone)]
pub struct HttpClassifier {
    http: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl fmt::Debug for HttpClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClassifier")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HttpClassifier {
    pub fn new(endpoint: &str, api_key: String, model: String) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("invalid classifier endpoint")?;
        Ok(Self::with_endpoint(endpoint, api_key, model))
    }

    pub fn with_endpoint(endpoint: Url, api_key: String, model: String) -> Self {
        let http = Client::builder()
            .user_agent("cropscan/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ClassifierService for HttpClassifier {
    async fn classify(&self, payload_data: &str) -> Result<Classification> {
        let body = json!({
            "model": self.model,
            "image": payload_data,
        });
        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("classifier request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("classifier returned {}: {}", status, text));
        }

        let parsed: ClassifyResp = resp
            .json()
            .await
            .context("classifier response is not valid JSON")?;
        info!(
            crop = %parsed.crop_type,
            healthy = parsed.is_healthy,
            "classification received"
        );
        Ok(parsed.into_classification())
    }
}
