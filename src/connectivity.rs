use async_trait::async_trait;
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;

/// Answers "is the device online right now". The sync manager consults it
/// before a pass and again before each task.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probes a well-known endpoint with a short-timeout HEAD request. Any
/// response at all counts as online; only a transport failure counts as
/// offline.
#[derive(Clone)]
pub struct HttpProbe {
    http: Client,
    probe_url: Url,
}

impl fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProbe")
            .field("probe_url", &self.probe_url)
            .finish()
    }
}

impl HttpProbe {
    pub fn new(probe_url: &str) -> anyhow::Result<Self> {
        let probe_url = Url::parse(probe_url)?;
        let http = Client::builder()
            .user_agent("cropscan/0.1")
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Ok(Self { http, probe_url })
    }
}

#[async_trait]
impl Connectivity for HttpProbe {
    async fn is_online(&self) -> bool {
        self.http.head(self.probe_url.clone()).send().await.is_ok()
    }
}
