use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use scraper::Html;
use url::Url;

const USER_AGENT_VALUE: &str = concat!("talkcorpus/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Something that can return the raw body for a URL.
///
/// Implementations issue exactly one request per call and never retry.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|err| FetchError::Body(err.to_string()))
    }
}

/// Fetch `url` and parse it into a document. Failures are logged and become `None`.
pub async fn fetch_document(source: &dyn PageSource, url: &Url) -> Option<Html> {
    match source.fetch_text(url).await {
        Ok(body) => Some(Html::parse_document(&body)),
        Err(err) => {
            tracing::warn!(url = %url, %err, "fetch failed");
            None
        }
    }
}
