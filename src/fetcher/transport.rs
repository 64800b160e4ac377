use async_trait::async_trait;

use crate::error::{AppError, Result};

/// One HTTP GET returning the response body. Non-2xx is an error.
/// Timeouts are applied by the caller so every implementation honours them.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("meme-pair-scanner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!("HTTP {status}")));
        }
        Ok(resp.text().await?)
    }
}
