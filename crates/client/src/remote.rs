use async_trait::async_trait;
use reqwest::Url;
use specex_coordinator::RpcEndpoint;
use specex_core::wire::{DetectRequest, DetectResponse};

/// Detection service endpoint speaking the JSON-over-HTTP detection
/// protocol.
pub struct HttpDetectionEndpoint {
    http: reqwest::Client,
    url: Url,
}

impl HttpDetectionEndpoint {
    pub fn new(http: reqwest::Client, base: &Url) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            url: base.join("api/detect")?,
        })
    }
}

#[async_trait]
impl RpcEndpoint<DetectRequest, DetectResponse> for HttpDetectionEndpoint {
    async fn invoke(&self, request: DetectRequest) -> anyhow::Result<DetectResponse> {
        let res = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("http {status}: {body}");
        }
        Ok(res.json().await?)
    }
}
