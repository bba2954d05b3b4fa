use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request to Neynar failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Neynar responded with {status}: {body}")]
    Status { status: u16, body: String },
}

/// 返信キャストの投稿口
#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    /// 親キャストにぶら下げて投稿し、新しいキャストのハッシュを返す
    async fn publish_reply(&self, text: &str, parent: &str) -> Result<String, PublishError>;
}

#[derive(Debug, Serialize)]
struct PublishCastRequest<'a> {
    signer_uuid: &'a str,
    text: &'a str,
    parent: &'a str,
}

#[derive(Debug, Deserialize)]
struct PublishCastResponse {
    #[serde(default)]
    cast: Option<PublishedCast>,
}

#[derive(Debug, Deserialize)]
struct PublishedCast {
    hash: String,
}

pub struct NeynarClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    signer_uuid: String,
}

impl NeynarClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        signer_uuid: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            signer_uuid: signer_uuid.into(),
        }
    }

    fn cast_url(&self) -> String {
        format!("{}/v2/farcaster/cast", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl ReplyPublisher for NeynarClient {
    async fn publish_reply(&self, text: &str, parent: &str) -> Result<String, PublishError> {
        let body = PublishCastRequest {
            signer_uuid: &self.signer_uuid,
            text,
            parent,
        };

        let response = self
            .http
            .post(self.cast_url())
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let published: PublishCastResponse = response.json().await?;
        Ok(published.cast.map(|cast| cast.hash).unwrap_or_default())
    }
}
