use async_trait::async_trait;
use openai_api_rs::v1::api::OpenAIClient;
use openai_api_rs::v1::chat_completion::{self, ChatCompletionRequest};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::GptConfig;

/// プロバイダ失敗の種別（連携境界で判定する）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    QuotaExceeded,
    RateLimited,
    Unknown,
}

impl FailureKind {
    /// OpenAIのエラーメッセージから種別を判定
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        // クォータ超過も429で返るので先に判定する
        if lower.contains("insufficient_quota") || lower.contains("exceeded your current quota") {
            FailureKind::QuotaExceeded
        } else if lower.contains("rate_limit")
            || lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.trim_start().starts_with("429")
        {
            FailureKind::RateLimited
        } else {
            FailureKind::Unknown
        }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion failed ({kind:?}): {message}")]
    Provider { kind: FailureKind, message: String },
    #[error("completion timed out after {0} seconds")]
    Timeout(u64),
    #[error("no content found in response")]
    Empty,
}

impl CompletionError {
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        CompletionError::Provider {
            kind: FailureKind::classify(&message),
            message,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            CompletionError::Provider { kind, .. } => *kind,
            CompletionError::Timeout(_) | CompletionError::Empty => FailureKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: i64,
    pub temperature: f64,
}

/// チャット補完APIの呼び出し口
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// openai-api-rsによる実装
pub struct OpenAiProvider {
    api_key: String,
    endpoint: String,
    timeout_secs: u64,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, config: &GptConfig) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout,
        }
    }
}

fn message(role: chat_completion::MessageRole, text: &str) -> chat_completion::ChatCompletionMessage {
    chat_completion::ChatCompletionMessage {
        role,
        content: chat_completion::Content::Text(String::from(text)),
        name: None,
        tool_calls: None,
        tool_call_id: None,
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut client = OpenAIClient::builder()
            .with_endpoint(self.endpoint.clone())
            .with_api_key(self.api_key.clone())
            .build()
            .map_err(|e| CompletionError::from_provider_message(e.to_string()))?;

        let req = ChatCompletionRequest::new(
            request.model.clone(),
            vec![
                message(chat_completion::MessageRole::system, &request.system),
                message(chat_completion::MessageRole::user, &request.user),
            ],
        )
        .max_tokens(request.max_tokens)
        .temperature(request.temperature);

        // タイムアウトを設定
        let response = match timeout(
            Duration::from_secs(self.timeout_secs),
            client.chat_completion(req),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = CompletionError::from_provider_message(e.to_string());
                tracing::warn!("[GPT] {}", err);
                return Err(err);
            }
            Err(_) => {
                tracing::warn!("[GPT] Timeout after {} seconds", self.timeout_secs);
                return Err(CompletionError::Timeout(self.timeout_secs));
            }
        };

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
            .ok_or(CompletionError::Empty)
    }
}
