use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use super::types::{AppState, CastData, WebhookBody};
use crate::neynar::PublishError;

pub const CAST_CREATED: &str = "cast.created";
pub const SECRET_HEADER: &str = "x-webhook-secret";

/// キャスト作成Webhookの受け口
///
/// 検証を通過した後の内部エラーは常に200で受理する（送信元の再送を防ぐ）
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<WebhookBody>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    if !is_authorized(&state, &headers) {
        tracing::warn!("[Webhook] Rejected request: invalid or missing {}", SECRET_HEADER);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        );
    }

    let body = match body {
        Ok(Json(body)) => body,
        Err(e) => {
            tracing::warn!("[Webhook] Invalid webhook data: {}", e);
            return invalid_data();
        }
    };

    let (event_type, data) = match (body.event_type, body.data) {
        (Some(event_type), Some(data)) => (event_type, data),
        _ => {
            tracing::warn!("[Webhook] Invalid webhook data: missing type or data");
            return invalid_data();
        }
    };

    if event_type != CAST_CREATED {
        tracing::info!("[Webhook] Ignoring non-cast webhook: {}", event_type);
        return acknowledged();
    }

    // 返信先のないキャストには返信できない
    if data.hash.trim().is_empty() {
        tracing::warn!("[Webhook] Invalid webhook data: cast without hash");
        return invalid_data();
    }

    if !data.mentions(&state.bot_fid) {
        tracing::debug!("[Webhook] Bot not mentioned, ignoring cast {}", data.hash);
        return acknowledged();
    }

    // 送信元が切断してもハンドラと一緒に中断されないよう別タスクで処理する
    let hash = data.hash.clone();
    let task = tokio::spawn(async move { process_cast(&state, &data).await });
    let failure = match task.await {
        Ok(Ok(())) => return acknowledged(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    tracing::error!("[Webhook] Error processing cast {}: {}", hash, failure);
    (
        StatusCode::OK,
        Json(json!({
            "status": "error",
            "message": "Internal error, but webhook received"
        })),
    )
}

async fn process_cast(state: &AppState, data: &CastData) -> Result<(), PublishError> {
    let question = extract_question(&data.text);
    let author = data
        .author
        .as_ref()
        .map(|a| a.username.clone().unwrap_or_else(|| a.fid.clone()))
        .unwrap_or_default();
    tracing::info!("[Webhook] Processing question from {}: {}", author, question);

    let reading = state.generator.read(&question).await;
    {
        let mut info = state.bot_info.write().await;
        info.readings_served += 1;
        if reading.is_fallback() {
            info.fallback_readings += 1;
        }
    }

    let Some(publisher) = &state.publisher else {
        tracing::warn!("[Webhook] Neynar signer not configured, reading not published");
        return Ok(());
    };

    let reply_hash = publisher.publish_reply(&reading.text, &data.hash).await?;
    {
        let mut info = state.bot_info.write().await;
        info.replies_published += 1;
        info.last_reply_timestamp = Utc::now().timestamp();
    }
    tracing::info!("[Neynar] Reply published: {} (parent {})", reply_hash, data.hash);
    Ok(())
}

/// メンション（@で始まる語）を除去して質問文を取り出す
pub fn extract_question(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| !word.starts_with('@'))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(secret) = &state.webhook_secret else {
        return true;
    };
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .map(|provided| bool::from(provided.as_bytes().ct_eq(secret.as_bytes())))
        .unwrap_or(false)
}

fn acknowledged() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

fn invalid_data() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid webhook data" })),
    )
}
