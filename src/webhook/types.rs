use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::neynar::ReplyPublisher;
use crate::reading::ReadingGenerator;

/// Webhookサーバーの状態
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<ReadingGenerator>,
    pub publisher: Option<Arc<dyn ReplyPublisher>>,
    pub bot_fid: String,
    pub webhook_secret: Option<Arc<str>>,
    pub start_time: Arc<Instant>,
    pub bot_info: Arc<RwLock<BotInfo>>,
}

impl AppState {
    pub fn new(
        generator: Arc<ReadingGenerator>,
        publisher: Option<Arc<dyn ReplyPublisher>>,
        bot_fid: impl Into<String>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            generator,
            publisher,
            bot_fid: bot_fid.into(),
            webhook_secret: webhook_secret.map(Arc::from),
            start_time: Arc::new(Instant::now()),
            bot_info: Arc::new(RwLock::new(BotInfo::default())),
        }
    }
}

/// Bot実行情報
#[derive(Debug, Clone, Default)]
pub struct BotInfo {
    pub readings_served: u64,
    pub replies_published: u64,
    pub fallback_readings: u64,
    pub last_reply_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStatus {
    pub online: bool,
    pub uptime_seconds: u64,
    pub readings_served: u64,
    pub replies_published: u64,
    pub fallback_readings: u64,
    pub last_reply_timestamp: i64,
    pub next_reading_in_seconds: u64,
}

/// Neynarから届くWebhookのボディ
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub data: Option<CastData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastData {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub author: Option<CastAuthor>,
    #[serde(default)]
    pub mentioned_profiles: Option<Vec<MentionedProfile>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastAuthor {
    #[serde(deserialize_with = "fid_as_string")]
    pub fid: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MentionedProfile {
    #[serde(deserialize_with = "fid_as_string")]
    pub fid: String,
}

impl CastData {
    pub fn mentions(&self, fid: &str) -> bool {
        self.mentioned_profiles
            .iter()
            .flatten()
            .any(|profile| profile.fid == fid)
    }
}

// fidは数値でも文字列でも受け付ける
#[derive(Deserialize)]
#[serde(untagged)]
enum FidValue {
    Number(u64),
    Text(String),
}

fn fid_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match FidValue::deserialize(deserializer)? {
        FidValue::Number(n) => n.to_string(),
        FidValue::Text(s) => s.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_fids_are_equivalent() {
        let data: CastData = serde_json::from_value(json!({
            "text": "@tairot hi",
            "hash": "0xabc",
            "author": { "fid": 7, "username": "seeker" },
            "mentioned_profiles": [{ "fid": 123 }, { "fid": "456" }]
        }))
        .unwrap();
        assert!(data.mentions("123"));
        assert!(data.mentions("456"));
        assert!(!data.mentions("7"));
        assert_eq!(data.author.unwrap().fid, "7");
    }

    #[test]
    fn missing_or_null_mentions_match_nothing() {
        let data: CastData = serde_json::from_value(json!({ "text": "hi", "hash": "0x1" })).unwrap();
        assert!(!data.mentions("123"));

        let data: CastData = serde_json::from_value(json!({
            "text": "hi", "hash": "0x1", "mentioned_profiles": null
        }))
        .unwrap();
        assert!(!data.mentions("123"));
    }

    #[test]
    fn body_fields_are_optional() {
        let body: WebhookBody = serde_json::from_value(json!({ "type": "cast.created" })).unwrap();
        assert_eq!(body.event_type.as_deref(), Some("cast.created"));
        assert!(body.data.is_none());
    }
}
