use axum::{extract::State, response::Json};

use super::types::{AppState, BotStatus};

pub const ALIVE_MESSAGE: &str = "🔮 Tarot bot is alive";

pub async fn health_handler() -> &'static str {
    ALIVE_MESSAGE
}

/// 稼働状況の取得
pub async fn status_handler(State(state): State<AppState>) -> Json<BotStatus> {
    let next_slot = state.generator.next_slot_in().await;
    let info = state.bot_info.read().await;
    Json(BotStatus {
        online: true,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        readings_served: info.readings_served,
        replies_published: info.replies_published,
        fallback_readings: info.fallback_readings,
        last_reply_timestamp: info.last_reply_timestamp,
        next_reading_in_seconds: next_slot.as_secs(),
    })
}
