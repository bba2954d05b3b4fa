mod cast;
mod status;
mod types;

pub use cast::{extract_question, CAST_CREATED, SECRET_HEADER};
pub use status::ALIVE_MESSAGE;
pub use types::{AppState, BotInfo, BotStatus, CastData, MentionedProfile, WebhookBody};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

/// ルーターを組み立てる（サーバー起動とテストで共用）
pub fn router(state: AppState, cors: bool) -> Router {
    let app = Router::new()
        .route("/", get(status::health_handler))
        .route("/api/status", get(status::status_handler))
        .route("/webhook", post(cast::webhook_handler))
        .with_state(state);

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Webhookサーバーを起動
pub async fn start_server(
    port: u16,
    state: AppState,
    cors: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state, cors);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("🔮 Tarot bot server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
