use dotenv::dotenv;
use std::sync::Arc;
use tairot::config::{AppConfig, Secrets};
use tairot::gpt::OpenAiProvider;
use tairot::neynar::{NeynarClient, ReplyPublisher};
use tairot::reading::ReadingGenerator;
use tairot::webhook::{self, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;
    let secrets = Secrets::from_env()?;
    tracing::info!("[Init] Config loaded: {:?}", secrets);

    let provider = Arc::new(OpenAiProvider::new(secrets.openai_api_key.clone(), &config.gpt));
    let generator = ReadingGenerator::from_config(&config, provider)?;
    tracing::info!(
        "[Init] Model {}, {} cards per reading, {}s between completions",
        config.gpt.model,
        config.tarot.card_count,
        config.tarot.min_request_interval_secs
    );

    // 署名者がいなければ占いは生成するが投稿しない
    let publisher: Option<Arc<dyn ReplyPublisher>> = match secrets.neynar_credentials() {
        Some((api_key, signer_uuid)) => Some(Arc::new(NeynarClient::new(
            config.neynar.endpoint.clone(),
            api_key,
            signer_uuid,
        )) as Arc<dyn ReplyPublisher>),
        None => {
            tracing::error!("[Init] Missing NEYNAR_API_KEY or SIGNER_UUID, replies will not be published");
            None
        }
    };

    if secrets.webhook_secret.is_none() {
        tracing::warn!("[Init] WEBHOOK_SECRET not set, accepting unauthenticated webhooks");
    }

    tracing::info!("[Init] Listening for mentions of fid {}", secrets.bot_fid);

    let state = AppState::new(
        Arc::new(generator),
        publisher,
        secrets.bot_fid.clone(),
        secrets.webhook_secret.clone(),
    );

    webhook::start_server(config.server.port, state, config.server.cors).await
}
