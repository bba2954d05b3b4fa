use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::gpt::{CompletionError, CompletionProvider, CompletionRequest, FailureKind};
use crate::rate_limit::{Permit, RateLimiter};
use crate::tarot::{self, Card, Deck, DrawError, DEFAULT_DRAW_COUNT};

pub const QUOTA_FALLBACK: &str =
    "🔮 The cosmic energies are spent for now... The cards must rest before they speak again. ✨";
pub const RATE_LIMIT_FALLBACK: &str =
    "🔮 Too many seekers crowd around the crystal ball... Return in a moment and the cards will speak. 🌙";
pub const UNCLEAR_FALLBACK: &str =
    "🔮 The spirits are unclear at this time... Please try again later.";
/// 応答が空だったとき
pub const SILENT_SPIRITS: &str = "🔮 The spirits are unclear at this time...";

pub fn fallback_for(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::QuotaExceeded => QUOTA_FALLBACK,
        FailureKind::RateLimited => RATE_LIMIT_FALLBACK,
        FailureKind::Unknown => UNCLEAR_FALLBACK,
    }
}

#[derive(Debug, Clone)]
pub struct ReadingOptions {
    pub model: String,
    pub max_tokens: i64,
    pub temperature: f64,
    pub card_count: usize,
}

impl Default for ReadingOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            max_tokens: 150,
            temperature: 0.8,
            card_count: DEFAULT_DRAW_COUNT,
        }
    }
}

impl From<&AppConfig> for ReadingOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.gpt.model.clone(),
            max_tokens: config.gpt.max_tokens,
            temperature: config.gpt.temperature,
            card_count: config.tarot.card_count,
        }
    }
}

/// 占い結果。fallbackを使った場合はその原因も持つ
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub text: String,
    pub cards: Vec<Card>,
    pub failure: Option<FailureKind>,
}

impl Reading {
    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

pub struct ReadingGenerator {
    deck: Deck,
    limiter: RateLimiter,
    provider: Arc<dyn CompletionProvider>,
    options: ReadingOptions,
}

impl ReadingGenerator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        limiter: RateLimiter,
        options: ReadingOptions,
    ) -> Result<Self, DrawError> {
        let deck = Deck::major_arcana();
        if options.card_count == 0 || options.card_count > deck.len() {
            return Err(DrawError::InvalidCount {
                requested: options.card_count,
                available: deck.len(),
            });
        }
        Ok(Self {
            deck,
            limiter,
            provider,
            options,
        })
    }

    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, DrawError> {
        let limiter = RateLimiter::new(Duration::from_secs(config.tarot.min_request_interval_secs));
        Self::new(provider, limiter, ReadingOptions::from(config))
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn draw(&self) -> Result<Vec<Card>, DrawError> {
        self.deck.draw(self.options.card_count)
    }

    /// 次の補完呼び出しまでの待ち時間（枠は消費しない）
    pub async fn next_slot_in(&self) -> Duration {
        let now = Instant::now();
        match self.limiter.check(now).await {
            Permit::Proceed => Duration::ZERO,
            Permit::WaitUntil(at) => at - now,
        }
    }

    /// 質問から返信文を得る。失敗時もfallback文を返す
    pub async fn get_reading(&self, question: &str) -> String {
        self.read(question).await.text
    }

    pub async fn read(&self, question: &str) -> Reading {
        let waited = self.limiter.acquire().await;
        if !waited.is_zero() {
            tracing::info!("[Tarot] Rate limited, waited {:?}", waited);
        }

        let cards = match self.draw() {
            Ok(cards) => cards,
            Err(e) => {
                tracing::error!("[Tarot] Failed to draw cards: {}", e);
                return Reading {
                    text: UNCLEAR_FALLBACK.to_string(),
                    cards: Vec::new(),
                    failure: Some(FailureKind::Unknown),
                };
            }
        };
        let names: Vec<&str> = cards.iter().map(Card::name).collect();
        tracing::info!("[Tarot] Cards drawn: {}", names.join(", "));

        let request = CompletionRequest {
            model: self.options.model.clone(),
            system: tarot::SYSTEM_PROMPT.to_string(),
            user: tarot::reading_prompt(question, &cards),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };

        match self.provider.complete(&request).await {
            Ok(text) => Reading {
                text,
                cards,
                failure: None,
            },
            Err(CompletionError::Empty) => {
                tracing::warn!("[Tarot] Completion returned no content");
                Reading {
                    text: SILENT_SPIRITS.to_string(),
                    cards,
                    failure: Some(FailureKind::Unknown),
                }
            }
            Err(e) => {
                tracing::error!("[Tarot] Error getting tarot reading: {}", e);
                let kind = e.kind();
                Reading {
                    text: fallback_for(kind).to_string(),
                    cards,
                    failure: Some(kind),
                }
            }
        }
    }
}
