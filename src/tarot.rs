use rand::Rng;
use std::fmt;
use thiserror::Error;

/// 大アルカナ22枚（デッキ順）
pub const MAJOR_ARCANA: [&str; 22] = [
    "The Fool",
    "The Magician",
    "The High Priestess",
    "The Empress",
    "The Emperor",
    "The Hierophant",
    "The Lovers",
    "The Chariot",
    "Strength",
    "The Hermit",
    "Wheel of Fortune",
    "Justice",
    "The Hanged Man",
    "Death",
    "Temperance",
    "The Devil",
    "The Tower",
    "The Star",
    "The Moon",
    "The Sun",
    "Judgement",
    "The World",
];

pub const DEFAULT_DRAW_COUNT: usize = 3;

/// 3枚引きの位置の意味
const THREE_CARD_POSITIONS: [&str; 3] = ["influence", "challenge", "outcome"];

/// 質問が空のときに使う問い
pub const DEFAULT_QUESTION: &str = "What does the universe hold for me?";

pub const SYSTEM_PROMPT: &str = "You are a mystical tarot card reader. You should:
1. Interpret the drawn cards in relation to the question
2. Keep the response concise (under 280 characters)
3. Use mystical/fortune teller language
4. Include emojis for visual flair";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrawError {
    #[error("cannot draw {requested} cards from a deck of {available}")]
    InvalidCount { requested: usize, available: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card(&'static str);

impl Card {
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// 固定のデッキ。プロセス中は変更しない
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Default for Deck {
    fn default() -> Self {
        Self::major_arcana()
    }
}

impl Deck {
    pub fn major_arcana() -> Self {
        Self {
            cards: MAJOR_ARCANA.iter().copied().map(Card).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn contains(&self, card: &Card) -> bool {
        self.cards.contains(card)
    }

    pub fn draw(&self, count: usize) -> Result<Vec<Card>, DrawError> {
        self.draw_with(count, &mut rand::thread_rng())
    }

    /// 非復元抽出。戻り値は引いた順
    pub fn draw_with<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Card>, DrawError> {
        if count == 0 || count > self.cards.len() {
            return Err(DrawError::InvalidCount {
                requested: count,
                available: self.cards.len(),
            });
        }

        let mut available = self.cards.clone();
        let mut drawn = Vec::with_capacity(count);
        for _ in 0..count {
            let index = rng.gen_range(0..available.len());
            drawn.push(available.remove(index));
        }
        Ok(drawn)
    }
}

/// 位置ラベル（3枚引き以外は番号のみ）
pub fn position_label(index: usize, total: usize) -> String {
    if total == THREE_CARD_POSITIONS.len() {
        THREE_CARD_POSITIONS[index].to_string()
    } else {
        format!("card {}", index + 1)
    }
}

/// ユーザープロンプトを組み立てる
pub fn reading_prompt(question: &str, cards: &[Card]) -> String {
    let question = question.trim();
    let question = if question.is_empty() {
        DEFAULT_QUESTION
    } else {
        question
    };

    let spread: Vec<String> = cards
        .iter()
        .enumerate()
        .map(|(i, card)| format!("{}. {} ({})", i + 1, card, position_label(i, cards.len())))
        .collect();

    format!(
        "Question: {}\n\nCards drawn:\n{}\n\nInterpret these cards for the seeker in under 280 characters, with emojis.",
        question,
        spread.join("\n")
    )
}
