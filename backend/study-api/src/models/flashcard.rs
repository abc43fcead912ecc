use serde::{Deserialize, Serialize};

use super::ChatTurn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashCard {
    pub front: String,
    pub back: String,
}

/// A generated deck being browsed. Never empty; navigation wraps around.
/// Only [`FlashCardDeck::new`] builds one, so it is serialize-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashCardDeck {
    cards: Vec<FlashCard>,
    current_index: usize,
    is_flipped: bool,
}

impl FlashCardDeck {
    /// Returns `None` for an empty card list.
    pub fn new(cards: Vec<FlashCard>) -> Option<Self> {
        if cards.is_empty() {
            return None;
        }
        Some(Self {
            cards,
            current_index: 0,
            is_flipped: false,
        })
    }

    pub fn cards(&self) -> &[FlashCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_flipped(&self) -> bool {
        self.is_flipped
    }

    pub fn flip(&mut self) {
        self.is_flipped = !self.is_flipped;
    }

    pub fn next(&mut self) {
        self.current_index = (self.current_index + 1) % self.cards.len();
        self.is_flipped = false;
    }

    pub fn previous(&mut self) {
        let len = self.cards.len();
        self.current_index = (self.current_index + len - 1) % len;
        self.is_flipped = false;
    }

    /// "3 / 10" style position label.
    pub fn position(&self) -> String {
        format!("{} / {}", self.current_index + 1, self.cards.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCardMode {
    Requesting,
    Browsing,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashCardSnapshot {
    pub mode: FlashCardMode,
    pub deck: Option<FlashCardDeck>,
    pub position: Option<String>,
    pub chat: Vec<ChatTurn>,
    pub draft: String,
    pub generating: bool,
}
