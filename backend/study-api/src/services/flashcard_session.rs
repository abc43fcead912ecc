use crate::error::{IntentError, ServiceError};
use crate::models::{
    ChatTurn, FlashCard, FlashCardDeck, FlashCardMode, FlashCardSnapshot, RequestToken,
    TokenCounter,
};
use crate::services::quiz_session::Completion;

const EMPTY_DECK_REPLY: &str =
    "Could not create flashcards. Please describe your request in more detail.";
const GENERATION_FAILED_REPLY: &str =
    "An error occurred while generating flashcards. Please try again.";

#[derive(Debug)]
enum FlashCardPhase {
    Requesting,
    Browsing(FlashCardDeck),
}

#[derive(Debug, Clone)]
pub struct FlashCardRequest {
    pub token: RequestToken,
    pub request_text: String,
    pub card_count: u32,
}

/// Flashcard session: a chat-style request box and, once a deck exists,
/// circular deck navigation.
#[derive(Debug)]
pub struct FlashCardSession {
    phase: FlashCardPhase,
    chat: Vec<ChatTurn>,
    draft: String,
    tokens: TokenCounter,
    in_flight: Option<RequestToken>,
    default_card_count: u32,
}

impl FlashCardSession {
    pub fn new(default_card_count: u32) -> Self {
        Self {
            phase: FlashCardPhase::Requesting,
            chat: Vec::new(),
            draft: String::new(),
            tokens: TokenCounter::default(),
            in_flight: None,
            default_card_count,
        }
    }

    pub fn mode(&self) -> FlashCardMode {
        match self.phase {
            FlashCardPhase::Requesting => FlashCardMode::Requesting,
            FlashCardPhase::Browsing(_) => FlashCardMode::Browsing,
        }
    }

    pub fn deck(&self) -> Option<&FlashCardDeck> {
        match &self.phase {
            FlashCardPhase::Browsing(deck) => Some(deck),
            FlashCardPhase::Requesting => None,
        }
    }

    pub fn chat(&self) -> &[ChatTurn] {
        &self.chat
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Starts a generation for `request_text`.
    ///
    /// Empty text is rejected. While a generation is in flight, or while a
    /// deck is being browsed, the call is a no-op and returns `Ok(None)`.
    pub fn begin_generation(
        &mut self,
        request_text: &str,
        card_count: Option<u32>,
    ) -> Result<Option<FlashCardRequest>, IntentError> {
        let request_text = request_text.trim();
        if request_text.is_empty() {
            return Err(IntentError::EmptyText);
        }
        if self.in_flight.is_some() || !matches!(self.phase, FlashCardPhase::Requesting) {
            return Ok(None);
        }

        self.chat.push(ChatTurn::user(request_text));
        let token = self.tokens.issue();
        self.in_flight = Some(token);

        Ok(Some(FlashCardRequest {
            token,
            request_text: request_text.to_string(),
            card_count: card_count.unwrap_or(self.default_card_count),
        }))
    }

    pub fn complete_generation(
        &mut self,
        token: RequestToken,
        result: Result<Vec<FlashCard>, ServiceError>,
    ) -> Completion {
        if self.in_flight != Some(token) {
            return Completion::Stale;
        }
        self.in_flight = None;
        self.draft.clear();

        match result {
            Ok(cards) => match FlashCardDeck::new(cards) {
                Some(deck) => {
                    tracing::info!("Flashcard deck ready with {} cards", deck.len());
                    self.phase = FlashCardPhase::Browsing(deck);
                    Completion::Applied
                }
                None => {
                    tracing::warn!("Flashcard generation returned an empty deck");
                    self.chat.push(ChatTurn::system(EMPTY_DECK_REPLY));
                    Completion::Degraded
                }
            },
            Err(ServiceError::Rejected(reason)) => {
                tracing::warn!("Flashcard generation rejected: {}", reason);
                self.chat.push(ChatTurn::system(reason));
                Completion::Degraded
            }
            Err(e) => {
                tracing::error!("Flashcard generation failed: {}", e);
                self.chat.push(ChatTurn::system(GENERATION_FAILED_REPLY));
                Completion::Degraded
            }
        }
    }

    pub fn flip(&mut self) -> bool {
        match &mut self.phase {
            FlashCardPhase::Browsing(deck) => {
                deck.flip();
                true
            }
            FlashCardPhase::Requesting => false,
        }
    }

    pub fn next(&mut self) -> bool {
        match &mut self.phase {
            FlashCardPhase::Browsing(deck) => {
                deck.next();
                true
            }
            FlashCardPhase::Requesting => false,
        }
    }

    pub fn previous(&mut self) -> bool {
        match &mut self.phase {
            FlashCardPhase::Browsing(deck) => {
                deck.previous();
                true
            }
            FlashCardPhase::Requesting => false,
        }
    }

    /// Drops the deck and the draft; chat history is kept. A generation
    /// still in flight becomes stale.
    pub fn back_to_requesting(&mut self) {
        self.phase = FlashCardPhase::Requesting;
        self.draft.clear();
        self.in_flight = None;
    }

    pub fn snapshot(&self) -> FlashCardSnapshot {
        let deck = self.deck();
        FlashCardSnapshot {
            mode: self.mode(),
            deck: deck.cloned(),
            position: deck.map(FlashCardDeck::position),
            chat: self.chat.clone(),
            draft: self.draft.clone(),
            generating: self.is_generating(),
        }
    }
}
