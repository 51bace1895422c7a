// The one piece of mutable provider state: the last token observed

use std::sync::Arc;

use parking_lot::Mutex;

use super::events::TokenEvent;

/// Latest-wins token cache. No history is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    current: Option<String>,
}

impl TokenState {
    pub fn new(current: Option<String>) -> Self {
        Self { current }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Record a token returned by an explicit fetch
    pub fn observe_fetch(&mut self, token: &str) {
        if self.current.as_deref() != Some(token) {
            self.current = Some(token.to_string());
        }
    }

    /// Record a token reported by a refresh callback. Returns the refresh event
    /// only when the value actually changed.
    pub fn observe_refresh(&mut self, token: &str) -> Option<TokenEvent> {
        if self.current.as_deref() == Some(token) {
            return None;
        }
        self.current = Some(token.to_string());
        Some(TokenEvent::now(token))
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Token state shared by the dispatcher and the background receiver
pub type SharedTokenState = Arc<Mutex<TokenState>>;
