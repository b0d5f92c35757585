//! Chat transcript with a single-request-in-flight state machine.
//!
//! ```text
//!   Idle --begin_turn(text)--> AwaitingResponse --complete_turn(reply)--> Idle
//! ```
//!
//! A user message is appended as soon as a turn begins; the assistant message
//! is appended when the turn completes. Submissions while a turn is pending
//! are refused with [`ChatError::RequestInFlight`].

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::interpret::{InterpretationClient, FALLBACK_TEXT};
use crate::models::{ChatMessage, Role};

pub const GREETING: &str = "Hi! I'm Monggle's nightmare interpreter. What did you dream about? \
I'll help you find what is behind the anxiety.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("message text is empty")]
    EmptyInput,

    #[error("a reply is still pending")]
    RequestInFlight,

    #[error("turn {0} is not the pending turn")]
    StaleTurn(String),
}

/// Proof that a turn was started; consumed when its reply is appended.
#[derive(Debug)]
#[must_use = "a pending turn keeps the session busy until completed"]
pub struct PendingTurn {
    user_message_id: String,
    text: String,
}

impl PendingTurn {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn user_message_id(&self) -> &str {
        &self.user_message_id
    }
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    transcript: Vec<ChatMessage>,
    state: SessionState,
    pending: Option<String>,
    last_id: i64,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            transcript: Vec::new(),
            state: SessionState::Idle,
            pending: None,
            last_id: 0,
        }
    }

    /// Session opened with the assistant's greeting.
    pub fn with_greeting() -> Self {
        let mut session = Self::new();
        session.append(Role::Assistant, GREETING.to_string());
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == SessionState::AwaitingResponse
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Append the user's message and move to `AwaitingResponse`.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, ChatError> {
        if self.is_awaiting() {
            tracing::warn!("Chat submission refused while a reply is pending");
            return Err(ChatError::RequestInFlight);
        }
        if text.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let id = self.append(Role::User, text.to_string()).id.clone();
        self.state = SessionState::AwaitingResponse;
        self.pending = Some(id.clone());

        Ok(PendingTurn {
            user_message_id: id,
            text: text.to_string(),
        })
    }

    /// Append the assistant's reply for `turn` and return to `Idle`.
    pub fn complete_turn(&mut self, turn: PendingTurn, reply: String) -> Result<&ChatMessage, ChatError> {
        if self.pending.as_deref() != Some(turn.user_message_id.as_str()) {
            return Err(ChatError::StaleTurn(turn.user_message_id));
        }
        self.pending = None;
        self.state = SessionState::Idle;
        Ok(self.append(Role::Assistant, reply))
    }

    /// Run one full turn against `client`. Failures arrive as an ordinary
    /// assistant message carrying the fallback text.
    pub async fn submit(
        &mut self,
        client: &InterpretationClient,
        text: &str,
    ) -> Result<&ChatMessage, ChatError> {
        let turn = self.begin_turn(text)?;
        let reply = client
            .interpret(turn.text())
            .await
            .into_text()
            .unwrap_or_else(|| FALLBACK_TEXT.to_string());
        self.complete_turn(turn, reply)
    }

    fn append(&mut self, role: Role, text: String) -> &ChatMessage {
        let now = Utc::now();
        let id = now.timestamp_millis().max(self.last_id + 1);
        self.last_id = id;
        self.transcript.push(ChatMessage {
            id: id.to_string(),
            role,
            text,
            timestamp: now,
        });
        &self.transcript[self.transcript.len() - 1]
    }
}
