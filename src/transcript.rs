//! Turns and the transcript they accumulate into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored in place of empty message content. Content is never absent.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "(empty message)";

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let content = if content.is_empty() {
            EMPTY_CONTENT_PLACEHOLDER.to_string()
        } else {
            content
        };
        Self {
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The `{ role, content }` record sent to the backend.
    pub fn to_wire(&self) -> WireTurn {
        WireTurn {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Turn as it appears in a request's `history` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTurn {
    pub role: Role,
    pub content: String,
}

/// Ordered, append-only list of turns for the selected agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends at the end. Never reorders, deduplicates or truncates.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Wire form of every turn currently stored.
    pub fn to_history(&self) -> Vec<WireTurn> {
        self.turns.iter().map(Turn::to_wire).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_becomes_placeholder() {
        let turn = Turn::assistant("");
        assert_eq!(turn.content(), EMPTY_CONTENT_PLACEHOLDER);
        assert_eq!(Turn::user(" ").content(), " ");
    }

    #[test]
    fn wire_form_uses_lowercase_roles() {
        let json = serde_json::to_value(Turn::user("hello").to_wire()).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn push_preserves_order_and_duplicates() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("a"));
        transcript.push(Turn::user("a"));
        transcript.push(Turn::assistant("b"));

        let contents: Vec<_> = transcript.turns().iter().map(Turn::content).collect();
        assert_eq!(contents, vec!["a", "a", "b"]);
        assert_eq!(transcript.last().map(Turn::role), Some(Role::Assistant));
    }
}
