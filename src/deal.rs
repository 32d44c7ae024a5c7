//! Deal domain types
//!
//! Participants, monetary amounts, proposals and contracts. These are the
//! building blocks the state machine moves between states; none of them do I/O.

mod amount;
mod contract;
mod proposal;

pub use amount::Amount;
pub use contract::Contract;
pub use proposal::{normalize_free_text, Proposal, MAX_NOTE_CHARS};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a conversation participant as supplied by the session provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Participant {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        avatar: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar,
        }
    }
}

/// The job post a conversation negotiates over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub id: String,
    pub title: String,
}

/// Input that fails a deal guard
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Amount must be a positive whole number, got {0}")]
    NonPositiveAmount(i64),
    #[error("{field} must not be empty")]
    EmptyText { field: &'static str },
    #[error("{field} exceeds {max} characters")]
    TextTooLong { field: &'static str, max: usize },
    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),
}
