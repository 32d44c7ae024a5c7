//! Database schema and record types

use crate::deal::{Participant, PostRef, ValidationError};
use crate::state_machine::{ConvContext, DealState, DealStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization.
///
/// Conversations live in a namespaced key-value table, one JSON document per
/// conversation id, so every mutation is a single point-write.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS kv_entries (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
);

CREATE INDEX IF NOT EXISTS idx_kv_entries_updated ON kv_entries(namespace, updated_at DESC);
";

/// A stored key-value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Conversation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: [Participant; 2],
    pub post: PostRef,
    pub state: DealState,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Open a new thread about `post` between two distinct participants
    pub fn start(
        id: impl Into<String>,
        post: PostRef,
        initiator: Participant,
        counterpart: Participant,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if initiator.id.trim().is_empty() || counterpart.id.trim().is_empty() {
            return Err(ValidationError::InvalidConversation(
                "participant ids must not be empty".to_string(),
            ));
        }
        if initiator.id == counterpart.id {
            return Err(ValidationError::InvalidConversation(
                "a conversation needs two different participants".to_string(),
            ));
        }
        if post.title.trim().is_empty() {
            return Err(ValidationError::EmptyText {
                field: "post title",
            });
        }

        Ok(Self {
            id: id.into(),
            participants: [initiator, counterpart],
            post,
            state: DealState::Negotiating,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> DealStatus {
        self.state.status()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }

    pub fn counterpart_of(&self, user_id: &str) -> Option<&Participant> {
        if !self.is_participant(user_id) {
            return None;
        }
        self.participants.iter().find(|p| p.id != user_id)
    }

    /// Guard context for the state machine
    pub fn context(&self) -> ConvContext {
        ConvContext::new(&self.id, self.participants.clone())
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn next_sequence_id(&self) -> i64 {
        self.messages.last().map_or(1, |m| m.sequence_id + 1)
    }
}

/// Who wrote a message, denormalized at send time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSender {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<&Participant> for MessageSender {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id.clone(),
            name: p.display_name.clone(),
            avatar: p.avatar.clone(),
        }
    }
}

/// Chat message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub conversation_id: String,
    pub sequence_id: i64,
    pub sender: MessageSender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
