//! Effects produced by state transitions

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Effects to be executed by the store after a transition is accepted
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a chat message from the acting participant
    AppendMessage {
        message_id: String,
        text: String,
        at: DateTime<Utc>,
    },

    /// Write the updated conversation record
    PersistConversation,

    /// Tell the other participant something happened
    NotifyParticipant {
        recipient: String,
        event_type: String,
        data: Value,
    },
}

impl Effect {
    pub fn append_message(message_id: String, text: String, at: DateTime<Utc>) -> Self {
        Effect::AppendMessage {
            message_id,
            text,
            at,
        }
    }

    pub fn notify(recipient: &str, event_type: &str, data: Value) -> Self {
        Effect::NotifyParticipant {
            recipient: recipient.to_string(),
            event_type: event_type.to_string(),
            data,
        }
    }
}
