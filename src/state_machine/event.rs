//! Actions a participant can take on a conversation

use chrono::{DateTime, Utc};

/// Events that trigger state transitions. Timestamps and ids are supplied by
/// the caller so the transition function stays pure.
#[derive(Debug, Clone)]
pub enum Event {
    // Message log
    PostMessage {
        message_id: String,
        text: String,
        at: DateTime<Utc>,
    },

    // Proposal engine
    SendProposal {
        amount: i64,
        note: Option<String>,
        at: DateTime<Utc>,
    },
    ApproveProposal,
    RejectProposal {
        reason: Option<String>,
    },

    // Contract formation
    CreateContract {
        final_amount: i64,
        at: DateTime<Utc>,
    },

    // Work lifecycle
    MarkComplete,
    CloseConversation,
}

impl Event {
    /// Operation name as exposed to callers
    pub fn action(&self) -> &'static str {
        match self {
            Event::PostMessage { .. } => "add_message",
            Event::SendProposal { .. } => "send_proposal",
            Event::ApproveProposal => "approve_proposal",
            Event::RejectProposal { .. } => "reject_proposal",
            Event::CreateContract { .. } => "create_contract",
            Event::MarkComplete => "mark_complete",
            Event::CloseConversation => "close_conversation",
        }
    }
}
