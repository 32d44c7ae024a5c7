//! API request and response types

use crate::db::{Conversation, Message};
use crate::deal::{Participant, PostRef};
use crate::state_machine::DealStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to open a conversation with another user about a post
#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub post: PostRef,
    pub counterpart: Participant,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SendProposalRequest {
    pub amount: i64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectProposalRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateContractRequest {
    pub final_amount: i64,
}

/// Full conversation
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

/// Conversation list for the caller
#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// One row of the caller's inbox
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub post: PostRef,
    pub counterpart: Option<Participant>,
    pub status: DealStatus,
    /// True once closed; clients disable the composer
    pub read_only: bool,
    /// Contract amount, or the amount on the table, formatted in rupiah
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn for_viewer(conv: &Conversation, viewer_id: &str) -> Self {
        let display_amount = conv
            .state
            .contract()
            .map(|c| c.final_amount)
            .or_else(|| conv.state.current_proposal().map(|p| p.amount))
            .map(crate::deal::Amount::to_rupiah);

        Self {
            id: conv.id.clone(),
            post: conv.post.clone(),
            counterpart: conv.counterpart_of(viewer_id).cloned(),
            status: conv.status(),
            read_only: conv.state.is_terminal(),
            display_amount,
            last_message: conv.last_message().cloned(),
            updated_at: conv.updated_at,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, kind: &'static str) -> Self {
        Self {
            error: message.into(),
            kind,
        }
    }
}
