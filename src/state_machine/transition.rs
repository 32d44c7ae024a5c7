//! Pure state transition function
//!
//! Every mutation of a conversation is first validated here. The function is
//! pure: given the same inputs it always produces the same outputs and does
//! no I/O. The store carries out the returned effects.

use super::{ConvContext, DealState, DealStatus, Effect, Event};
use crate::deal::{
    normalize_free_text, Contract, Participant, Proposal, ValidationError, MAX_NOTE_CHARS,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Longest chat message accepted
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DealState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DealState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Permission denied: {0}")]
    Permission(String),
    #[error("Cannot {action} while conversation is {status}")]
    InvalidState {
        action: &'static str,
        status: DealStatus,
    },
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Conversation is closed")]
    ConversationClosed,
}

/// Pure transition function
#[allow(clippy::too_many_lines)]
pub fn transition(
    state: &DealState,
    context: &ConvContext,
    actor: &Participant,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let Some(counterpart) = context.counterpart_of(&actor.id) else {
        return Err(TransitionError::Permission(format!(
            "{} is not a participant in conversation {}",
            actor.id, context.conversation_id
        )));
    };
    let recipient = counterpart.id.as_str();

    match (state, event) {
        // ============================================================
        // Message Log
        // ============================================================

        // Closed conversations are read-only
        (DealState::Closed { .. }, Event::PostMessage { .. }) => {
            Err(TransitionError::ConversationClosed)
        }

        // Any other status accepts messages, including while an offer is open
        (
            state,
            Event::PostMessage {
                message_id,
                text,
                at,
            },
        ) => {
            validate_message_text(&text)?;
            let preview = message_preview(&text);
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::append_message(message_id.clone(), text, at))
                .with_effect(Effect::PersistConversation)
                .with_effect(Effect::notify(
                    recipient,
                    "new_message",
                    json!({
                        "conversation_id": context.conversation_id,
                        "message_id": message_id,
                        "sender_name": actor.display_name,
                        "preview": preview,
                    }),
                )))
        }

        // ============================================================
        // Proposal Engine
        // ============================================================

        // Nobody answers their own proposal, whatever the status
        (state, Event::ApproveProposal | Event::RejectProposal { .. })
            if state
                .current_proposal()
                .is_some_and(|p| p.is_authored_by(&actor.id)) =>
        {
            Err(TransitionError::Permission(format!(
                "{} cannot answer their own proposal",
                actor.id
            )))
        }

        // Negotiating | ProposalRejected + SendProposal -> ProposalSent
        (
            DealState::Negotiating | DealState::ProposalRejected { .. },
            Event::SendProposal { amount, note, at },
        ) => {
            let proposal = Proposal::draft(amount, note, actor, at)?;
            let data = proposal_payload(context, &proposal);
            Ok(TransitionResult::new(DealState::ProposalSent { proposal })
                .with_effect(Effect::PersistConversation)
                .with_effect(Effect::notify(recipient, "proposal_received", data)))
        }

        // ProposalSent + ApproveProposal -> DealAgreed
        (DealState::ProposalSent { proposal }, Event::ApproveProposal) => {
            let data = proposal_payload(context, proposal);
            Ok(TransitionResult::new(DealState::DealAgreed {
                proposal: proposal.clone(),
            })
            .with_effect(Effect::PersistConversation)
            .with_effect(Effect::notify(recipient, "proposal_approved", data)))
        }

        // ProposalSent + RejectProposal -> ProposalRejected
        (DealState::ProposalSent { proposal }, Event::RejectProposal { reason }) => {
            let rejection_reason = normalize_free_text(reason, "reason", MAX_NOTE_CHARS)?;
            let mut data = proposal_payload(context, proposal);
            data["rejection_reason"] = json!(rejection_reason);
            Ok(TransitionResult::new(DealState::ProposalRejected {
                proposal: proposal.clone(),
                rejection_reason,
            })
            .with_effect(Effect::PersistConversation)
            .with_effect(Effect::notify(recipient, "proposal_rejected", data)))
        }

        // ============================================================
        // Contract Formation
        // ============================================================

        // DealAgreed + CreateContract -> WorkInProgress
        (DealState::DealAgreed { proposal }, Event::CreateContract { final_amount, at }) => {
            let contract = Contract::form(proposal, final_amount, context.participant_ids(), at)?;
            let data = json!({
                "conversation_id": context.conversation_id,
                "final_amount": contract.final_amount,
                "display_amount": contract.final_amount.to_rupiah(),
                "agreed_at": contract.agreed_at,
            });
            Ok(TransitionResult::new(DealState::WorkInProgress { contract })
                .with_effect(Effect::PersistConversation)
                .with_effect(Effect::notify(recipient, "contract_created", data)))
        }

        // ============================================================
        // Work Lifecycle
        // ============================================================

        // WorkInProgress + MarkComplete -> Completed
        (DealState::WorkInProgress { contract }, Event::MarkComplete) => {
            Ok(TransitionResult::new(DealState::Completed {
                contract: contract.clone(),
            })
            .with_effect(Effect::PersistConversation)
            .with_effect(Effect::notify(
                recipient,
                "work_completed",
                json!({ "conversation_id": context.conversation_id }),
            )))
        }

        // Completed + CloseConversation -> Closed
        (DealState::Completed { contract }, Event::CloseConversation) => {
            Ok(TransitionResult::new(DealState::Closed {
                contract: contract.clone(),
            })
            .with_effect(Effect::PersistConversation)
            .with_effect(Effect::notify(
                recipient,
                "conversation_closed",
                json!({ "conversation_id": context.conversation_id }),
            )))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidState {
            action: event.action(),
            status: state.status(),
        }),
    }
}

// Helper functions

fn validate_message_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText { field: "text" });
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TextTooLong {
            field: "text",
            max: MAX_MESSAGE_CHARS,
        });
    }
    Ok(())
}

fn message_preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 80;
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

fn proposal_payload(context: &ConvContext, proposal: &Proposal) -> Value {
    json!({
        "conversation_id": context.conversation_id,
        "amount": proposal.amount,
        "display_amount": proposal.amount.to_rupiah(),
        "note": proposal.note,
        "proposed_by": proposal.proposed_by,
    })
}
