//! Deal state types

use crate::deal::{Contract, Participant, Proposal};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Deal State
// ============================================================================

/// Where a conversation stands in the negotiation-to-contract lifecycle.
///
/// Each variant carries only the fields valid for that status: a proposal
/// exists only while it is pending, rejected or agreed, and a contract only
/// once work has started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DealState {
    /// Parties are chatting, no formal offer yet
    #[default]
    Negotiating,

    /// A proposal awaits the other participant's answer
    ProposalSent { proposal: Proposal },

    /// The last proposal was turned down; either side may propose again
    ProposalRejected {
        proposal: Proposal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rejection_reason: Option<String>,
    },

    /// Proposal approved, waiting for the contract to be drawn up
    DealAgreed { proposal: Proposal },

    /// Contract signed, work under way
    WorkInProgress { contract: Contract },

    /// Work delivered
    Completed { contract: Contract },

    /// Archived; the conversation is read-only
    Closed { contract: Contract },
}

impl DealState {
    pub fn status(&self) -> DealStatus {
        match self {
            DealState::Negotiating => DealStatus::Negotiating,
            DealState::ProposalSent { .. } => DealStatus::ProposalSent,
            DealState::ProposalRejected { .. } => DealStatus::ProposalRejected,
            DealState::DealAgreed { .. } => DealStatus::DealAgreed,
            DealState::WorkInProgress { .. } => DealStatus::WorkInProgress,
            DealState::Completed { .. } => DealStatus::Completed,
            DealState::Closed { .. } => DealStatus::Closed,
        }
    }

    /// The proposal carried by this state, if any
    pub fn current_proposal(&self) -> Option<&Proposal> {
        match self {
            DealState::ProposalSent { proposal }
            | DealState::ProposalRejected { proposal, .. }
            | DealState::DealAgreed { proposal } => Some(proposal),
            _ => None,
        }
    }

    /// The contract carried by this state, if any
    pub fn contract(&self) -> Option<&Contract> {
        match self {
            DealState::WorkInProgress { contract }
            | DealState::Completed { contract }
            | DealState::Closed { contract } => Some(contract),
            _ => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            DealState::ProposalRejected {
                rejection_reason, ..
            } => rejection_reason.as_deref(),
            _ => None,
        }
    }

    /// Closed conversations accept no further changes
    pub fn is_terminal(&self) -> bool {
        matches!(self, DealState::Closed { .. })
    }
}

/// Status discriminant of a [`DealState`], used for display, filtering and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Negotiating,
    ProposalSent,
    ProposalRejected,
    DealAgreed,
    WorkInProgress,
    Completed,
    Closed,
}

impl DealStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DealStatus::Negotiating => "negotiating",
            DealStatus::ProposalSent => "proposal_sent",
            DealStatus::ProposalRejected => "proposal_rejected",
            DealStatus::DealAgreed => "deal_agreed",
            DealStatus::WorkInProgress => "work_in_progress",
            DealStatus::Completed => "completed",
            DealStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Conversation Context
// ============================================================================

/// Immutable facts about a conversation that guards need
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: String,
    pub participants: [Participant; 2],
}

impl ConvContext {
    pub fn new(conversation_id: impl Into<String>, participants: [Participant; 2]) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            participants,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }

    /// The participant who is not `user_id`
    pub fn counterpart_of(&self, user_id: &str) -> Option<&Participant> {
        if !self.is_participant(user_id) {
            return None;
        }
        self.participants.iter().find(|p| p.id != user_id)
    }

    pub fn participant_ids(&self) -> [&str; 2] {
        [
            self.participants[0].id.as_str(),
            self.participants[1].id.as_str(),
        ]
    }
}
