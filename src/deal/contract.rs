//! Contract formation

use super::{Amount, Proposal, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binding record of an agreed deal. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub final_amount: Amount,
    /// Amount of the proposal that was approved; the final amount may differ
    pub proposed_amount: Amount,
    pub agreed_at: DateTime<Utc>,
    pub participants: [String; 2],
}

impl Contract {
    /// Form a contract from the approved proposal
    pub fn form(
        agreed: &Proposal,
        final_amount: i64,
        participants: [&str; 2],
        agreed_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            final_amount: Amount::new(final_amount)?,
            proposed_amount: agreed.amount,
            agreed_at,
            participants: participants.map(str::to_string),
        })
    }

    pub fn binds(&self, user_id: &str) -> bool {
        self.participants.iter().any(|id| id == user_id)
    }
}
