//! Monetary proposals

use super::{Amount, Participant, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest note or rejection reason accepted
pub const MAX_NOTE_CHARS: usize = 1000;

/// A formal offer made by one participant. Whether it is pending, approved
/// or rejected is carried by the deal state, not by the proposal itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub proposed_by: String,
    pub proposed_at: DateTime<Utc>,
}

impl Proposal {
    /// Build a proposal authored by `author`, validating amount and note
    pub fn draft(
        amount: i64,
        note: Option<String>,
        author: &Participant,
        proposed_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let amount = Amount::new(amount)?;
        let note = normalize_free_text(note, "note", MAX_NOTE_CHARS)?;
        Ok(Self {
            amount,
            note,
            proposed_by: author.id.clone(),
            proposed_at,
        })
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.proposed_by == user_id
    }
}

/// Trim optional free text; blank becomes `None`, over-long is rejected
pub fn normalize_free_text(
    text: Option<String>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    let Some(text) = text else {
        return Ok(None);
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TextTooLong { field, max });
    }
    Ok(Some(trimmed.to_string()))
}
