//! Strictly positive money amounts

use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;

/// Whole currency units (rupiah). Zero cannot be represented, and
/// deserializing a zero amount fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(NonZeroU64);

impl Amount {
    /// Validate a caller-supplied amount
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        u64::try_from(value)
            .ok()
            .and_then(NonZeroU64::new)
            .map(Self)
            .ok_or(ValidationError::NonPositiveAmount(value))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Format for display the way the client shows prices, e.g. `Rp 1.500.000`
    pub fn to_rupiah(self) -> String {
        format!("Rp {}", group_thousands(self.get()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}
