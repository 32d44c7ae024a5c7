//! Deal status state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions. This
//! is the only place that decides whether an operation on a conversation is
//! legal.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, DealState, DealStatus};
pub use transition::{transition, TransitionError};
