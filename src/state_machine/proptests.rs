//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::deal::{Contract, Participant, Proposal};
use chrono::{DateTime, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn alice() -> Participant {
    Participant::new("alice", "Alice", None)
}

fn bob() -> Participant {
    Participant::new("bob", "Bob", Some("https://example.com/bob.png".to_string()))
}

fn mallory() -> Participant {
    Participant::new("mallory", "Mallory", None)
}

fn test_context() -> ConvContext {
    ConvContext::new("test-conv", [alice(), bob()])
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
        DateTime::from_timestamp(secs, nanos).unwrap_or_default()
    })
}

fn arb_participant() -> impl Strategy<Value = Participant> {
    prop_oneof![Just(alice()), Just(bob())]
}

fn arb_actor() -> impl Strategy<Value = Participant> {
    prop_oneof![
        4 => arb_participant(),
        1 => Just(mallory()),
    ]
}

/// Mostly valid amounts, with some zero and negative ones mixed in
fn arb_amount() -> impl Strategy<Value = i64> {
    prop_oneof![
        4 => 1i64..100_000_000,
        1 => -1_000i64..=0,
    ]
}

fn arb_free_text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-zA-Z ]{0,30}")
}

fn arb_proposal() -> impl Strategy<Value = Proposal> {
    (arb_participant(), 1i64..100_000_000, arb_free_text(), arb_timestamp()).prop_map(
        |(author, amount, note, at)| {
            Proposal::draft(amount, note, &author, at).expect("generated proposal is valid")
        },
    )
}

fn arb_contract() -> impl Strategy<Value = Contract> {
    (arb_proposal(), 1i64..100_000_000, arb_timestamp()).prop_map(|(proposal, amount, at)| {
        Contract::form(&proposal, amount, ["alice", "bob"], at)
            .expect("generated contract is valid")
    })
}

fn arb_state() -> impl Strategy<Value = DealState> {
    prop_oneof![
        Just(DealState::Negotiating),
        arb_proposal().prop_map(|proposal| DealState::ProposalSent { proposal }),
        (arb_proposal(), arb_free_text()).prop_map(|(proposal, rejection_reason)| {
            DealState::ProposalRejected {
                proposal,
                rejection_reason,
            }
        }),
        arb_proposal().prop_map(|proposal| DealState::DealAgreed { proposal }),
        arb_contract().prop_map(|contract| DealState::WorkInProgress { contract }),
        arb_contract().prop_map(|contract| DealState::Completed { contract }),
        arb_contract().prop_map(|contract| DealState::Closed { contract }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        ("[a-z]{8}", "[a-zA-Z ]{0,20}", arb_timestamp()).prop_map(|(message_id, text, at)| {
            Event::PostMessage {
                message_id,
                text,
                at,
            }
        }),
        (arb_amount(), arb_free_text(), arb_timestamp())
            .prop_map(|(amount, note, at)| Event::SendProposal { amount, note, at }),
        Just(Event::ApproveProposal),
        arb_free_text().prop_map(|reason| Event::RejectProposal { reason }),
        (arb_amount(), arb_timestamp())
            .prop_map(|(final_amount, at)| Event::CreateContract { final_amount, at }),
        Just(Event::MarkComplete),
        Just(Event::CloseConversation),
    ]
}

// ============================================================================
// State Validity Checkers
// ============================================================================

/// Edges of the status table; staying put is only legal for chat messages
fn is_table_edge(from: DealStatus, to: DealStatus) -> bool {
    use DealStatus::{
        Closed, Completed, DealAgreed, Negotiating, ProposalRejected, ProposalSent,
        WorkInProgress,
    };
    matches!(
        (from, to),
        (Negotiating | ProposalRejected, ProposalSent)
            | (ProposalSent, DealAgreed | ProposalRejected)
            | (DealAgreed, WorkInProgress)
            | (WorkInProgress, Completed)
            | (Completed, Closed)
    )
}

fn is_valid_state(state: &DealState, ctx: &ConvContext) -> bool {
    if let Some(proposal) = state.current_proposal() {
        if !ctx.is_participant(&proposal.proposed_by) {
            return false;
        }
    }
    if let Some(contract) = state.contract() {
        if contract.participants.iter().any(|id| !ctx.is_participant(id)) {
            return false;
        }
    }
    true
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Invariant 1: Status only moves along table edges
    #[test]
    fn prop_transitions_follow_table(
        steps in proptest::collection::vec((arb_actor(), arb_event()), 0..40)
    ) {
        let mut state = DealState::Negotiating;
        let ctx = test_context();

        for (actor, event) in steps {
            let is_message = matches!(event, Event::PostMessage { .. });
            if let Ok(result) = transition(&state, &ctx, &actor, event) {
                let (from, to) = (state.status(), result.new_state.status());
                if from == to {
                    prop_assert!(is_message, "Status {} unchanged by a non-message event", from);
                } else {
                    prop_assert!(is_table_edge(from, to), "Illegal edge {} -> {}", from, to);
                }
                prop_assert!(
                    is_valid_state(&result.new_state, &ctx),
                    "Invalid state: {:?}",
                    result.new_state
                );
                state = result.new_state;
            }
        }
    }

    // Invariant 2: Work never starts without an agreed deal
    #[test]
    fn prop_work_requires_deal_agreed(
        steps in proptest::collection::vec((arb_participant(), arb_event()), 0..40)
    ) {
        let mut state = DealState::Negotiating;
        let ctx = test_context();

        for (actor, event) in steps {
            if let Ok(result) = transition(&state, &ctx, &actor, event) {
                if result.new_state.status() == DealStatus::WorkInProgress
                    && state.status() != DealStatus::WorkInProgress
                {
                    prop_assert_eq!(state.status(), DealStatus::DealAgreed);
                }
                state = result.new_state;
            }
        }
    }

    // Invariant 3: Authors never answer their own proposals
    #[test]
    fn prop_author_cannot_answer_own_proposal(
        state in arb_state(),
        reason in arb_free_text(),
        approve in any::<bool>()
    ) {
        if let Some(author_id) = state.current_proposal().map(|p| p.proposed_by.clone()) {
            let author = if author_id == "alice" { alice() } else { bob() };
            let event = if approve {
                Event::ApproveProposal
            } else {
                Event::RejectProposal { reason }
            };
            let result = transition(&state, &test_context(), &author, event);
            prop_assert!(
                matches!(result, Err(TransitionError::Permission(_))),
                "Expected Permission error, got {:?}",
                result
            );
        }
    }

    // Invariant 4: Contracts are only formed from an agreed deal
    #[test]
    fn prop_contract_requires_deal_agreed(
        state in arb_state(),
        actor in arb_participant(),
        final_amount in 1i64..100_000_000,
        at in arb_timestamp()
    ) {
        let result = transition(
            &state,
            &test_context(),
            &actor,
            Event::CreateContract { final_amount, at },
        );
        if state.status() == DealStatus::DealAgreed {
            let new_state = result.expect("contract from deal_agreed").new_state;
            let contract = new_state.contract().expect("contract present");
            prop_assert_eq!(contract.final_amount.get(), u64::try_from(final_amount).unwrap());
            prop_assert_eq!(contract.agreed_at, at);
        } else {
            prop_assert_eq!(
                result.unwrap_err(),
                TransitionError::InvalidState {
                    action: "create_contract",
                    status: state.status(),
                }
            );
        }
    }

    // Invariant 5: Closed conversations reject everything
    #[test]
    fn prop_closed_is_read_only(
        contract in arb_contract(),
        actor in arb_participant(),
        event in arb_event()
    ) {
        let state = DealState::Closed { contract };
        let is_message = matches!(event, Event::PostMessage { .. });
        let err = transition(&state, &test_context(), &actor, event).unwrap_err();
        if is_message {
            prop_assert_eq!(err, TransitionError::ConversationClosed);
        } else {
            prop_assert!(
                matches!(err, TransitionError::InvalidState { status: DealStatus::Closed, .. }),
                "Expected InvalidState, got {:?}",
                err
            );
        }
    }

    // Invariant 6: Outsiders are always refused
    #[test]
    fn prop_non_participant_refused(state in arb_state(), event in arb_event()) {
        let result = transition(&state, &test_context(), &mallory(), event);
        prop_assert!(
            matches!(result, Err(TransitionError::Permission(_))),
            "Expected Permission error, got {:?}",
            result
        );
    }

    // Invariant 7: PersistConversation effect always emitted on success
    #[test]
    fn prop_success_persists(
        state in arb_state(),
        actor in arb_participant(),
        event in arb_event()
    ) {
        if let Ok(result) = transition(&state, &test_context(), &actor, event) {
            prop_assert!(
                result.effects.iter().any(|e| matches!(e, Effect::PersistConversation)),
                "Accepted transition without PersistConversation: {:?} -> {:?}",
                state,
                result.new_state
            );
        }
    }

    // Invariant 8: Non-positive amounts never produce a proposal or contract
    #[test]
    fn prop_non_positive_amounts_rejected(amount in -1_000i64..=0, at in arb_timestamp()) {
        let ctx = test_context();
        let propose = transition(
            &DealState::Negotiating,
            &ctx,
            &alice(),
            Event::SendProposal { amount, note: None, at },
        );
        prop_assert!(matches!(propose, Err(TransitionError::Validation(_))));

        let agreed = DealState::DealAgreed {
            proposal: Proposal::draft(10, None, &alice(), at).unwrap(),
        };
        let contract = transition(
            &agreed,
            &ctx,
            &bob(),
            Event::CreateContract { final_amount: amount, at },
        );
        prop_assert!(matches!(contract, Err(TransitionError::Validation(_))));
    }

    // Invariant 9: State survives a serde round-trip unchanged
    #[test]
    fn prop_state_serde_roundtrip(state in arb_state()) {
        let json = serde_json::to_string(&state).unwrap();
        let parsed: DealState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, state);
    }
}

#[test]
fn test_status_tag_on_the_wire() {
    let json = serde_json::to_value(DealState::Negotiating).unwrap();
    assert_eq!(json, serde_json::json!({ "status": "negotiating" }));

    let proposal = Proposal::draft(500_000, None, &alice(), Utc::now()).unwrap();
    let json = serde_json::to_value(DealState::ProposalRejected {
        proposal,
        rejection_reason: Some("too low".to_string()),
    })
    .unwrap();
    assert_eq!(json["status"], "proposal_rejected");
    assert_eq!(json["rejection_reason"], "too low");
    assert_eq!(json["proposal"]["amount"], 500_000);
}
