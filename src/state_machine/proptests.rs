//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible event sequences.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_actor() -> impl Strategy<Value = String> {
    prop_oneof![Just("alice"), Just("bob"), Just("carol")].prop_map(String::from)
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Request),
        Just(Action::Accept),
        Just(Action::Decline),
        Just(Action::MarkReceived),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    (arb_action(), arb_actor(), proptest::option::of(arb_actor()))
        .prop_map(|(action, actor, counterparty)| Event::new(action, actor, counterparty))
}

fn arb_status() -> impl Strategy<Value = ExchangeStatus> {
    proptest::sample::select(ExchangeStatus::ALL.to_vec())
}

/// Apply a run of events the way the engine would, returning every accepted step
fn replay(events: Vec<Event>) -> Vec<(ExchangeStatus, Event, TransitionResult)> {
    let mut status = ExchangeStatus::Pending;
    let mut participants = Participants::default();
    let mut accepted = vec![];

    for event in events {
        if let Ok(result) = transition(status, &participants, event.clone()) {
            for effect in &result.effects {
                if let Effect::FixParticipants {
                    initiator_id,
                    counterparty_id,
                } = effect
                {
                    participants =
                        Participants::new(Some(initiator_id.clone()), Some(counterparty_id.clone()));
                }
            }
            let from = status;
            status = result.new_status;
            accepted.push((from, event, result));
        }
    }
    accepted
}

proptest! {
    #[test]
    fn prop_accepted_transitions_land_on_action_target(events in proptest::collection::vec(arb_event(), 0..30)) {
        for (_, event, result) in replay(events) {
            prop_assert_eq!(result.new_status, event.action().target());
            prop_assert!(result.narration().is_some());
        }
    }

    #[test]
    fn prop_at_most_one_step_per_status(events in proptest::collection::vec(arb_event(), 0..30)) {
        let accepted = replay(events);
        prop_assert!(accepted.len() <= 3);
        let mut seen = std::collections::HashSet::new();
        for (from, _, _) in &accepted {
            prop_assert!(seen.insert(*from), "left {} twice", from);
        }
    }

    #[test]
    fn prop_item_marked_unavailable_at_most_once(events in proptest::collection::vec(arb_event(), 0..30)) {
        let marks = replay(events)
            .iter()
            .filter(|(_, _, r)| r.marks_item_unavailable())
            .count();
        prop_assert!(marks <= 1);
    }

    #[test]
    fn prop_completion_only_by_initiator(events in proptest::collection::vec(arb_event(), 0..30)) {
        let accepted = replay(events);
        let initiator = accepted
            .first()
            .map(|(_, e, _)| e.actor_id().to_string());
        for (from, event, result) in &accepted {
            if result.new_status == ExchangeStatus::Completed {
                prop_assert_eq!(*from, ExchangeStatus::Agreed);
                prop_assert_eq!(Some(event.actor_id().to_string()), initiator.clone());
            }
        }
    }

    #[test]
    fn prop_terminal_is_absorbing(status in arb_status(), event in arb_event()) {
        let participants = Participants::new(Some("alice".into()), Some("bob".into()));
        if status.is_terminal() {
            prop_assert!(transition(status, &participants, event).is_err());
        }
    }

    #[test]
    fn prop_pending_is_never_entered(status in arb_status(), event in arb_event()) {
        let participants = Participants::new(Some("alice".into()), Some("bob".into()));
        if let Ok(result) = transition(status, &participants, event) {
            prop_assert_ne!(result.new_status, ExchangeStatus::Pending);
        }
    }
}
