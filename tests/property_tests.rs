//! Property-based tests for the engine, the P2P table and history.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use chrono::Utc;
use p2p_fsm::core::{StateHistory, StateTransition, Symbol};
use p2p_fsm::engine::{run, Dispatch, EngineError};
use p2p_fsm::p2p::fsm::{build_table, P2pTable};
use p2p_fsm::p2p::{P2pAction, P2pEvent, P2pState};
use proptest::prelude::*;
use std::future::Future;

/// Dispatcher whose actions never produce a follow-up event.
struct Inert {
    calls: usize,
}

impl Dispatch<P2pAction, P2pEvent> for Inert {
    fn dispatch(&mut self, _: P2pAction) -> impl Future<Output = Option<P2pEvent>> + Send {
        self.calls += 1;
        async { None }
    }
}

fn arbitrary_state() -> impl Strategy<Value = P2pState> {
    (0..P2pState::COUNT).prop_map(|i| P2pState::ALL[i])
}

fn arbitrary_event() -> impl Strategy<Value = P2pEvent> {
    (0..P2pEvent::COUNT).prop_map(|i| P2pEvent::ALL[i])
}

fn table() -> P2pTable {
    build_table().unwrap()
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn history_of(states: &[P2pState], events: &[P2pEvent]) -> StateHistory<P2pState, P2pEvent> {
    let mut history = StateHistory::with_capacity(states.len().max(1));
    let mut from = P2pState::Stopped;
    for (to, event) in states.iter().zip(events.iter().cycle()) {
        history.push(StateTransition {
            from,
            event: *event,
            to: *to,
            timestamp: Utc::now(),
        });
        from = *to;
    }
    history
}

proptest! {
    #[test]
    fn at_most_one_transition_per_pair(state in arbitrary_state(), event in arbitrary_event()) {
        let table = table();
        let matching = table.iter().filter(|t| t.matches(state, event)).count();
        prop_assert!(matching <= 1);
        prop_assert_eq!(table.handles(state, event), matching == 1);
    }

    #[test]
    fn lookup_is_deterministic(state in arbitrary_state(), event in arbitrary_event()) {
        let first = table();
        let second = table();
        prop_assert_eq!(first.lookup(state, event), second.lookup(state, event));
    }

    #[test]
    fn unhandled_event_leaves_state_unchanged(state in arbitrary_state(), event in arbitrary_event()) {
        let table = table();
        prop_assume!(!table.handles(state, event));

        let mut current = state;
        let mut inert = Inert { calls: 0 };
        let result = block_on(run(&table, &mut current, event, &mut inert));

        match result {
            Err(EngineError::Unhandled { state: at, event: on, trace }) => {
                prop_assert_eq!(at, state);
                prop_assert_eq!(on, event);
                prop_assert!(trace.is_empty());
            }
            other => prop_assert!(false, "expected Unhandled, got {:?}", other),
        }
        prop_assert_eq!(current, state);
        prop_assert_eq!(inert.calls, 0);
    }

    #[test]
    fn handled_event_takes_exactly_its_transition(state in arbitrary_state(), event in arbitrary_event()) {
        let table = table();
        let Some(transition) = table.lookup(state, event).copied() else {
            return Ok(());
        };

        let mut current = state;
        let mut inert = Inert { calls: 0 };
        let trace = block_on(run(&table, &mut current, event, &mut inert)).unwrap();

        prop_assert_eq!(current, transition.to);
        prop_assert_eq!(trace.len(), 1);
        prop_assert_eq!(trace[0].action, transition.action);
        prop_assert_eq!(inert.calls, usize::from(transition.action.is_some()));
    }

    #[test]
    fn symbol_index_matches_position(state in arbitrary_state(), event in arbitrary_event()) {
        prop_assert_eq!(P2pState::ALL[state.index()], state);
        prop_assert_eq!(P2pEvent::ALL[event.index()], event);
        prop_assert_eq!(state.to_string(), state.name());
    }

    #[test]
    fn history_preserves_order(
        states in prop::collection::vec(arbitrary_state(), 1..10),
        events in prop::collection::vec(arbitrary_event(), 1..4)
    ) {
        let history = history_of(&states, &events);

        let mut expected = vec![P2pState::Stopped];
        expected.extend(states.iter().copied());
        let path: Vec<P2pState> = history.get_path().into_iter().copied().collect();
        prop_assert_eq!(path, expected);
        prop_assert_eq!(history.events().len(), states.len());
    }

    #[test]
    fn history_is_bounded(
        states in prop::collection::vec(arbitrary_state(), 1..40),
        capacity in 1usize..8
    ) {
        let mut history = StateHistory::with_capacity(capacity);
        for state in &states {
            history.push(StateTransition {
                from: P2pState::Idle,
                event: P2pEvent::Find,
                to: *state,
                timestamp: Utc::now(),
            });
        }

        prop_assert_eq!(history.len(), states.len().min(capacity));
        let last = history.transitions().last().map(|t| t.to);
        prop_assert_eq!(last, states.last().copied());
    }

    #[test]
    fn history_record_is_pure(state in arbitrary_state(), event in arbitrary_event()) {
        let history = StateHistory::new();
        let transition = StateTransition {
            from: P2pState::Idle,
            event,
            to: state,
            timestamp: Utc::now(),
        };

        let recorded = history.record(transition);

        // Recording leaves the source history untouched
        prop_assert!(history.is_empty());
        prop_assert_eq!(recorded.len(), 1);
    }

    #[test]
    fn history_roundtrip_serialization(
        states in prop::collection::vec(arbitrary_state(), 0..5),
        events in prop::collection::vec(arbitrary_event(), 1..3)
    ) {
        let history = history_of(&states, &events);

        let json = serde_json::to_string(&history).unwrap();
        let restored: StateHistory<P2pState, P2pEvent> = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(restored.len(), history.len());
        prop_assert_eq!(restored.events(), history.events());
    }
}
