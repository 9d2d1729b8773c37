//! Sparse, state-indexed transition tables.

use crate::core::{Action, Event, State, Symbol};
use serde::{Deserialize, Serialize};

/// One row of a transition table: in `from`, `on` selects `action` and `to`.
///
/// An `action` of `None` means "change state and stop".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Transition<S: State, E: Event, A: Action> {
    pub from: S,
    pub on: E,
    pub action: Option<A>,
    pub to: S,
}

impl<S: State, E: Event, A: Action> Transition<S, E, A> {
    /// Check if this transition handles `event` in `current` (pure)
    pub fn matches(&self, current: S, event: E) -> bool {
        self.from == current && self.on == event
    }
}

/// Per-state lists of transitions, indexed by `State::index()`.
///
/// Tables are assembled and validated by
/// [`TableBuilder`](crate::builder::TableBuilder); a built table holds at most
/// one transition per `(state, event)` pair.
#[derive(Clone, Debug)]
pub struct TransitionTable<S: State, E: Event, A: Action> {
    rows: Vec<Vec<Transition<S, E, A>>>,
}

impl<S: State, E: Event, A: Action> TransitionTable<S, E, A> {
    pub(crate) fn from_transitions(transitions: Vec<Transition<S, E, A>>) -> Self {
        let mut rows = vec![Vec::new(); S::COUNT];
        for transition in transitions {
            rows[transition.from.index()].push(transition);
        }
        Self { rows }
    }

    /// Find the transition for `event` in `state`.
    pub fn lookup(&self, state: S, event: E) -> Option<&Transition<S, E, A>> {
        self.rows
            .get(state.index())
            .and_then(|row| row.iter().find(|t| t.matches(state, event)))
    }

    /// Whether `event` is handled in `state`.
    pub fn handles(&self, state: S, event: E) -> bool {
        self.lookup(state, event).is_some()
    }

    /// Transitions leaving `state`.
    pub fn row(&self, state: S) -> &[Transition<S, E, A>] {
        self.rows.get(state.index()).map_or(&[], Vec::as_slice)
    }

    /// All transitions, grouped by source state in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Transition<S, E, A>> {
        self.rows.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
