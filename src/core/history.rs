//! State transition history tracking.
//!
//! Provides bounded, immutable tracking of the steps an engine run took,
//! for diagnostics and export.

use super::state::{Event, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of transitions kept by a history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 128;

/// Record of a single state transition.
///
/// # Example
///
/// ```rust
/// use p2p_fsm::core::StateTransition;
/// use p2p_fsm::p2p::{P2pEvent, P2pState};
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: P2pState::Idle,
///     event: P2pEvent::Find,
///     to: P2pState::Finding,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.to, P2pState::Finding);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State, E: Event> {
    /// The state being transitioned from
    pub from: S,
    /// The event that selected the transition
    pub event: E,
    /// The state being transitioned to
    pub to: S,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded history of state transitions.
///
/// History is immutable - the `record` method returns a new history
/// with the transition added. Once `capacity` transitions are held the
/// oldest one is dropped.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State, E: Event> {
    capacity: usize,
    transitions: VecDeque<StateTransition<S, E>>,
}

impl<S: State, E: Event> Default for StateHistory<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, E: Event> StateHistory<S, E> {
    /// Create a new empty history with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a new empty history holding at most `capacity` transitions.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            transitions: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// This does not mutate the existing history.
    pub fn record(&self, transition: StateTransition<S, E>) -> Self {
        let mut next = self.clone();
        next.push(transition);
        next
    }

    /// Record a transition in place.
    pub fn push(&mut self, transition: StateTransition<S, E>) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Get the path of states traversed.
    ///
    /// Returns the first retained `from` state followed by the `to` state of
    /// each transition.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.front() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Events in the order they were applied.
    pub fn events(&self) -> Vec<E> {
        self.transitions.iter().map(|t| t.event).collect()
    }

    /// Calculate total duration from first to last retained transition.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.front(), self.transitions.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Retained transitions, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition<S, E>> {
        self.transitions.iter()
    }

    /// Number of retained transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
