//! The table interpreter.
//!
//! [`run`] is a Mealy-machine loop: a transition's action may return a
//! follow-up event, so one external event can cascade through several
//! internal state changes without the caller re-entering the engine.

use crate::core::{Action, Event, State, StateHistory, StateTransition, Symbol};
use crate::engine::table::TransitionTable;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Upper bound on steps taken for one external event.
pub const MAX_CASCADE: usize = 64;

/// Executes the handler bound to an action.
///
/// The returned event is fed back into the engine; `None` ends the run.
pub trait Dispatch<A: Action, E: Event> {
    fn dispatch(&mut self, action: A) -> impl Future<Output = Option<E>> + Send;
}

/// A single step taken by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Step<S: State, E: Event, A: Action> {
    pub from: S,
    pub event: E,
    pub action: Option<A>,
    pub to: S,
}

/// Steps taken by one call to [`run`], in order.
pub type Trace<S, E, A> = Vec<Step<S, E, A>>;

/// Errors returned by [`run`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError<S: State, E: Event, A: Action> {
    /// No transition for `event` in `state`. Steps already taken stay applied.
    #[error("event '{}' not handled in state '{}'", .event.name(), .state.name())]
    Unhandled {
        state: S,
        event: E,
        trace: Trace<S, E, A>,
    },

    #[error("event cascade exceeded {limit} steps")]
    CascadeLimit { limit: usize, trace: Trace<S, E, A> },
}

impl<S: State, E: Event, A: Action> EngineError<S, E, A> {
    /// Steps applied before the error.
    pub fn trace(&self) -> &Trace<S, E, A> {
        match self {
            Self::Unhandled { trace, .. } | Self::CascadeLimit { trace, .. } => trace,
        }
    }
}

/// Drive `table` from `state` with `event` until an action yields no event.
///
/// If the pending event is not handled in the current state the run stops
/// with [`EngineError::Unhandled`] and the state is left as it was before
/// that event.
pub async fn run<S, E, A, D>(
    table: &TransitionTable<S, E, A>,
    state: &mut S,
    event: E,
    dispatcher: &mut D,
) -> Result<Trace<S, E, A>, EngineError<S, E, A>>
where
    S: State,
    E: Event,
    A: Action,
    D: Dispatch<A, E>,
{
    let mut trace = Vec::new();
    let mut pending = Some(event);

    while let Some(event) = pending {
        if trace.len() >= MAX_CASCADE {
            return Err(EngineError::CascadeLimit {
                limit: MAX_CASCADE,
                trace,
            });
        }

        let Some(transition) = table.lookup(*state, event) else {
            return Err(EngineError::Unhandled {
                state: *state,
                event,
                trace,
            });
        };

        let from = *state;
        *state = transition.to;
        trace.push(Step {
            from,
            event,
            action: transition.action,
            to: transition.to,
        });
        tracing::debug!(
            "state change [{} => {}] via event {}",
            from.name(),
            transition.to.name(),
            event.name()
        );

        pending = match transition.action {
            Some(action) => dispatcher.dispatch(action).await,
            None => None,
        };
    }

    Ok(trace)
}

/// A table, its current state, and the history of steps taken.
pub struct StateMachine<S: State, E: Event, A: Action> {
    table: Arc<TransitionTable<S, E, A>>,
    current: S,
    history: StateHistory<S, E>,
}

impl<S: State, E: Event, A: Action> StateMachine<S, E, A> {
    /// Create a machine in the initial state
    pub fn new(table: Arc<TransitionTable<S, E, A>>, initial: S) -> Self {
        Self::with_history(table, initial, StateHistory::new())
    }

    pub fn with_history(
        table: Arc<TransitionTable<S, E, A>>,
        initial: S,
        history: StateHistory<S, E>,
    ) -> Self {
        Self {
            table,
            current: initial,
            history,
        }
    }

    /// Get current state (pure)
    pub fn current_state(&self) -> S {
        self.current
    }

    /// Get state history (pure)
    pub fn history(&self) -> &StateHistory<S, E> {
        &self.history
    }

    pub fn table(&self) -> &TransitionTable<S, E, A> {
        &self.table
    }

    /// Feed `event` and record every step taken, including the steps that
    /// preceded an error.
    pub async fn fire<D>(
        &mut self,
        event: E,
        dispatcher: &mut D,
    ) -> Result<Trace<S, E, A>, EngineError<S, E, A>>
    where
        D: Dispatch<A, E>,
    {
        let result = run(&self.table, &mut self.current, event, dispatcher).await;
        let trace = match &result {
            Ok(trace) => trace,
            Err(err) => err.trace(),
        };
        let now = Utc::now();
        for step in trace {
            self.history.push(StateTransition {
                from: step.from,
                event: step.event,
                to: step.to,
                timestamp: now,
            });
        }
        result
    }
}
