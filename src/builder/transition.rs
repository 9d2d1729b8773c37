//! Builder for constructing single transitions.

use crate::builder::error::BuildError;
use crate::core::{Action, Event, State};
use crate::engine::Transition;

/// Builder for constructing transitions with a fluent API.
///
/// `from`, `on` and `to` are required; `action` is optional and a transition
/// without one simply changes state.
#[derive(Clone, Debug)]
pub struct TransitionBuilder<S: State, E: Event, A: Action> {
    from: Option<S>,
    on: Option<E>,
    action: Option<A>,
    to: Option<S>,
}

impl<S: State, E: Event, A: Action> TransitionBuilder<S, E, A> {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self {
            from: None,
            on: None,
            action: None,
            to: None,
        }
    }

    /// Set the source state (required).
    pub fn from(mut self, state: S) -> Self {
        self.from = Some(state);
        self
    }

    /// Set the triggering event (required).
    pub fn on(mut self, event: E) -> Self {
        self.on = Some(event);
        self
    }

    /// Set the action to dispatch (optional).
    pub fn action(mut self, action: A) -> Self {
        self.action = Some(action);
        self
    }

    /// Set the target state (required).
    pub fn to(mut self, state: S) -> Self {
        self.to = Some(state);
        self
    }

    /// Stay in the source state. Requires `.from()` first.
    pub fn stay(mut self) -> Self {
        self.to = self.from;
        self
    }

    /// Build the transition.
    pub fn build(self) -> Result<Transition<S, E, A>, BuildError> {
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let on = self.on.ok_or(BuildError::MissingEvent)?;
        let to = self.to.ok_or(BuildError::MissingToState)?;

        Ok(Transition {
            from,
            on,
            action: self.action,
            to,
        })
    }
}

impl<S: State, E: Event, A: Action> Default for TransitionBuilder<S, E, A> {
    fn default() -> Self {
        Self::new()
    }
}
