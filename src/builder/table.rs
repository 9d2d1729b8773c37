//! Builder for constructing transition tables.

use crate::builder::error::BuildError;
use crate::builder::transition::TransitionBuilder;
use crate::builder::validate::validate_transitions;
use crate::core::{Action, Event, State};
use crate::engine::{Transition, TransitionTable};
use stillwater::validation::Validation;

/// Builder for constructing transition tables with a fluent API.
///
/// Transitions are collected as given and checked together in [`build`],
/// which reports every violation at once.
///
/// [`build`]: TableBuilder::build
#[derive(Clone, Debug)]
pub struct TableBuilder<S: State, E: Event, A: Action> {
    transitions: Vec<Transition<S, E, A>>,
}

impl<S: State, E: Event, A: Action> TableBuilder<S, E, A> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Add a transition using a builder.
    /// Returns an error if the builder fails validation.
    pub fn transition(mut self, builder: TransitionBuilder<S, E, A>) -> Result<Self, BuildError> {
        let transition = builder.build()?;
        self.transitions.push(transition);
        Ok(self)
    }

    /// Add a transition from its parts.
    pub fn add(mut self, from: S, on: E, action: Option<A>, to: S) -> Self {
        self.transitions.push(Transition {
            from,
            on,
            action,
            to,
        });
        self
    }

    /// Add a pre-built transition.
    pub fn add_transition(mut self, transition: Transition<S, E, A>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add multiple transitions at once.
    pub fn transitions(mut self, transitions: Vec<Transition<S, E, A>>) -> Self {
        self.transitions.extend(transitions);
        self
    }

    /// Route `on` from each of `states` to `to`.
    pub fn from_each(mut self, states: &[S], on: E, action: Option<A>, to: S) -> Self {
        for &from in states {
            self = self.add(from, on, action, to);
        }
        self
    }

    /// Handle `on` in each of `states` without leaving it.
    pub fn within_each(mut self, states: &[S], on: E, action: Option<A>) -> Self {
        for &state in states {
            self = self.add(state, on, action, state);
        }
        self
    }

    /// Build the table.
    /// Returns an error listing every violation if validation fails.
    pub fn build(self) -> Result<TransitionTable<S, E, A>, BuildError> {
        if self.transitions.is_empty() {
            return Err(BuildError::NoTransitions);
        }

        match validate_transitions(&self.transitions) {
            Validation::Success(_) => Ok(TransitionTable::from_transitions(self.transitions)),
            Validation::Failure(errors) => Err(BuildError::InvalidTable {
                violations: errors.iter().cloned().collect(),
            }),
        }
    }
}

impl<S: State, E: Event, A: Action> Default for TableBuilder<S, E, A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableViolation;
    use crate::{action_enum, event_enum, state_enum};

    state_enum! {
        enum TestState {
            Initial,
            Processing,
            Complete,
        }
    }

    event_enum! {
        enum TestEvent {
            Begin,
            Finish,
            Reset,
        }
    }

    action_enum! {
        enum TestAction {
            Work,
            Clear,
        }
    }

    type Builder = TableBuilder<TestState, TestEvent, TestAction>;

    #[test]
    fn builder_requires_transitions() {
        let result = Builder::new().build();
        assert!(matches!(result, Err(BuildError::NoTransitions)));
    }

    #[test]
    fn fluent_api_builds_table() {
        let table = Builder::new()
            .transition(
                TransitionBuilder::new()
                    .from(TestState::Initial)
                    .on(TestEvent::Begin)
                    .action(TestAction::Work)
                    .to(TestState::Processing),
            )
            .unwrap()
            .add(TestState::Processing, TestEvent::Finish, None, TestState::Complete)
            .build()
            .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.handles(TestState::Initial, TestEvent::Begin));
        assert!(table.handles(TestState::Processing, TestEvent::Finish));
    }

    #[test]
    fn transition_builder_errors_propagate() {
        let result = Builder::new().transition(TransitionBuilder::new().from(TestState::Initial));
        assert!(matches!(result, Err(BuildError::MissingEvent)));
    }

    #[test]
    fn state_groups_expand_to_rows() {
        let all = [TestState::Initial, TestState::Processing, TestState::Complete];
        let table = Builder::new()
            .from_each(&all, TestEvent::Reset, Some(TestAction::Clear), TestState::Initial)
            .within_each(&all[1..], TestEvent::Finish, None)
            .build()
            .unwrap();

        assert_eq!(table.len(), 5);
        let stay = table.lookup(TestState::Complete, TestEvent::Finish).unwrap();
        assert_eq!(stay.to, TestState::Complete);
    }

    #[test]
    fn build_reports_every_duplicate() {
        let result = Builder::new()
            .add(TestState::Initial, TestEvent::Begin, None, TestState::Processing)
            .add(TestState::Initial, TestEvent::Begin, None, TestState::Complete)
            .add(TestState::Complete, TestEvent::Reset, None, TestState::Initial)
            .add(TestState::Complete, TestEvent::Reset, None, TestState::Complete)
            .build();

        match result {
            Err(BuildError::InvalidTable { violations }) => {
                assert_eq!(
                    violations,
                    vec![
                        TableViolation::DuplicateTransition {
                            state: "Initial",
                            event: "Begin",
                        },
                        TableViolation::DuplicateTransition {
                            state: "Complete",
                            event: "Reset",
                        },
                    ]
                );
            }
            other => panic!("Expected InvalidTable, got {other:?}"),
        }
    }
}
