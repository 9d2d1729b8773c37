//! Build errors for transition and table builders.

use thiserror::Error;

/// Errors that can occur when building transitions and tables.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("No transitions defined. Add at least one transition")]
    NoTransitions,

    #[error("Transition source state not specified. Call .from(state)")]
    MissingFromState,

    #[error("Transition event not specified. Call .on(event)")]
    MissingEvent,

    #[error("Transition target state not specified. Call .to(state)")]
    MissingToState,

    #[error("Invalid transition table: {}", describe(.violations))]
    InvalidTable { violations: Vec<TableViolation> },
}

/// A single problem found while validating a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableViolation {
    #[error("duplicate transition for event '{event}' in state '{state}'")]
    DuplicateTransition {
        state: &'static str,
        event: &'static str,
    },

    #[error("{kind} '{name}' has index {index}, expected less than {count}")]
    IndexOutOfRange {
        kind: &'static str,
        name: &'static str,
        index: usize,
        count: usize,
    },
}

fn describe(violations: &[TableViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_table_lists_every_violation() {
        let err = BuildError::InvalidTable {
            violations: vec![
                TableViolation::DuplicateTransition {
                    state: "Idle",
                    event: "Find",
                },
                TableViolation::IndexOutOfRange {
                    kind: "event",
                    name: "Bogus",
                    index: 9,
                    count: 4,
                },
            ],
        };

        assert_eq!(
            err.to_string(),
            "Invalid transition table: duplicate transition for event 'Find' in state 'Idle'; \
             event 'Bogus' has index 9, expected less than 4"
        );
    }
}
