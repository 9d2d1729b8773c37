//! Table validation using Validation.

use crate::builder::error::TableViolation;
use crate::core::{Action, Event, State, Symbol};
use crate::engine::Transition;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<TableViolation>>;

fn check_index<T: Symbol>(kind: &'static str, symbol: T) -> Check {
    if symbol.index() < T::COUNT {
        Validation::success(())
    } else {
        Validation::fail(TableViolation::IndexOutOfRange {
            kind,
            name: symbol.name(),
            index: symbol.index(),
            count: T::COUNT,
        })
    }
}

/// Validate a set of transitions, accumulating ALL violations.
///
/// Returns `Validation::Success(())` when every symbol index is in range and
/// no `(state, event)` pair appears twice.
pub fn validate_transitions<S, E, A>(transitions: &[Transition<S, E, A>]) -> Check
where
    S: State,
    E: Event,
    A: Action,
{
    let mut checks: Vec<Check> = Vec::new();
    let mut seen = HashSet::new();

    for transition in transitions {
        checks.push(check_index("state", transition.from));
        checks.push(check_index("state", transition.to));
        checks.push(check_index("event", transition.on));
        if let Some(action) = transition.action {
            checks.push(check_index("action", action));
        }

        let check = if seen.insert((transition.from, transition.on)) {
            Validation::success(())
        } else {
            Validation::fail(TableViolation::DuplicateTransition {
                state: transition.from.name(),
                event: transition.on.name(),
            })
        };
        checks.push(check);
    }

    if checks.is_empty() {
        return Validation::success(());
    }

    Validation::all_vec(checks).map(|_| ())
}
