//! Symbol traits for state machine states, events and actions.
//!
//! Every symbol a transition table is keyed on is a member of a small closed
//! enumeration with a dense index, so tables can be plain vectors indexed by
//! `index()` instead of hash maps or bit-packed words.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

/// A member of a closed enumeration with a dense index.
///
/// # Required Traits
///
/// - `Copy`: symbols are small tags passed by value through the engine
/// - `Eq` + `Hash`: symbols are compared and used as keys by validation
/// - `Debug`: symbols are printed in diagnostics
/// - `Serialize` + `Deserialize`: symbols appear in exported history
///
/// Implementations are normally generated by [`state_enum!`](crate::state_enum),
/// [`event_enum!`](crate::event_enum) or [`action_enum!`](crate::action_enum).
pub trait Symbol:
    Copy + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Number of members in the enumeration.
    const COUNT: usize;

    /// Dense index of this member, in `0..COUNT`.
    fn index(&self) -> usize;

    /// Stable name for display/logging.
    fn name(&self) -> &'static str;
}

/// Trait for state machine states.
///
/// # Example
///
/// ```rust
/// use p2p_fsm::core::Symbol;
/// use p2p_fsm::state_enum;
///
/// state_enum! {
///     pub enum LampState {
///         Off,
///         On,
///     }
/// }
///
/// assert_eq!(LampState::On.name(), "On");
/// assert_eq!(LampState::On.index(), 1);
/// assert_eq!(LampState::COUNT, 2);
/// ```
pub trait State: Symbol {}

/// Trait for events fed into the engine.
///
/// The reserved "no further event" value is not a member: handlers return
/// `Option<E>` and `None` ends the run loop.
pub trait Event: Symbol {}

/// Trait for action identifiers bound to handlers.
pub trait Action: Symbol {}
