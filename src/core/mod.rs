//! Core symbol types and history.
//!
//! This module contains the vocabulary the engine is generic over:
//! - States, events and actions via the `Symbol` family of traits
//! - Bounded, timestamped history of applied transitions

mod history;
mod state;

pub use history::{StateHistory, StateTransition, DEFAULT_HISTORY_CAPACITY};
pub use state::{Action, Event, State, Symbol};
