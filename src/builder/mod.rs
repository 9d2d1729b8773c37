//! Builder API for transition tables.
//!
//! This module provides fluent builders and macros for declaring symbols and
//! assembling validated tables with minimal boilerplate.

pub mod error;
pub mod macros;
pub mod table;
pub mod transition;
pub mod validate;

pub use error::{BuildError, TableViolation};
pub use table::TableBuilder;
pub use transition::TransitionBuilder;
pub use validate::validate_transitions;
