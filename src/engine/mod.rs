//! Table-driven FSM engine.

mod machine;
mod table;

pub use machine::{run, Dispatch, EngineError, StateMachine, Step, Trace, MAX_CASCADE};
pub use table::{Transition, TransitionTable};
