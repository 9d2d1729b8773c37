//! p2p-fsm: a table-driven state machine engine and a Wi-Fi Direct style
//! connection protocol built on it.
//!
//! The engine is a small Mealy machine: a transition table maps
//! `(state, event)` to an optional action and a next state, and an action may
//! return a follow-up event that the engine feeds straight back in. The P2P
//! driver instantiates it for discovery, provisioning, group-owner
//! negotiation, group formation and teardown against a supplicant that speaks
//! a textual control protocol.
//!
//! # Core Concepts
//!
//! - **Symbols**: closed enumerations of states, events and actions
//!   declared with [`state_enum!`], [`event_enum!`] and [`action_enum!`]
//! - **Tables**: assembled with [`TableBuilder`](builder::TableBuilder),
//!   which reports every violation at once
//! - **Engine**: [`run`](engine::run) and [`StateMachine`](engine::StateMachine)
//! - **History**: bounded, timestamped record of the steps taken
//!
//! # Example
//!
//! ```rust
//! use p2p_fsm::builder::TableBuilder;
//! use p2p_fsm::engine::{Dispatch, StateMachine};
//! use p2p_fsm::{action_enum, event_enum, state_enum};
//! use std::future::Future;
//! use std::sync::Arc;
//!
//! state_enum! { pub enum Door { Closed, Open } }
//! event_enum! { pub enum Push { Open, Close } }
//! action_enum! { pub enum Chime { Ding } }
//!
//! struct Bell(u32);
//!
//! impl Dispatch<Chime, Push> for Bell {
//!     fn dispatch(&mut self, _: Chime) -> impl Future<Output = Option<Push>> + Send {
//!         self.0 += 1;
//!         async { None }
//!     }
//! }
//!
//! let table = TableBuilder::new()
//!     .add(Door::Closed, Push::Open, Some(Chime::Ding), Door::Open)
//!     .add(Door::Open, Push::Close, None, Door::Closed)
//!     .build()
//!     .unwrap();
//!
//! let mut machine = StateMachine::new(Arc::new(table), Door::Closed);
//! let mut bell = Bell(0);
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! runtime.block_on(machine.fire(Push::Open, &mut bell)).unwrap();
//!
//! assert_eq!(machine.current_state(), Door::Open);
//! assert_eq!(bell.0, 1);
//! assert!(runtime.block_on(machine.fire(Push::Open, &mut bell)).is_err());
//! ```

pub mod builder;
pub mod core;
pub mod engine;
pub mod p2p;

// Re-export commonly used types
pub use crate::core::{Action, Event, State, StateHistory, StateTransition, Symbol};
pub use crate::engine::{run, Dispatch, EngineError, StateMachine, TransitionTable};
pub use crate::p2p::{Driver, DriverConfig, P2pEvent, P2pState, Status};
