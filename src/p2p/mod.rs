//! Wi-Fi Direct style connection protocol driven by the table engine.
//!
//! - [`fsm`]: states, events, actions and the transition table
//! - [`notification`] and [`command`]: the supplicant's text protocol
//! - [`Driver`]: the lock, the protocol instance and the public operations

pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod fsm;
pub mod handlers;
pub mod notification;
pub mod rendezvous;
pub mod session;
pub mod types;

pub use command::{Command, ConnectFlags, ControlChannel};
pub use config::{DriverConfig, DriverConfigBuilder, OutgoingConfig};
pub use driver::Driver;
pub use error::{ConfigError, ControlError, DriverError, ParseError, RendezvousError};
pub use fsm::{P2pAction, P2pEngineError, P2pEvent, P2pState, P2pTable};
pub use types::{
    ConfigMethod, ConfigMethods, ConnectionRequest, ConnectionResponse, Decision, DeviceType,
    FindResult, LinkInfo, MacAddress, PeerInfo, Reason, Role, Status,
};
