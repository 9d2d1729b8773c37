//! Error types for the P2P driver.

use crate::builder::BuildError;
use std::time::Duration;
use thiserror::Error;

/// A notification line could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not carry the expected marker.
    #[error("Marker '{0}' not found")]
    MissingMarker(&'static str),

    /// A required token is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// The control channel refused or failed a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The supplicant answered with a failure reply.
    #[error("Command '{command}' rejected: {reply}")]
    Rejected { command: String, reply: String },

    /// The command never reached the supplicant.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A rendezvous wait ended without a value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendezvousError {
    #[error("Rendezvous timed out after {0:?}")]
    Timeout(Duration),

    /// The owning instance was stopped while waiting.
    #[error("Rendezvous released")]
    Released,
}

/// Hard failures returned by [`Driver::new`](crate::p2p::Driver::new) and
/// [`Driver::start`](crate::p2p::Driver::start).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("P2P instance already started")]
    AlreadyStarted,

    #[error("Supplicant rejected start: {0}")]
    Rejected(#[from] ControlError),

    #[error("Transition table invalid: {0}")]
    Table(#[from] BuildError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The engine refused the start event.
    #[error("Start not accepted: {0}")]
    NotAccepted(String),
}

/// Driver configuration could not be loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
