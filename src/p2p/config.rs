//! Driver configuration.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```
//! use p2p_fsm::p2p::DriverConfig;
//!
//! let config = DriverConfig::from_json(r#"{ "go_intent": 15, "ssid_postfix": "lab" }"#).unwrap();
//! assert_eq!(config.go_intent, 15);
//! assert_eq!(config.connect_find_timeout_secs, 30);
//! ```

use crate::core::DEFAULT_HISTORY_CAPACITY;
use crate::p2p::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest GO intent a peer may advertise.
pub const MAX_GO_INTENT: u8 = 15;

/// Longest SSID postfix the supplicant accepts.
pub const MAX_SSID_POSTFIX_LEN: usize = 23;

/// Flags applied to every outgoing `P2P_CONNECT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingConfig {
    pub persistent: bool,
    pub join: bool,
    pub auth: bool,
    pub auto: bool,
    pub provdisc: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Timeout passed to the targeted `P2P_FIND` of a connect.
    pub connect_find_timeout_secs: u32,

    /// How long `connect` waits for the peer to be discovered.
    pub connect_wait_ms: u64,

    /// How long a negotiation request waits for the application's decision.
    pub decision_wait_ms: u64,

    /// How long `disconnect` and `stop` wait for the link to go down.
    pub disconnect_wait_ms: u64,

    pub go_intent: u8,

    /// Group interface used when the supplicant never reported one.
    pub group_ifname: String,

    /// Prefix placed before the device name in the SSID postfix.
    pub ssid_postfix: String,

    pub history_capacity: usize,

    pub outgoing: OutgoingConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            connect_find_timeout_secs: 30,
            connect_wait_ms: 35_000,
            decision_wait_ms: 10_000,
            disconnect_wait_ms: 5_000,
            go_intent: 7,
            group_ifname: "p2p-wlan0-0".to_string(),
            ssid_postfix: String::new(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            outgoing: OutgoingConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.go_intent > MAX_GO_INTENT {
            return Err(ConfigError::Invalid {
                field: "go_intent",
                reason: format!("{} exceeds {MAX_GO_INTENT}", self.go_intent),
            });
        }
        if self.ssid_postfix.len() > MAX_SSID_POSTFIX_LEN {
            return Err(ConfigError::Invalid {
                field: "ssid_postfix",
                reason: format!("longer than {MAX_SSID_POSTFIX_LEN} bytes"),
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "history_capacity",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn connect_wait(&self) -> Duration {
        Duration::from_millis(self.connect_wait_ms)
    }

    pub fn decision_wait(&self) -> Duration {
        Duration::from_millis(self.decision_wait_ms)
    }

    pub fn disconnect_wait(&self) -> Duration {
        Duration::from_millis(self.disconnect_wait_ms)
    }
}

/// Fluent construction of a [`DriverConfig`].
#[derive(Debug, Clone, Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_find_timeout_secs(mut self, secs: u32) -> Self {
        self.config.connect_find_timeout_secs = secs;
        self
    }

    pub fn connect_wait(mut self, wait: Duration) -> Self {
        self.config.connect_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn decision_wait(mut self, wait: Duration) -> Self {
        self.config.decision_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn disconnect_wait(mut self, wait: Duration) -> Self {
        self.config.disconnect_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn go_intent(mut self, go_intent: u8) -> Self {
        self.config.go_intent = go_intent;
        self
    }

    pub fn group_ifname(mut self, ifname: impl Into<String>) -> Self {
        self.config.group_ifname = ifname.into();
        self
    }

    pub fn ssid_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.config.ssid_postfix = postfix.into();
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    pub fn outgoing(mut self, outgoing: OutgoingConfig) -> Self {
        self.config.outgoing = outgoing;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<DriverConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
