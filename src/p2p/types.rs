//! Values exchanged with the application and parsed from notifications.

use crate::p2p::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Result codes returned by driver operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Success,
    Error,
    NotSupported,
    ParamFailed,
    NotAllowed,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Why a find, connect or link report happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Reason {
    #[default]
    Success,
    Timeout,
    NegotiationFailed,
    GroupFormationFailed,
    ProvisioningFailed,
    ConnectAttemptFailed,
    OperationFailed,
}

/// A device address in `aa:bb:cc:dd:ee:ff` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidAddress(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// How the two peers exchange WPS credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConfigMethod {
    #[default]
    Pbc,
    Display,
    Keypad,
}

impl ConfigMethod {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Pbc => "pbc",
            Self::Display => "display",
            Self::Keypad => "keypad",
        }
    }
}

/// Config methods advertised by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConfigMethods(u8);

impl ConfigMethods {
    pub const PBC: Self = Self(0x01);
    pub const DISPLAY: Self = Self(0x02);
    pub const KEYPAD: Self = Self(0x04);
    pub const P2PS: Self = Self(0x08);

    const WPS_DISPLAY: u16 = 0x0008;
    const WPS_PUSHBUTTON: u16 = 0x0080;
    const WPS_KEYPAD: u16 = 0x0100;
    const WPS_P2PS: u16 = 0x1000;

    /// Map a WPS `config_methods` attribute.
    pub fn from_wps(bits: u16) -> Self {
        let mut methods = 0;
        if bits & Self::WPS_PUSHBUTTON != 0 {
            methods |= Self::PBC.0;
        }
        if bits & Self::WPS_DISPLAY != 0 {
            methods |= Self::DISPLAY.0;
        }
        if bits & Self::WPS_KEYPAD != 0 {
            methods |= Self::KEYPAD.0;
        }
        if bits & Self::WPS_P2PS != 0 {
            methods |= Self::P2PS.0;
        }
        Self(methods)
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// WPS primary device type, `<category>-<OUI>-<subcategory>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceType {
    pub category: u16,
    pub oui: u32,
    pub subcategory: u16,
}

impl FromStr for DeviceType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidValue {
            field: "pri_dev_type",
            value: s.to_string(),
        };
        let mut parts = s.split('-');
        let (Some(category), Some(oui), Some(subcategory), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        Ok(Self {
            category: category.parse().map_err(|_| invalid())?,
            oui: u32::from_str_radix(oui, 16).map_err(|_| invalid())?,
            subcategory: subcategory.parse().map_err(|_| invalid())?,
        })
    }
}

/// A discovered P2P device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub address: MacAddress,
    pub device_type: DeviceType,
    pub name: String,
    pub config_methods: ConfigMethods,
    pub device_capability: u8,
    pub group_capability: u8,
}

impl PeerInfo {
    /// A peer known only by address.
    pub fn bare(address: MacAddress) -> Self {
        Self {
            address,
            device_type: DeviceType::default(),
            name: String::new(),
            config_methods: ConfigMethods::default(),
            device_capability: 0,
            group_capability: 0,
        }
    }
}

/// Role taken in a P2P group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Client,
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GO" => Ok(Self::Owner),
            "client" => Ok(Self::Client),
            other => Err(ParseError::InvalidValue {
                field: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// The application's answer to a connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    Reject,
}

/// Delivered to the find callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindResult {
    pub reason: Reason,
    pub peer: Option<PeerInfo>,
}

/// Handed to the connection handler when a peer wants to connect, or when
/// an outgoing connect needs confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub peer: PeerInfo,
    pub method: ConfigMethod,
    pub pin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionResponse {
    pub decision: Decision,
    pub go_intent: u8,
    pub pin: Option<String>,
}

impl ConnectionResponse {
    pub fn accept(go_intent: u8) -> Self {
        Self {
            decision: Decision::Accept,
            go_intent,
            pin: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            decision: Decision::Reject,
            go_intent: 0,
            pin: None,
        }
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }
}

/// Delivered to the link-up and link-down callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub reason: Reason,
    pub ssid: Option<String>,
    pub peer_address: Option<MacAddress>,
    pub locally_generated: bool,
}

pub type FindCallback = Arc<dyn Fn(&FindResult) + Send + Sync>;
pub type ConnectionHandler = Arc<dyn Fn(&ConnectionRequest) -> ConnectionResponse + Send + Sync>;
pub type LinkCallback = Arc<dyn Fn(&LinkInfo) + Send + Sync>;
