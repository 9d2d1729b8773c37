//! Classification and parsing of supplicant notification lines.
//!
//! Lines are free-form text such as
//! `<3>P2P-DEVICE-FOUND c2:97:27:52:2a:5c p2p_dev_addr=c2:97:27:52:2a:5c ...`.
//! Classification only looks for fixed markers; each parser then pulls the
//! tokens it needs out of the text after the marker.

use crate::p2p::error::ParseError;
use crate::p2p::fsm::P2pEvent;
use crate::p2p::types::{ConfigMethod, ConfigMethods, DeviceType, MacAddress, PeerInfo, Reason, Role};

pub const DEVICE_FOUND: &str = "P2P-DEVICE-FOUND";
pub const FIND_STOPPED: &str = "P2P-FIND-STOPPED";
pub const PROV_DISC_SHOW_PIN: &str = "P2P-PROV-DISC-SHOW-PIN";
pub const PROV_DISC_ENTER_PIN: &str = "P2P-PROV-DISC-ENTER-PIN";
pub const PROV_DISC_PBC_REQ: &str = "P2P-PROV-DISC-PBC-REQ";
pub const PROV_DISC_PBC_RESP: &str = "P2P-PROV-DISC-PBC-RESP";
pub const GO_NEG_REQUEST: &str = "P2P-GO-NEG-REQUEST";
pub const GO_NEG_SUCCESS: &str = "P2P-GO-NEG-SUCCESS";
pub const GO_NEG_FAILURE: &str = "P2P-GO-NEG-FAILURE";
pub const GROUP_FORMATION_FAILURE: &str = "P2P-GROUP-FORMATION-FAILURE";
pub const WPS_FAIL: &str = "WPS-FAIL";
pub const GROUP_STARTED: &str = "P2P-GROUP-STARTED";
pub const GROUP_REMOVED: &str = "P2P-GROUP-REMOVED";
pub const CTRL_CONNECTED: &str = "CTRL-EVENT-CONNECTED";
pub const AP_STA_CONNECTED: &str = "AP-STA-CONNECTED";
pub const CTRL_DISCONNECTED: &str = "CTRL-EVENT-DISCONNECTED";
pub const AP_STA_DISCONNECTED: &str = "AP-STA-DISCONNECTED";

/// Markers in match order, with the event each one feeds and the failure
/// reason it carries.
const MARKERS: &[(&str, P2pEvent, Option<Reason>)] = &[
    (DEVICE_FOUND, P2pEvent::Found, None),
    (FIND_STOPPED, P2pEvent::FindTimeout, None),
    (PROV_DISC_SHOW_PIN, P2pEvent::ProvDisc, None),
    (PROV_DISC_ENTER_PIN, P2pEvent::ProvDisc, None),
    (PROV_DISC_PBC_REQ, P2pEvent::ProvDisc, None),
    (PROV_DISC_PBC_RESP, P2pEvent::ProvDisc, None),
    (GO_NEG_REQUEST, P2pEvent::NegotiationRequest, None),
    (GO_NEG_SUCCESS, P2pEvent::NegotiationSuccess, None),
    (GO_NEG_FAILURE, P2pEvent::ConnectFailed, Some(Reason::NegotiationFailed)),
    (
        GROUP_FORMATION_FAILURE,
        P2pEvent::ConnectFailed,
        Some(Reason::GroupFormationFailed),
    ),
    (WPS_FAIL, P2pEvent::ConnectFailed, Some(Reason::ConnectAttemptFailed)),
    (GROUP_STARTED, P2pEvent::GroupStarted, None),
    (GROUP_REMOVED, P2pEvent::GroupRemoved, None),
    (CTRL_CONNECTED, P2pEvent::PeerConnected, None),
    (AP_STA_CONNECTED, P2pEvent::PeerConnected, None),
    (CTRL_DISCONNECTED, P2pEvent::PeerDisconnected, None),
    (AP_STA_DISCONNECTED, P2pEvent::PeerDisconnected, None),
];

/// A notification line mapped onto the event it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub marker: &'static str,
    pub event: P2pEvent,
    pub reason: Option<Reason>,
}

/// Map a line to an event by its marker, or `None` if it carries no known one.
pub fn classify(line: &str) -> Option<Classified> {
    MARKERS
        .iter()
        .find(|(marker, _, _)| line.contains(marker))
        .map(|&(marker, event, reason)| Classified {
            marker,
            event,
            reason,
        })
}

/// Split text into whitespace-separated tokens.
///
/// Single or double quotes group a value containing spaces; the quotes are
/// removed, and backslash escapes inside them are kept for [`printf_decode`].
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) if c == '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Decode printf-style escapes (`\\`, `\"`, `\n`, `\xHH`, octal ...).
pub fn printf_decode(text: &str) -> String {
    let mut bytes = Vec::with_capacity(text.len());
    let raw = text.as_bytes();
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 == raw.len() {
            bytes.push(raw[i]);
            i += 1;
            continue;
        }
        i += 1;
        match raw[i] {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'e' => bytes.push(0x1b),
            b'x' => {
                let digits = raw[i + 1..]
                    .iter()
                    .take(2)
                    .take_while(|b| b.is_ascii_hexdigit())
                    .count();
                let value = std::str::from_utf8(&raw[i + 1..i + 1 + digits])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match value {
                    Some(value) => {
                        bytes.push(value);
                        i += digits;
                    }
                    None => bytes.push(b'x'),
                }
            }
            b'0'..=b'7' => {
                let digits = raw[i..]
                    .iter()
                    .take(3)
                    .take_while(|b| (b'0'..=b'7').contains(*b))
                    .count();
                let value = raw[i..i + digits]
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                bytes.push(u8::try_from(value).unwrap_or(u8::MAX));
                i += digits - 1;
            }
            other => bytes.push(other),
        }
        i += 1;
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Tokens of a line after its marker.
struct Fields {
    tokens: Vec<String>,
}

impl Fields {
    fn after(line: &str, marker: &'static str) -> Result<Self, ParseError> {
        let start = line.find(marker).ok_or(ParseError::MissingMarker(marker))?;
        Ok(Self {
            tokens: tokenize(&line[start + marker.len()..]),
        })
    }

    /// Tokens without a `key=` prefix, in order.
    fn positional(&self) -> impl Iterator<Item = &str> {
        self.tokens
            .iter()
            .filter(|t| !t.contains('='))
            .map(String::as_str)
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.tokens.iter().find_map(|t| {
            t.split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }

    fn require(&self, key: &'static str) -> Result<&str, ParseError> {
        self.get(key).ok_or(ParseError::MissingField(key))
    }

    fn address(&self, key: &'static str) -> Result<MacAddress, ParseError> {
        self.require(key)?.parse()
    }

    fn first_address(&self) -> Result<MacAddress, ParseError> {
        self.positional()
            .next()
            .ok_or(ParseError::MissingField("address"))?
            .parse()
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<u32, ParseError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, ParseError> {
    u8::try_from(parse_number(field, value)?).map_err(|_| ParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn parse_u16(field: &'static str, value: &str) -> Result<u16, ParseError> {
    u16::try_from(parse_number(field, value)?).map_err(|_| ParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn peer_info(fields: &Fields, address: MacAddress) -> Result<PeerInfo, ParseError> {
    let device_type: DeviceType = fields.require("pri_dev_type")?.parse()?;
    let name = printf_decode(fields.require("name")?);
    let methods = parse_u16("config_methods", fields.require("config_methods")?)?;

    Ok(PeerInfo {
        address,
        device_type,
        name,
        config_methods: ConfigMethods::from_wps(methods),
        device_capability: parse_u8("dev_capab", fields.require("dev_capab")?)?,
        group_capability: parse_u8("group_capab", fields.require("group_capab")?)?,
    })
}

/// Parse a `P2P-DEVICE-FOUND` line.
pub fn parse_device_found(line: &str) -> Result<PeerInfo, ParseError> {
    let fields = Fields::after(line, DEVICE_FOUND)?;
    let address = fields.address("p2p_dev_addr")?;
    peer_info(&fields, address)
}

/// A provision discovery request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvDisc {
    pub peer: PeerInfo,
    pub method: ConfigMethod,
    pub pin: Option<String>,
}

/// Parse any of the `P2P-PROV-DISC-*` lines.
///
/// SHOW-PIN asks us to display the PIN it carries, ENTER-PIN asks for one
/// on our keypad, and both PBC variants mean push-button. Device details
/// are filled in when the line carries them.
pub fn parse_prov_disc(line: &str) -> Result<ProvDisc, ParseError> {
    let (marker, method) = [
        (PROV_DISC_SHOW_PIN, ConfigMethod::Display),
        (PROV_DISC_ENTER_PIN, ConfigMethod::Keypad),
        (PROV_DISC_PBC_REQ, ConfigMethod::Pbc),
        (PROV_DISC_PBC_RESP, ConfigMethod::Pbc),
    ]
    .into_iter()
    .find(|(marker, _)| line.contains(marker))
    .ok_or(ParseError::MissingMarker("P2P-PROV-DISC"))?;

    let fields = Fields::after(line, marker)?;
    let address = fields.first_address()?;
    let pin = match method {
        ConfigMethod::Display => Some(
            fields
                .positional()
                .nth(1)
                .ok_or(ParseError::MissingField("pin"))?
                .to_string(),
        ),
        _ => None,
    };
    let peer = peer_info(&fields, address).unwrap_or_else(|_| {
        let mut peer = PeerInfo::bare(address);
        if let Some(name) = fields.get("name") {
            peer.name = printf_decode(name);
        }
        peer
    });

    Ok(ProvDisc { peer, method, pin })
}

/// A `P2P-GO-NEG-REQUEST` from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationRequest {
    pub address: MacAddress,
    pub password_id: Option<u16>,
    pub go_intent: Option<u8>,
}

pub fn parse_negotiation_request(line: &str) -> Result<NegotiationRequest, ParseError> {
    let fields = Fields::after(line, GO_NEG_REQUEST)?;
    let address = fields.first_address()?;
    let password_id = fields
        .get("dev_passwd_id")
        .map(|v| parse_u16("dev_passwd_id", v))
        .transpose()?;
    let go_intent = fields
        .get("go_intent")
        .map(|v| parse_u8("go_intent", v))
        .transpose()?;

    Ok(NegotiationRequest {
        address,
        password_id,
        go_intent,
    })
}

/// Parse the negotiated role out of `P2P-GO-NEG-SUCCESS role=<GO|client> ...`.
pub fn parse_negotiation_success(line: &str) -> Result<Role, ParseError> {
    Fields::after(line, GO_NEG_SUCCESS)?.require("role")?.parse()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStarted {
    pub ifname: String,
    pub role: Role,
    pub ssid: String,
    pub go_address: Option<MacAddress>,
}

/// Parse `P2P-GROUP-STARTED <ifname> <GO|client> ssid="..." ...`.
pub fn parse_group_started(line: &str) -> Result<GroupStarted, ParseError> {
    let fields = Fields::after(line, GROUP_STARTED)?;
    let mut positional = fields.positional();
    let ifname = positional
        .next()
        .ok_or(ParseError::MissingField("ifname"))?
        .to_string();
    let role = positional
        .next()
        .ok_or(ParseError::MissingField("role"))?
        .parse()?;
    let ssid = printf_decode(fields.require("ssid")?);
    let go_address = fields
        .get("go_dev_addr")
        .map(str::parse)
        .transpose()?;

    Ok(GroupStarted {
        ifname,
        role,
        ssid,
        go_address,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRemoved {
    pub ifname: String,
    pub role: Role,
    pub reason: Option<String>,
}

/// Parse `P2P-GROUP-REMOVED <ifname> <GO|client> reason=...`.
pub fn parse_group_removed(line: &str) -> Result<GroupRemoved, ParseError> {
    let fields = Fields::after(line, GROUP_REMOVED)?;
    let mut positional = fields.positional();
    let ifname = positional
        .next()
        .ok_or(ParseError::MissingField("ifname"))?
        .to_string();
    let role = positional
        .next()
        .ok_or(ParseError::MissingField("role"))?
        .parse()?;

    Ok(GroupRemoved {
        ifname,
        role,
        reason: fields.get("reason").map(str::to_string),
    })
}

/// Address of the station in a connect or disconnect line.
///
/// Prefers `p2p_dev_addr=`, then `bssid=`, then the first bare address.
pub fn parse_station(line: &str) -> Result<MacAddress, ParseError> {
    let marker = [
        AP_STA_CONNECTED,
        AP_STA_DISCONNECTED,
        CTRL_CONNECTED,
        CTRL_DISCONNECTED,
    ]
    .into_iter()
    .find(|marker| line.contains(marker))
    .ok_or(ParseError::MissingMarker("station event"))?;

    let fields = Fields::after(line, marker)?;
    if let Some(address) = fields.get("p2p_dev_addr").or_else(|| fields.get("bssid")) {
        return address.parse();
    }
    let address = fields
        .positional()
        .find_map(|token| token.parse().ok())
        .ok_or(ParseError::MissingField("address"));
    address
}
