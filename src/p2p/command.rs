//! Outbound supplicant commands and the channel that carries them.

use crate::p2p::error::ControlError;
use crate::p2p::types::{ConfigMethod, MacAddress};
use std::fmt;

/// Sends one textual command and returns the textual reply.
///
/// Implementations report transport problems as [`ControlError::Transport`];
/// [`send`] turns a `FAIL` reply into [`ControlError::Rejected`].
pub trait ControlChannel: Send + Sync {
    fn request(&self, command: &str) -> Result<String, ControlError>;
}

/// Flags appended to `P2P_CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectFlags {
    pub persistent: bool,
    pub join: bool,
    pub auth: bool,
    pub auto: bool,
    pub provdisc: bool,
    pub reject: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Find {
        timeout: Option<u32>,
        device: Option<MacAddress>,
    },
    StopFind,
    Listen,
    Connect {
        address: MacAddress,
        method: ConfigMethod,
        pin: Option<String>,
        go_intent: u8,
        flags: ConnectFlags,
    },
    GroupAdd {
        persistent: bool,
        freq: Option<u32>,
    },
    GroupRemove {
        ifname: String,
    },
    ProvDisc {
        address: MacAddress,
        method: ConfigMethod,
        join: bool,
        auto: bool,
    },
    Reject {
        address: MacAddress,
    },
    Flush,
    Cancel,
    SetSsidPostfix(String),
    SetDeviceName(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find { timeout, device } => {
                f.write_str("P2P_FIND")?;
                if let Some(timeout) = timeout {
                    write!(f, " {timeout}")?;
                }
                if let Some(device) = device {
                    write!(f, " dev_id={device}")?;
                }
                Ok(())
            }
            Self::StopFind => f.write_str("P2P_STOP_FIND"),
            Self::Listen => f.write_str("P2P_LISTEN"),
            Self::Connect {
                address,
                method,
                pin,
                go_intent,
                flags,
            } => {
                write!(f, "P2P_CONNECT {address}")?;
                match method {
                    ConfigMethod::Pbc => f.write_str(" pbc")?,
                    ConfigMethod::Display | ConfigMethod::Keypad => {
                        let pin = pin.as_deref().unwrap_or("pin");
                        write!(f, " {pin} {}", method.keyword())?;
                    }
                }
                if flags.persistent {
                    f.write_str(" persistent")?;
                }
                if flags.auth {
                    f.write_str(" auth")?;
                } else if flags.join {
                    f.write_str(" join")?;
                }
                write!(f, " go_intent={go_intent}")?;
                if flags.auto {
                    f.write_str(" auto")?;
                }
                if flags.provdisc {
                    f.write_str(" provdisc")?;
                }
                if flags.reject {
                    f.write_str(" reject")?;
                }
                Ok(())
            }
            Self::GroupAdd { persistent, freq } => {
                f.write_str("P2P_GROUP_ADD")?;
                if *persistent {
                    f.write_str(" persistent")?;
                }
                if let Some(freq) = freq {
                    write!(f, " freq={freq}")?;
                }
                Ok(())
            }
            Self::GroupRemove { ifname } => write!(f, "P2P_GROUP_REMOVE {ifname}"),
            Self::ProvDisc {
                address,
                method,
                join,
                auto,
            } => {
                write!(f, "P2P_PROV_DISC {address} {}", method.keyword())?;
                if *join {
                    f.write_str(" join")?;
                }
                if *auto {
                    f.write_str(" auto")?;
                }
                Ok(())
            }
            Self::Reject { address } => write!(f, "P2P_REJECT {address}"),
            Self::Flush => f.write_str("P2P_FLUSH"),
            Self::Cancel => f.write_str("P2P_CANCEL"),
            Self::SetSsidPostfix(postfix) => write!(f, "P2P_SET ssid_postfix {postfix}"),
            Self::SetDeviceName(name) => write!(f, "SET device_name {name}"),
        }
    }
}

/// Render `command`, send it and check the reply.
pub fn send(channel: &dyn ControlChannel, command: &Command) -> Result<String, ControlError> {
    let text = command.to_string();
    tracing::trace!("sending {}", text);
    let reply = channel.request(&text)?;
    if reply.trim_start().starts_with("FAIL") {
        return Err(ControlError::Rejected {
            command: text,
            reply: reply.trim().to_string(),
        });
    }
    Ok(reply)
}

/// Map a channel number to its 2.4 GHz centre frequency.
///
/// Channel 0 means the supplicant picks; channels outside 1..=14 are invalid.
pub fn channel_to_freq(channel: u8) -> Result<Option<u32>, u8> {
    match channel {
        0 => Ok(None),
        14 => Ok(Some(2484)),
        1..=13 => Ok(Some(2407 + 5 * u32::from(channel))),
        other => Err(other),
    }
}
