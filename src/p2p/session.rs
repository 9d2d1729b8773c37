//! Per-instance protocol context.
//!
//! A [`Session`] is created by `start` and dropped by `stop`. Only the engine's
//! dispatcher mutates it, always under the driver lock.

use crate::p2p::command::ConnectFlags;
use crate::p2p::config::DriverConfig;
use crate::p2p::rendezvous::RendezvousSet;
use crate::p2p::types::{ConfigMethod, Decision, MacAddress, PeerInfo, Reason, Role};
use chrono::{DateTime, Utc};

/// The peer currently being negotiated with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Peer {
    pub address: Option<MacAddress>,
    pub info: Option<PeerInfo>,
    pub method: ConfigMethod,
    pub pin: Option<String>,
    pub go_intent: u8,
    pub decision: Option<Decision>,
}

/// Options of the outgoing connect in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outgoing {
    pub find_timeout: u32,
    pub flags: ConnectFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub ifname: Option<String>,
    pub ssid: Option<String>,
    pub go_address: Option<MacAddress>,
    /// We are the group owner.
    pub owner: bool,
    /// Formed through negotiation rather than `P2P_GROUP_ADD`.
    pub negotiated: bool,
}

pub struct Session {
    id: String,
    started_at: DateTime<Utc>,
    pub peer: Peer,
    pub outgoing: Outgoing,
    pub role: Option<Role>,
    /// Address a discovery is looking for.
    pub target: Option<MacAddress>,
    pub group: Group,
    /// Reason reported with the next failure callback.
    pub failure: Reason,
    pub link_reported: bool,
    pub awaiting_disconnect: bool,
    pub rendezvous: RendezvousSet,
}

impl Session {
    pub fn new(go_intent: u8) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            peer: Peer {
                go_intent,
                ..Peer::default()
            },
            outgoing: Outgoing::default(),
            role: None,
            target: None,
            group: Group::default(),
            failure: Reason::Success,
            link_reported: false,
            awaiting_disconnect: false,
            rendezvous: RendezvousSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Reset the peer context for a connect to `address`.
    pub fn prepare_outgoing(&mut self, address: MacAddress, method: ConfigMethod, config: &DriverConfig) {
        self.peer = Peer {
            address: Some(address),
            method,
            go_intent: config.go_intent,
            ..Peer::default()
        };
        self.outgoing = Outgoing {
            find_timeout: config.connect_find_timeout_secs,
            flags: ConnectFlags {
                persistent: config.outgoing.persistent,
                join: config.outgoing.join,
                auth: config.outgoing.auth,
                auto: config.outgoing.auto,
                provdisc: config.outgoing.provdisc,
                reject: false,
            },
        };
        self.target = Some(address);
        self.role = None;
        self.failure = Reason::Timeout;
        self.link_reported = false;
        self.rendezvous.drain();
    }

    /// Reset the peer context for a request arriving from `peer`.
    pub fn prepare_incoming(&mut self, peer: PeerInfo, method: ConfigMethod, pin: Option<String>, go_intent: u8) {
        self.peer = Peer {
            address: Some(peer.address),
            info: Some(peer),
            method,
            pin,
            go_intent,
            decision: None,
        };
        self.outgoing = Outgoing::default();
        self.role = None;
        self.failure = Reason::Success;
        self.link_reported = false;
        self.rendezvous.decision.drain();
    }

    /// Forget the group after it went away.
    pub fn clear_group(&mut self) {
        self.group = Group::default();
        self.role = None;
    }

    /// Take the failure reason, leaving `Success` behind.
    pub fn take_failure(&mut self) -> Reason {
        std::mem::take(&mut self.failure)
    }

    pub fn is_owner(&self) -> bool {
        self.group.owner
    }
}
