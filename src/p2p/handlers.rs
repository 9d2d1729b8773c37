//! Protocol behaviour bound to each [`P2pAction`].
//!
//! A [`Dispatcher`] lives for one engine run. It borrows the session, the
//! request context of the operation or notification that started the run, the
//! registered callbacks and the control channel. Callbacks are invoked while
//! the driver lock is held and must not call back into the driver.

use crate::engine::Dispatch;
use crate::p2p::command::{self, Command, ConnectFlags, ControlChannel};
use crate::p2p::config::DriverConfig;
use crate::p2p::error::ControlError;
use crate::p2p::fsm::{P2pAction, P2pEvent};
use crate::p2p::notification;
use crate::p2p::session::Session;
use crate::p2p::types::{
    ConnectionHandler, ConnectionRequest, ConnectionResponse, Decision, FindCallback,
    FindResult, LinkCallback, LinkInfo, MacAddress, PeerInfo, Reason, Role, Status,
};

/// Application callbacks. They survive `stop` and `start`.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub find: Option<FindCallback>,
    pub connection: Option<ConnectionHandler>,
    pub link_up: Option<LinkCallback>,
    pub link_down: Option<LinkCallback>,
}

/// Inputs and outputs of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub status: Status,
    /// Notification text, when the run was started by the feed.
    pub line: Option<String>,
    pub find_timeout: Option<u32>,
    pub find_target: Option<MacAddress>,
    pub group_freq: Option<u32>,
    pub group_persistent: bool,
    /// Set when `start` could not configure the supplicant.
    pub rejected: Option<ControlError>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            status: Status::Success,
            line: None,
            find_timeout: None,
            find_target: None,
            group_freq: None,
            group_persistent: false,
            rejected: None,
        }
    }
}

impl Request {
    pub fn notification(line: &str) -> Self {
        Self {
            line: Some(line.to_string()),
            ..Self::default()
        }
    }

    fn line(&self) -> &str {
        self.line.as_deref().unwrap_or_default()
    }
}

pub struct Dispatcher<'a> {
    session: &'a mut Session,
    request: &'a mut Request,
    callbacks: &'a Callbacks,
    control: &'a dyn ControlChannel,
    config: &'a DriverConfig,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        session: &'a mut Session,
        request: &'a mut Request,
        callbacks: &'a Callbacks,
        control: &'a dyn ControlChannel,
        config: &'a DriverConfig,
    ) -> Self {
        Self {
            session,
            request,
            callbacks,
            control,
            config,
        }
    }

    /// Send a command whose failure fails the operation.
    fn command(&mut self, command: &Command) -> bool {
        match command::send(self.control, command) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("{}", err);
                self.request.status = Status::Error;
                false
            }
        }
    }

    /// Send a command whose failure is only logged.
    fn best_effort(&self, command: &Command) {
        if let Err(err) = command::send(self.control, command) {
            tracing::debug!("ignoring failed command: {}", err);
        }
    }

    fn report_find(&self, result: FindResult) {
        if let Some(callback) = &self.callbacks.find {
            callback(&result);
        }
    }

    fn report_link_up(&self, info: LinkInfo) {
        if let Some(callback) = &self.callbacks.link_up {
            callback(&info);
        }
    }

    /// Report the link down once per link up.
    fn report_link_down(&mut self, locally_generated: bool) {
        if !self.session.link_reported {
            return;
        }
        self.session.link_reported = false;
        let info = LinkInfo {
            reason: Reason::Success,
            ssid: self.session.group.ssid.clone(),
            peer_address: self.session.peer.address,
            locally_generated,
        };
        if let Some(callback) = &self.callbacks.link_down {
            callback(&info);
        }
    }

    /// Report a failed connection through the link-up callback and wake a
    /// suspended `connect`.
    fn report_failure(&mut self, fallback: Reason) {
        let mut reason = self.session.take_failure();
        if reason == Reason::Success {
            reason = fallback;
        }
        self.session.rendezvous.peer_found.signal(Err(reason));
        self.session.target = None;

        if self.session.peer.decision == Some(Decision::Reject) {
            tracing::debug!("connection rejected locally, not reporting {:?}", reason);
            return;
        }
        tracing::info!("connection failed: {:?}", reason);
        self.report_link_up(LinkInfo {
            reason,
            ssid: None,
            peer_address: self.session.peer.address,
            locally_generated: false,
        });
    }

    fn fail(&mut self, reason: Reason) -> Option<P2pEvent> {
        self.session.failure = reason;
        Some(P2pEvent::ConnectFailed)
    }

    fn group_ifname(&self) -> String {
        self.session
            .group
            .ifname
            .clone()
            .unwrap_or_else(|| self.config.group_ifname.clone())
    }

    fn connection_request(&self) -> Option<ConnectionRequest> {
        let address = self.session.peer.address?;
        Some(ConnectionRequest {
            peer: self
                .session
                .peer
                .info
                .clone()
                .unwrap_or_else(|| PeerInfo::bare(address)),
            method: self.session.peer.method,
            pin: self.session.peer.pin.clone(),
        })
    }

    fn apply_response(&mut self, response: &ConnectionResponse) {
        self.session.peer.decision = Some(response.decision);
        if response.decision == Decision::Accept {
            self.session.peer.go_intent = response.go_intent;
        }
        if response.pin.is_some() {
            self.session.peer.pin = response.pin.clone();
        }
    }

    fn init_session(&mut self) -> Option<P2pEvent> {
        tracing::info!("starting P2P session {}", self.session.id());
        if self.config.ssid_postfix.is_empty() {
            return None;
        }
        let postfix = Command::SetSsidPostfix(format!("-{}", self.config.ssid_postfix));
        match command::send(self.control, &postfix) {
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("supplicant refused session setup: {}", err);
                self.request.status = Status::Error;
                self.request.rejected = Some(err);
                Some(P2pEvent::Stop)
            }
        }
    }

    fn terminate_remove_group(&mut self) -> Option<P2pEvent> {
        if self.session.is_owner() {
            if let Some(ifname) = self.session.group.ifname.clone() {
                self.best_effort(&Command::GroupRemove { ifname });
            }
        }
        Some(P2pEvent::Cancel)
    }

    fn terminate_disconnect(&mut self) -> Option<P2pEvent> {
        let Some(ifname) = self.session.group.ifname.clone() else {
            return Some(P2pEvent::Cancel);
        };
        if self.session.is_owner() {
            return Some(P2pEvent::Cancel);
        }
        self.session.rendezvous.disconnected.drain();
        match command::send(self.control, &Command::GroupRemove { ifname }) {
            Ok(_) => {
                self.session.awaiting_disconnect = true;
                None
            }
            Err(err) => {
                tracing::debug!("client link already gone: {}", err);
                Some(P2pEvent::Cancel)
            }
        }
    }

    fn terminate_flush(&mut self) -> Option<P2pEvent> {
        self.best_effort(&Command::Flush);
        self.session.awaiting_disconnect = false;
        self.session.target = None;
        tracing::info!("P2P session {} terminated", self.session.id());
        None
    }

    fn signal_disconnected(&mut self) -> Option<P2pEvent> {
        self.report_link_down(false);
        self.session.awaiting_disconnect = false;
        self.session.rendezvous.disconnected.signal(());
        None
    }

    fn issue_find(&mut self) -> Option<P2pEvent> {
        self.session.target = self.request.find_target;
        self.session.peer.address = None;
        self.session.peer.info = None;
        let find = Command::Find {
            timeout: self.request.find_timeout,
            device: self.request.find_target,
        };
        self.command(&find);
        None
    }

    fn issue_stop_find(&mut self) -> Option<P2pEvent> {
        self.session.target = None;
        self.command(&Command::StopFind);
        None
    }

    /// Parse a found device and check it against the discovery target.
    fn found_peer(&self) -> Option<(PeerInfo, bool)> {
        match notification::parse_device_found(self.request.line()) {
            Ok(peer) => {
                let is_target = self.session.target == Some(peer.address);
                Some((peer, is_target))
            }
            Err(err) => {
                tracing::warn!("dropping device found line: {}", err);
                None
            }
        }
    }

    fn report_found_peer(&mut self) -> Option<P2pEvent> {
        let (peer, is_target) = self.found_peer()?;
        if self.session.target.is_none() {
            self.report_find(FindResult {
                reason: Reason::Success,
                peer: Some(peer),
            });
            return None;
        }
        if !is_target {
            tracing::debug!("ignoring {} while looking for another peer", peer.address);
            return None;
        }

        self.best_effort(&Command::StopFind);
        self.session.peer.address = Some(peer.address);
        self.session.peer.info = Some(peer.clone());
        self.report_find(FindResult {
            reason: Reason::Success,
            peer: Some(peer),
        });
        Some(P2pEvent::FoundCorrectPeer)
    }

    fn report_find_timeout(&mut self) -> Option<P2pEvent> {
        self.session.target = None;
        self.report_find(FindResult {
            reason: Reason::Timeout,
            peer: None,
        });
        None
    }

    fn start_connect_search(&mut self) -> Option<P2pEvent> {
        let find = Command::Find {
            timeout: Some(self.session.outgoing.find_timeout),
            device: self.session.target,
        };
        if self.command(&find) {
            None
        } else {
            self.fail(Reason::OperationFailed)
        }
    }

    fn match_connect_peer(&mut self) -> Option<P2pEvent> {
        let (peer, is_target) = self.found_peer()?;
        if !is_target {
            return None;
        }
        if let Err(err) = command::send(self.control, &Command::StopFind) {
            tracing::warn!("could not stop find for {}: {}", peer.address, err);
            return self.fail(Reason::OperationFailed);
        }
        self.session.peer.info = Some(peer);
        Some(P2pEvent::FoundCorrectPeer)
    }

    fn abort_connect(&mut self) -> Option<P2pEvent> {
        self.best_effort(&Command::StopFind);
        self.best_effort(&Command::Cancel);
        self.report_failure(Reason::OperationFailed);
        None
    }

    fn send_prov_disc(&mut self) -> Option<P2pEvent> {
        let Some(address) = self.session.peer.address else {
            return self.fail(Reason::ProvisioningFailed);
        };
        let prov_disc = Command::ProvDisc {
            address,
            method: self.session.peer.method,
            join: self.session.outgoing.flags.join,
            auto: self.session.outgoing.flags.auto,
        };
        if self.command(&prov_disc) {
            None
        } else {
            self.fail(Reason::ProvisioningFailed)
        }
    }

    fn parse_prov_disc(&mut self) -> Option<P2pEvent> {
        match notification::parse_prov_disc(self.request.line()) {
            Ok(prov) => {
                tracing::info!("provision discovery from {} ({})", prov.peer.address, prov.method.keyword());
                self.session.target = None;
                self.session
                    .prepare_incoming(prov.peer, prov.method, prov.pin, self.config.go_intent);
                Some(P2pEvent::Continue)
            }
            Err(err) => {
                tracing::warn!("malformed provision discovery: {}", err);
                self.fail(Reason::ProvisioningFailed)
            }
        }
    }

    fn parse_prov_disc_response(&mut self) -> Option<P2pEvent> {
        match notification::parse_prov_disc(self.request.line()) {
            Ok(prov) if Some(prov.peer.address) == self.session.peer.address => {
                if prov.pin.is_some() {
                    self.session.peer.pin = prov.pin;
                }
                Some(P2pEvent::Continue)
            }
            Ok(prov) => {
                tracing::debug!("ignoring provision discovery from {}", prov.peer.address);
                None
            }
            Err(err) => {
                tracing::warn!("malformed provision discovery response: {}", err);
                self.fail(Reason::ProvisioningFailed)
            }
        }
    }

    fn ask_application(&mut self) -> Option<P2pEvent> {
        let request = self.connection_request()?;
        let response = match &self.callbacks.connection {
            Some(handler) => handler(&request),
            None => ConnectionResponse::accept(self.session.peer.go_intent),
        };
        self.apply_response(&response);
        match response.decision {
            Decision::Accept => Some(P2pEvent::Accept),
            Decision::Reject => Some(P2pEvent::Reject),
        }
    }

    fn request_decision(&mut self) -> Option<P2pEvent> {
        let request = self.connection_request()?;
        let response = match &self.callbacks.connection {
            Some(handler) => handler(&request),
            None => {
                tracing::info!("no connection handler, rejecting {}", request.peer.address);
                ConnectionResponse::reject()
            }
        };
        self.apply_response(&response);
        self.session.rendezvous.decision.signal(response.decision);
        None
    }

    fn connect_command(&self, address: MacAddress, flags: ConnectFlags) -> Command {
        Command::Connect {
            address,
            method: self.session.peer.method,
            pin: self.session.peer.pin.clone(),
            go_intent: self.session.peer.go_intent,
            flags,
        }
    }

    fn send_connect(&mut self) -> Option<P2pEvent> {
        let Some(address) = self.session.peer.address else {
            return self.fail(Reason::ConnectAttemptFailed);
        };
        let connect = self.connect_command(address, self.session.outgoing.flags);
        if self.command(&connect) {
            self.session.failure = Reason::Success;
            None
        } else {
            self.fail(Reason::ConnectAttemptFailed)
        }
    }

    fn abandon_connect(&mut self) -> Option<P2pEvent> {
        self.best_effort(&Command::Cancel);
        self.session.target = None;
        self.session.rendezvous.peer_found.signal(Err(Reason::OperationFailed));
        None
    }

    async fn answer_negotiation(&mut self) -> Option<P2pEvent> {
        let request = match notification::parse_negotiation_request(self.request.line()) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("malformed negotiation request: {}", err);
                return self.fail(Reason::NegotiationFailed);
            }
        };
        match self.session.peer.address {
            Some(address) if address != request.address => {
                tracing::warn!("negotiation request from {} while talking to {}", request.address, address);
                return self.fail(Reason::NegotiationFailed);
            }
            Some(_) => {}
            None => self.session.peer.address = Some(request.address),
        }

        let decision = match self.session.peer.decision {
            Some(decision) => {
                self.session.rendezvous.decision.drain();
                decision
            }
            None => {
                let wait = self.config.decision_wait();
                match self.session.rendezvous.decision.wait(wait).await {
                    Ok(decision) => {
                        self.session.peer.decision = Some(decision);
                        decision
                    }
                    Err(err) => {
                        tracing::warn!("no decision for {}: {}", request.address, err);
                        let reject = ConnectFlags {
                            reject: true,
                            ..ConnectFlags::default()
                        };
                        self.best_effort(&self.connect_command(request.address, reject));
                        return self.fail(Reason::Timeout);
                    }
                }
            }
        };

        match decision {
            Decision::Accept => {
                let connect = self.connect_command(request.address, ConnectFlags::default());
                if self.command(&connect) {
                    None
                } else {
                    self.fail(Reason::ConnectAttemptFailed)
                }
            }
            Decision::Reject => {
                let reject = ConnectFlags {
                    reject: true,
                    ..ConnectFlags::default()
                };
                self.best_effort(&self.connect_command(request.address, reject));
                self.fail(Reason::NegotiationFailed)
            }
        }
    }

    fn reject_unsolicited(&mut self) -> Option<P2pEvent> {
        match notification::parse_negotiation_request(self.request.line()) {
            Ok(request) => {
                tracing::info!("rejecting unsolicited negotiation from {}", request.address);
                self.best_effort(&Command::Reject {
                    address: request.address,
                });
            }
            Err(err) => tracing::warn!("malformed negotiation request: {}", err),
        }
        None
    }

    fn record_role(&mut self) -> Option<P2pEvent> {
        let role = match notification::parse_negotiation_success(self.request.line()) {
            Ok(role) => role,
            Err(err) => {
                tracing::warn!("negotiation succeeded without a role: {}", err);
                return self.fail(Reason::NegotiationFailed);
            }
        };
        tracing::info!("negotiated role {:?}", role);
        self.session.role = Some(role);
        self.session.group.negotiated = true;
        self.session.group.owner = role == Role::Owner;
        match role {
            Role::Owner => Some(P2pEvent::Continue),
            Role::Client => None,
        }
    }

    fn parse_group_started(&mut self) -> Option<P2pEvent> {
        let group = match notification::parse_group_started(self.request.line()) {
            Ok(group) => group,
            Err(err) => {
                tracing::warn!("malformed group started line: {}", err);
                return self.fail(Reason::GroupFormationFailed);
            }
        };
        tracing::info!("group {} started as {:?} with ssid {}", group.ifname, group.role, group.ssid);
        if group.role == Role::Client && self.session.peer.address.is_none() {
            self.session.peer.address = group.go_address;
        }
        self.session.role = Some(group.role);
        self.session.group.owner = group.role == Role::Owner;
        self.session.group.ifname = Some(group.ifname);
        self.session.group.ssid = Some(group.ssid);
        self.session.group.go_address = group.go_address;
        Some(P2pEvent::LinkUp)
    }

    fn link_up(&mut self) -> Option<P2pEvent> {
        if self.session.link_reported {
            return None;
        }
        if self.session.peer.address.is_none() {
            tracing::debug!("group up, waiting for a station to join");
            return None;
        }
        self.session.link_reported = true;
        self.session.target = None;
        self.session.failure = Reason::Success;
        self.session.rendezvous.peer_found.drain();
        self.report_link_up(LinkInfo {
            reason: Reason::Success,
            ssid: self.session.group.ssid.clone(),
            peer_address: self.session.peer.address,
            locally_generated: false,
        });
        None
    }

    fn report_station_joined(&mut self) -> Option<P2pEvent> {
        match notification::parse_station(self.request.line()) {
            Ok(address) => {
                if self.session.peer.address.is_none() {
                    self.session.peer.address = Some(address);
                }
                Some(P2pEvent::LinkUp)
            }
            Err(err) => {
                tracing::warn!("station joined without an address: {}", err);
                None
            }
        }
    }

    fn handle_station_left(&mut self) -> Option<P2pEvent> {
        let address = match notification::parse_station(self.request.line()) {
            Ok(address) => address,
            Err(err) => {
                tracing::warn!("station left without an address: {}", err);
                return None;
            }
        };
        if self.session.peer.address != Some(address) {
            tracing::debug!("station {} left", address);
            return None;
        }
        self.report_link_down(false);
        self.session.peer.address = None;
        if self.session.group.negotiated {
            self.best_effort(&Command::GroupRemove {
                ifname: self.group_ifname(),
            });
        }
        None
    }

    fn report_link_down_line(&mut self) -> Option<P2pEvent> {
        let locally_generated = self.request.line().contains("locally_generated=1");
        self.report_link_down(locally_generated);
        None
    }

    fn clear_group(&mut self) -> Option<P2pEvent> {
        if let Ok(removed) = notification::parse_group_removed(self.request.line()) {
            tracing::info!("group {} removed ({:?})", removed.ifname, removed.reason);
        }
        self.report_link_down(false);
        self.session.clear_group();
        self.session.target = None;
        self.session.awaiting_disconnect = false;
        self.session.rendezvous.disconnected.signal(());
        None
    }

    fn add_group(&mut self) -> Option<P2pEvent> {
        self.session.clear_group();
        self.session.peer = Default::default();
        self.session.peer.go_intent = self.config.go_intent;
        let add = Command::GroupAdd {
            persistent: self.request.group_persistent,
            freq: self.request.group_freq,
        };
        if self.command(&add) {
            self.session.group.owner = true;
            self.session.role = Some(Role::Owner);
            None
        } else {
            self.fail(Reason::OperationFailed)
        }
    }

    fn remove_group(&mut self) -> Option<P2pEvent> {
        self.session.rendezvous.disconnected.drain();
        let remove = Command::GroupRemove {
            ifname: self.group_ifname(),
        };
        if self.command(&remove) {
            self.session.awaiting_disconnect = true;
        }
        None
    }

    fn refuse_disconnect(&mut self) -> Option<P2pEvent> {
        tracing::info!("disconnect refused as group owner, remove the group instead");
        self.request.status = Status::NotAllowed;
        None
    }

    fn complete_disconnect(&mut self) -> Option<P2pEvent> {
        let locally_generated = self.request.line().contains("locally_generated=1");
        self.report_link_down(locally_generated);
        self.session.rendezvous.disconnected.signal(());
        None
    }
}

impl Dispatch<P2pAction, P2pEvent> for Dispatcher<'_> {
    async fn dispatch(&mut self, action: P2pAction) -> Option<P2pEvent> {
        use P2pAction as A;

        match action {
            A::InitSession => self.init_session(),
            A::TerminateStopFind => {
                self.best_effort(&Command::StopFind);
                Some(P2pEvent::Cancel)
            }
            A::TerminateCancel => {
                self.best_effort(&Command::Cancel);
                Some(P2pEvent::Cancel)
            }
            A::TerminateRemoveGroup => self.terminate_remove_group(),
            A::TerminateDisconnect => self.terminate_disconnect(),
            A::TerminateFlush => self.terminate_flush(),
            A::SignalDisconnected => self.signal_disconnected(),
            A::IssueListen => {
                self.command(&Command::Listen);
                None
            }
            A::IssueStopFind => self.issue_stop_find(),
            A::IssueFind => self.issue_find(),
            A::ReportFoundPeer => self.report_found_peer(),
            A::ReportFindTimeout => self.report_find_timeout(),
            A::StartConnectSearch => self.start_connect_search(),
            A::MatchConnectPeer => self.match_connect_peer(),
            A::SignalPeerFound => {
                self.session.rendezvous.peer_found.signal(Ok(()));
                None
            }
            A::FailConnectSearch => {
                self.report_failure(Reason::Timeout);
                None
            }
            A::AbortConnect => self.abort_connect(),
            A::ReportConnectFailure => {
                self.report_failure(Reason::OperationFailed);
                None
            }
            A::SendProvDisc => self.send_prov_disc(),
            A::ParseProvDisc => self.parse_prov_disc(),
            A::ParseProvDiscResponse => self.parse_prov_disc_response(),
            A::AskApplication => self.ask_application(),
            A::RequestDecision => self.request_decision(),
            A::SendConnect => self.send_connect(),
            A::AbandonConnect => self.abandon_connect(),
            A::AnswerNegotiation => self.answer_negotiation().await,
            A::RejectUnsolicited => self.reject_unsolicited(),
            A::RecordRole => self.record_role(),
            A::ParseGroupStarted => self.parse_group_started(),
            A::ReportLinkUp => self.link_up(),
            A::ReportStationJoined => self.report_station_joined(),
            A::HandleStationLeft => self.handle_station_left(),
            A::ReportLinkDown => self.report_link_down_line(),
            A::ClearGroup => self.clear_group(),
            A::AddGroup => self.add_group(),
            A::RemoveGroup => self.remove_group(),
            A::DisconnectLink => self.remove_group(),
            A::RefuseDisconnect => self.refuse_disconnect(),
            A::CompleteDisconnect => self.complete_disconnect(),
        }
    }
}
