//! The public operation surface of a P2P instance.
//!
//! Every operation and every notification is serialized by one
//! `tokio::sync::Mutex`. Operations that wait on the peer (`connect`,
//! `disconnect`, `stop`) issue their command under the lock, release it, and
//! await a rendezvous before re-acquiring it.

use chrono::Utc;
use crate::core::StateHistory;
use crate::engine::{EngineError, StateMachine};
use crate::p2p::command::{self, channel_to_freq, Command, ControlChannel};
use crate::p2p::config::{DriverConfig, MAX_SSID_POSTFIX_LEN};
use crate::p2p::error::{DriverError, RendezvousError};
use crate::p2p::fsm::{self, P2pAction, P2pEngineError, P2pEvent, P2pState};
use crate::p2p::handlers::{Callbacks, Dispatcher, Request};
use crate::p2p::notification;
use crate::p2p::session::Session;
use crate::p2p::types::{
    ConfigMethod, ConnectionRequest, ConnectionResponse, FindResult, LinkInfo, MacAddress, Reason,
    Status,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;

/// Longest device name the supplicant accepts.
pub const MAX_DEVICE_NAME_LEN: usize = 32;

struct Inner {
    machine: StateMachine<P2pState, P2pEvent, P2pAction>,
    session: Option<Session>,
    callbacks: Callbacks,
}

pub struct Driver {
    control: Arc<dyn ControlChannel>,
    config: DriverConfig,
    inner: Mutex<Inner>,
}

impl Driver {
    /// Create a stopped driver talking to the supplicant through `control`.
    pub fn new(control: Arc<dyn ControlChannel>, config: DriverConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let table = fsm::table()?;
        let history = StateHistory::with_capacity(config.history_capacity);
        Ok(Self {
            control,
            config,
            inner: Mutex::new(Inner {
                machine: StateMachine::with_history(table, P2pState::Stopped, history),
                session: None,
                callbacks: Callbacks::default(),
            }),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run the engine for `event` with the lock held.
    async fn fire(
        &self,
        inner: &mut Inner,
        event: P2pEvent,
        request: &mut Request,
    ) -> Result<Status, P2pEngineError> {
        let Inner {
            machine,
            session,
            callbacks,
        } = inner;
        let Some(session) = session.as_mut() else {
            tracing::debug!("{} ignored, P2P instance not started", event);
            return Ok(Status::Error);
        };

        let span = tracing::debug_span!("p2p", session = %session.id());
        let mut dispatcher = Dispatcher::new(session, request, callbacks, self.control.as_ref(), &self.config);
        let result = machine.fire(event, &mut dispatcher).instrument(span).await;

        if machine.current_state() == P2pState::Stopped {
            Self::retire(inner);
        }
        match result {
            Ok(_) => Ok(request.status),
            Err(err) => {
                match &err {
                    EngineError::Unhandled { .. } => tracing::debug!("{}", err),
                    EngineError::CascadeLimit { .. } => tracing::warn!("{}", err),
                }
                Err(err)
            }
        }
    }

    async fn feed(&self, inner: &mut Inner, event: P2pEvent, request: &mut Request) -> Status {
        self.fire(inner, event, request).await.unwrap_or(Status::Error)
    }

    /// Lock, run one event with a fresh request context, and return its status.
    async fn run(&self, event: P2pEvent, mut request: Request) -> Status {
        let mut inner = self.inner.lock().await;
        self.feed(&mut inner, event, &mut request).await
    }

    /// Drop the session and wake anything still waiting on it.
    fn retire(inner: &mut Inner) {
        if let Some(session) = inner.session.take() {
            session.rendezvous.release();
            let uptime = Utc::now() - session.started_at();
            tracing::info!("P2P instance {} stopped after {}s", session.id(), uptime.num_seconds());
        }
    }

    /// Create the protocol instance.
    pub async fn start(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().await;
        if inner.session.is_some() || inner.machine.current_state() != P2pState::Stopped {
            return Err(DriverError::AlreadyStarted);
        }
        inner.session = Some(Session::new(self.config.go_intent));

        let mut request = Request::default();
        let result = self.fire(&mut inner, P2pEvent::Start, &mut request).await;
        if let Some(err) = request.rejected.take() {
            Self::retire(&mut inner);
            return Err(DriverError::Rejected(err));
        }
        if let Err(err) = result {
            Self::retire(&mut inner);
            return Err(DriverError::NotAccepted(err.to_string()));
        }
        if let Some(session) = &inner.session {
            tracing::info!("P2P instance {} started", session.id());
        }
        Ok(())
    }

    /// Tear the instance down. Stopping a stopped driver succeeds.
    pub async fn stop(&self) -> Status {
        let slot = {
            let mut inner = self.inner.lock().await;
            let state = inner.machine.current_state();
            if inner.session.is_none() {
                tracing::debug!("stop: P2P instance not started");
                return Status::Success;
            }
            if is_terminating(state) {
                tracing::debug!("stop: already terminating");
                return Status::Success;
            }

            let status = self.feed(&mut inner, P2pEvent::Stop, &mut Request::default()).await;
            match &inner.session {
                None => return status,
                Some(session) if session.awaiting_disconnect => session.rendezvous.disconnected.clone(),
                Some(_) => return Status::Error,
            }
        };

        if let Err(err) = slot.wait(self.config.disconnect_wait()).await {
            tracing::warn!("stop: link teardown not confirmed: {}", err);
        }

        let mut inner = self.inner.lock().await;
        if inner.machine.current_state() != P2pState::TerminatingDisconnect {
            return Status::Success;
        }
        self.feed(&mut inner, P2pEvent::Cancel, &mut Request::default()).await
    }

    /// Set the advertised device name and the SSID postfix derived from it.
    pub async fn set_device_name(&self, name: &str) -> Status {
        if name.is_empty() || name.len() > MAX_DEVICE_NAME_LEN {
            return Status::ParamFailed;
        }
        let inner = self.inner.lock().await;
        if inner.session.is_none() {
            return Status::Error;
        }

        let postfix = ssid_postfix(&self.config.ssid_postfix, name);
        let commands = [Command::SetDeviceName(name.to_string()), Command::SetSsidPostfix(postfix)];
        for command in &commands {
            if let Err(err) = command::send(self.control.as_ref(), command) {
                tracing::warn!("set_device_name: {}", err);
                return Status::Error;
            }
        }
        Status::Success
    }

    pub async fn listen(&self) -> Status {
        self.run(P2pEvent::Listen, Request::default()).await
    }

    pub async fn stop_listen(&self) -> Status {
        self.run(P2pEvent::StopListen, Request::default()).await
    }

    /// Start discovery. A `timeout` of zero lets the supplicant search until
    /// stopped; with `address` only that peer is reported and the instance
    /// moves on to connecting once it is seen.
    pub async fn find(&self, timeout: u32, address: Option<&str>) -> Status {
        let target = match address.map(str::parse::<MacAddress>).transpose() {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!("find: {}", err);
                return Status::ParamFailed;
            }
        };
        let request = Request {
            find_timeout: (timeout > 0).then_some(timeout),
            find_target: target,
            ..Request::default()
        };
        self.run(P2pEvent::Find, request).await
    }

    pub async fn stop_find(&self) -> Status {
        self.run(P2pEvent::StopFind, Request::default()).await
    }

    /// Start an autonomous group. Channel 0 lets the supplicant pick.
    pub async fn create_group(&self, channel: u8, persistent: bool) -> Status {
        if persistent {
            return Status::NotSupported;
        }
        let freq = match channel_to_freq(channel) {
            Ok(freq) => freq,
            Err(channel) => {
                tracing::warn!("create_group: invalid channel {}", channel);
                return Status::ParamFailed;
            }
        };
        let request = Request {
            group_freq: freq,
            group_persistent: persistent,
            ..Request::default()
        };
        self.run(P2pEvent::AddGroup, request).await
    }

    pub async fn remove_group(&self) -> Status {
        self.run(P2pEvent::RemoveGroup, Request::default()).await
    }

    /// Connect to the peer at `address`.
    ///
    /// Issues a targeted find, waits outside the lock until the peer is seen,
    /// then sends provision discovery. The outcome of the negotiation that
    /// follows is reported through the link callbacks.
    pub async fn connect(&self, address: &str, method: ConfigMethod) -> Status {
        let address: MacAddress = match address.parse() {
            Ok(address) => address,
            Err(err) => {
                tracing::warn!("connect: {}", err);
                return Status::ParamFailed;
            }
        };

        let slot = {
            let mut inner = self.inner.lock().await;
            let state = inner.machine.current_state();
            if !inner.machine.table().handles(state, P2pEvent::Connect) {
                tracing::debug!("connect not possible in state {}", state);
                return Status::Error;
            }
            let Some(session) = inner.session.as_mut() else {
                return Status::Error;
            };
            session.prepare_outgoing(address, method, &self.config);
            let slot = session.rendezvous.peer_found.clone();

            let status = self.feed(&mut inner, P2pEvent::Connect, &mut Request::default()).await;
            // Peer already found by a targeted find: provision discovery went out.
            if !status.is_success() || state == P2pState::ConnectOutFound {
                return status;
            }
            match inner.machine.current_state() {
                P2pState::ConnectOutSearching => slot,
                P2pState::ConnectOutFound => {
                    return self.feed(&mut inner, P2pEvent::Connect, &mut Request::default()).await;
                }
                _ => return Status::Error,
            }
        };

        match slot.wait(self.config.connect_wait()).await {
            Ok(Ok(())) => {
                let mut inner = self.inner.lock().await;
                if inner.machine.current_state() != P2pState::ConnectOutFound {
                    return Status::Error;
                }
                self.feed(&mut inner, P2pEvent::Connect, &mut Request::default()).await
            }
            Ok(Err(reason)) => {
                tracing::info!("connect to {} failed: {:?}", address, reason);
                Status::Error
            }
            Err(RendezvousError::Timeout(wait)) => {
                tracing::warn!("connect: {} not found within {:?}", address, wait);
                let mut inner = self.inner.lock().await;
                if inner.machine.current_state() == P2pState::ConnectOutSearching {
                    if let Some(session) = inner.session.as_mut() {
                        session.failure = Reason::Timeout;
                    }
                    self.feed(&mut inner, P2pEvent::Cancel, &mut Request::default()).await;
                }
                Status::Error
            }
            Err(RendezvousError::Released) => Status::Error,
        }
    }

    /// Leave the group we joined as a client and wait for the link to drop.
    ///
    /// A group owner gets [`Status::NotAllowed`] and should call
    /// [`remove_group`](Self::remove_group) instead.
    pub async fn disconnect(&self) -> Status {
        let slot = {
            let mut inner = self.inner.lock().await;
            let status = self.feed(&mut inner, P2pEvent::Disconnect, &mut Request::default()).await;
            if !status.is_success() {
                return status;
            }
            match &inner.session {
                Some(session) if session.awaiting_disconnect => session.rendezvous.disconnected.clone(),
                _ => return Status::Success,
            }
        };

        match slot.wait(self.config.disconnect_wait()).await {
            Ok(()) => Status::Success,
            Err(err) => {
                tracing::warn!("disconnect: {}", err);
                Status::Error
            }
        }
    }

    pub async fn register_find_callback<F>(&self, callback: F) -> Status
    where
        F: Fn(&FindResult) + Send + Sync + 'static,
    {
        self.inner.lock().await.callbacks.find = Some(Arc::new(callback));
        Status::Success
    }

    pub async fn register_connection_handler<F>(&self, handler: F) -> Status
    where
        F: Fn(&ConnectionRequest) -> ConnectionResponse + Send + Sync + 'static,
    {
        self.inner.lock().await.callbacks.connection = Some(Arc::new(handler));
        Status::Success
    }

    pub async fn register_link_callback<U, D>(&self, up: U, down: D) -> Status
    where
        U: Fn(&LinkInfo) + Send + Sync + 'static,
        D: Fn(&LinkInfo) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().await;
        inner.callbacks.link_up = Some(Arc::new(up));
        inner.callbacks.link_down = Some(Arc::new(down));
        Status::Success
    }

    /// Feed one line from the notification monitor.
    ///
    /// Lines without a known marker are ignored. Returns `Error` when the
    /// line's event is not handled in the current state.
    pub async fn handle_notification(&self, line: &str) -> Status {
        let Some(classified) = notification::classify(line) else {
            tracing::trace!("unclassified notification: {}", line);
            return Status::Success;
        };
        let mut inner = self.inner.lock().await;
        if let (Some(reason), Some(session)) = (classified.reason, inner.session.as_mut()) {
            session.failure = reason;
        }
        let mut request = Request::notification(line);
        self.feed(&mut inner, classified.event, &mut request).await
    }

    pub async fn state(&self) -> P2pState {
        self.inner.lock().await.machine.current_state()
    }

    pub async fn history(&self) -> StateHistory<P2pState, P2pEvent> {
        self.inner.lock().await.machine.history().clone()
    }

    /// Id of the running protocol instance.
    pub async fn session_id(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.session.as_ref().map(|session| session.id().to_string())
    }
}

fn is_terminating(state: P2pState) -> bool {
    matches!(
        state,
        P2pState::TerminatingStopFind
            | P2pState::TerminatingCancel
            | P2pState::TerminatingRemoveGroup
            | P2pState::TerminatingDisconnect
    )
}

/// `-<prefix>-<name>`, cropped to what the supplicant accepts.
fn ssid_postfix(prefix: &str, name: &str) -> String {
    let postfix = if prefix.is_empty() {
        format!("-{name}")
    } else {
        format!("-{prefix}-{name}")
    };
    let mut end = postfix.len().min(MAX_SSID_POSTFIX_LEN);
    while !postfix.is_char_boundary(end) {
        end -= 1;
    }
    postfix[..end].to_string()
}
