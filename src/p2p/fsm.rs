//! States, events, actions and the transition table of the P2P protocol.

use crate::builder::{BuildError, TableBuilder};
use crate::engine::{EngineError, TransitionTable};
use crate::{action_enum, event_enum, state_enum};
use std::sync::{Arc, OnceLock};

state_enum! {
    /// Protocol state of a driver.
    pub enum P2pState {
        /// Before `Start` and after `Stop`
        Stopped,
        Idle,
        Listening,
        Finding,
        ConnectOutSearching,
        ConnectOutFound,
        ConnectOutProvDiscSent,
        ConnectInProvDiscReceived,
        ConnectInAwaitingDecision,
        /// GO negotiation in progress, either direction
        Negotiating,
        GroupFormingAsClient,
        GroupFormingAsOwner,
        GroupOwnerFormed,
        GroupMemberFormed,
        Connected,
        Disconnecting,
        TerminatingStopFind,
        TerminatingCancel,
        TerminatingRemoveGroup,
        TerminatingDisconnect,
    }
}

event_enum! {
    pub enum P2pEvent {
        Start,
        Stop,
        Listen,
        StopListen,
        Find,
        StopFind,
        Found,
        FindTimeout,
        ProvDisc,
        Continue,
        Accept,
        Reject,
        NegotiationRequest,
        NegotiationSuccess,
        Connect,
        ConnectFailed,
        FoundCorrectPeer,
        GroupStarted,
        GroupRemoved,
        AddGroup,
        RemoveGroup,
        PeerConnected,
        PeerDisconnected,
        LinkUp,
        Cancel,
        Disconnect,
    }
}

action_enum! {
    pub enum P2pAction {
        InitSession,
        TerminateStopFind,
        TerminateCancel,
        TerminateRemoveGroup,
        TerminateDisconnect,
        TerminateFlush,
        SignalDisconnected,
        IssueListen,
        IssueStopFind,
        IssueFind,
        ReportFoundPeer,
        ReportFindTimeout,
        StartConnectSearch,
        MatchConnectPeer,
        SignalPeerFound,
        FailConnectSearch,
        AbortConnect,
        ReportConnectFailure,
        SendProvDisc,
        ParseProvDisc,
        ParseProvDiscResponse,
        AskApplication,
        RequestDecision,
        SendConnect,
        AbandonConnect,
        AnswerNegotiation,
        RejectUnsolicited,
        RecordRole,
        ParseGroupStarted,
        ReportLinkUp,
        ReportStationJoined,
        HandleStationLeft,
        ReportLinkDown,
        ClearGroup,
        AddGroup,
        RemoveGroup,
        DisconnectLink,
        RefuseDisconnect,
        CompleteDisconnect,
    }
}

pub type P2pTable = TransitionTable<P2pState, P2pEvent, P2pAction>;
pub type P2pEngineError = EngineError<P2pState, P2pEvent, P2pAction>;

use P2pAction as A;
use P2pEvent as E;
use P2pState as S;

/// States where discovery commands are accepted.
const DISCOVERY: &[P2pState] = &[S::Idle, S::Listening, S::Finding];

/// States between the first connect step and a formed group.
const CONNECTING: &[P2pState] = &[
    S::ConnectOutFound,
    S::ConnectOutProvDiscSent,
    S::ConnectInProvDiscReceived,
    S::ConnectInAwaitingDecision,
    S::Negotiating,
    S::GroupFormingAsClient,
    S::GroupFormingAsOwner,
];

const FORMED: &[P2pState] = &[S::GroupOwnerFormed, S::GroupMemberFormed, S::Connected];

const TERMINATING: &[P2pState] = &[
    S::TerminatingStopFind,
    S::TerminatingCancel,
    S::TerminatingRemoveGroup,
    S::TerminatingDisconnect,
];

/// Every state in which `Stop` starts the terminate sequence.
fn started() -> Vec<P2pState> {
    P2pState::ALL
        .iter()
        .copied()
        .filter(|s| *s != S::Stopped && !TERMINATING.contains(s))
        .collect()
}

/// Assemble and validate the protocol table.
pub fn build_table() -> Result<P2pTable, BuildError> {
    let forming_or_formed: Vec<P2pState> = [S::GroupFormingAsClient, S::GroupFormingAsOwner]
        .into_iter()
        .chain(FORMED.iter().copied())
        .collect();
    let group_removable: Vec<P2pState> = [S::GroupFormingAsOwner]
        .into_iter()
        .chain(FORMED.iter().copied())
        .collect();
    let mut cancellable = vec![S::ConnectOutSearching];
    cancellable.extend_from_slice(CONNECTING);
    let mut failing: Vec<P2pState> = CONNECTING.to_vec();
    failing.extend([S::GroupOwnerFormed, S::GroupMemberFormed]);

    TableBuilder::new()
        // lifecycle
        .add(S::Stopped, E::Start, Some(A::InitSession), S::Idle)
        .from_each(&started(), E::Stop, Some(A::TerminateStopFind), S::TerminatingStopFind)
        .add(S::TerminatingStopFind, E::Cancel, Some(A::TerminateCancel), S::TerminatingCancel)
        .add(S::TerminatingCancel, E::Cancel, Some(A::TerminateRemoveGroup), S::TerminatingRemoveGroup)
        .add(S::TerminatingRemoveGroup, E::Cancel, Some(A::TerminateDisconnect), S::TerminatingDisconnect)
        .add(S::TerminatingDisconnect, E::Cancel, Some(A::TerminateFlush), S::Stopped)
        .add(S::TerminatingDisconnect, E::PeerDisconnected, Some(A::SignalDisconnected), S::TerminatingDisconnect)
        .add(S::TerminatingDisconnect, E::GroupRemoved, Some(A::SignalDisconnected), S::TerminatingDisconnect)
        // discovery
        .from_each(&[S::Idle, S::Finding], E::Listen, Some(A::IssueListen), S::Listening)
        .add(S::Listening, E::StopListen, Some(A::IssueStopFind), S::Idle)
        .add(S::Listening, E::FindTimeout, None, S::Idle)
        .from_each(DISCOVERY, E::Find, Some(A::IssueFind), S::Finding)
        .add(S::Finding, E::StopFind, Some(A::IssueStopFind), S::Idle)
        .add(S::Finding, E::Found, Some(A::ReportFoundPeer), S::Finding)
        .add(S::Finding, E::FoundCorrectPeer, Some(A::SignalPeerFound), S::ConnectOutFound)
        .add(S::Finding, E::FindTimeout, Some(A::ReportFindTimeout), S::Idle)
        .within_each(&[S::Idle, S::Listening], E::Found, None)
        .add(S::Idle, E::FindTimeout, None, S::Idle)
        .within_each(DISCOVERY, E::GroupRemoved, None)
        .within_each(DISCOVERY, E::NegotiationRequest, Some(A::RejectUnsolicited))
        // outgoing connect
        .from_each(DISCOVERY, E::Connect, Some(A::StartConnectSearch), S::ConnectOutSearching)
        .add(S::ConnectOutSearching, E::Found, Some(A::MatchConnectPeer), S::ConnectOutSearching)
        .add(S::ConnectOutSearching, E::FoundCorrectPeer, Some(A::SignalPeerFound), S::ConnectOutFound)
        .add(S::ConnectOutSearching, E::FindTimeout, Some(A::FailConnectSearch), S::Idle)
        .add(S::ConnectOutSearching, E::ConnectFailed, Some(A::FailConnectSearch), S::Idle)
        .add(S::ConnectOutSearching, E::StopFind, Some(A::AbortConnect), S::Idle)
        .add(S::ConnectOutFound, E::Connect, Some(A::SendProvDisc), S::ConnectOutProvDiscSent)
        .add(S::ConnectOutFound, E::StopFind, None, S::Idle)
        .within_each(
            &[
                S::ConnectOutFound,
                S::ConnectOutProvDiscSent,
                S::Negotiating,
                S::GroupFormingAsClient,
                S::GroupFormingAsOwner,
            ],
            E::FindTimeout,
            None,
        )
        .add(S::ConnectOutProvDiscSent, E::ProvDisc, Some(A::ParseProvDiscResponse), S::ConnectOutProvDiscSent)
        .add(S::ConnectOutProvDiscSent, E::Continue, Some(A::AskApplication), S::ConnectOutProvDiscSent)
        .add(S::ConnectOutProvDiscSent, E::Accept, Some(A::SendConnect), S::Negotiating)
        .add(S::ConnectOutProvDiscSent, E::Reject, Some(A::AbandonConnect), S::Idle)
        // incoming connect
        .from_each(DISCOVERY, E::ProvDisc, Some(A::ParseProvDisc), S::ConnectInProvDiscReceived)
        .add(S::ConnectOutFound, E::ProvDisc, Some(A::ParseProvDisc), S::ConnectInProvDiscReceived)
        .add(S::ConnectInProvDiscReceived, E::Continue, Some(A::RequestDecision), S::ConnectInAwaitingDecision)
        .from_each(
            &[S::ConnectInProvDiscReceived, S::ConnectInAwaitingDecision],
            E::NegotiationRequest,
            Some(A::AnswerNegotiation),
            S::Negotiating,
        )
        .add(S::Negotiating, E::NegotiationRequest, Some(A::AnswerNegotiation), S::Negotiating)
        // negotiation and group formation
        .from_each(
            &[S::Negotiating, S::ConnectOutFound, S::ConnectOutProvDiscSent],
            E::NegotiationSuccess,
            Some(A::RecordRole),
            S::GroupFormingAsClient,
        )
        .add(S::GroupFormingAsClient, E::Continue, None, S::GroupFormingAsOwner)
        .add(S::GroupFormingAsClient, E::GroupStarted, Some(A::ParseGroupStarted), S::GroupMemberFormed)
        .add(S::GroupFormingAsOwner, E::GroupStarted, Some(A::ParseGroupStarted), S::GroupOwnerFormed)
        .within_each(&[S::GroupFormingAsClient, S::GroupFormingAsOwner], E::PeerConnected, None)
        .from_each(DISCOVERY, E::AddGroup, Some(A::AddGroup), S::GroupFormingAsOwner)
        // formed groups
        .within_each(
            &[S::GroupOwnerFormed, S::GroupMemberFormed, S::Connected],
            E::LinkUp,
            Some(A::ReportLinkUp),
        )
        .add(S::GroupMemberFormed, E::PeerConnected, None, S::Connected)
        .add(S::Connected, E::PeerConnected, None, S::Connected)
        .add(S::GroupOwnerFormed, E::PeerConnected, Some(A::ReportStationJoined), S::GroupOwnerFormed)
        .add(S::GroupOwnerFormed, E::PeerDisconnected, Some(A::HandleStationLeft), S::GroupOwnerFormed)
        .within_each(&[S::GroupMemberFormed, S::Connected], E::PeerDisconnected, Some(A::ReportLinkDown))
        .add(S::GroupOwnerFormed, E::Disconnect, Some(A::RefuseDisconnect), S::GroupOwnerFormed)
        .from_each(&[S::GroupMemberFormed, S::Connected], E::Disconnect, Some(A::DisconnectLink), S::Disconnecting)
        .from_each(&group_removable, E::RemoveGroup, Some(A::RemoveGroup), S::Disconnecting)
        .from_each(&forming_or_formed, E::GroupRemoved, Some(A::ClearGroup), S::Idle)
        .add(S::Disconnecting, E::PeerDisconnected, Some(A::CompleteDisconnect), S::Disconnecting)
        .add(S::Disconnecting, E::GroupRemoved, Some(A::ClearGroup), S::Idle)
        // failures
        .from_each(&failing, E::ConnectFailed, Some(A::ReportConnectFailure), S::Idle)
        .from_each(&cancellable, E::Cancel, Some(A::AbortConnect), S::Idle)
        .build()
}

/// The process-wide protocol table, built on first use.
pub fn table() -> Result<Arc<P2pTable>, BuildError> {
    static TABLE: OnceLock<Result<Arc<P2pTable>, BuildError>> = OnceLock::new();
    TABLE.get_or_init(|| build_table().map(Arc::new)).clone()
}
