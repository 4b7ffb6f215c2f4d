//! Dynamic channel state machines
//!
//! This module provides the per-channel connection and configuration state
//! machine for BR/EDR connection-oriented channels: Connection
//! Request/Response, Configuration Request/Response (including continuation
//! fragments and Unacceptable Parameters recovery), ERTM negotiation, and
//! Disconnection.

use bitflags::bitflags;
use log::{debug, info, trace, warn};

use crate::config::{ChannelConfiguration, RetransmissionFlowControl, RfcMode};
use crate::constants::*;
use crate::psm::Psm;
use crate::registry::ChannelContext;
use crate::signaling::{
    ConfigurationResponder, ConfigurationResult, ConnectionResponder, ConnectionResult,
    ConnectionStatus, DisconnectionResponder, ResponseHandlerAction, SignalingRequest,
};
use crate::types::{
    ChannelId, ChannelInfo, ChannelMode, ChannelParameters, CloseDoneCallback, OpenResultCallback,
};

bitflags! {
    /// Progress flags for a BR/EDR dynamic channel. Set monotonically;
    /// `DISCONNECTED` is terminal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct ChannelState: u8 {
        /// Connection Request sent (outbound) or received (inbound)
        const CONN_REQUESTED = 1 << 0;
        /// Connection Response received (outbound) or sent (inbound)
        const CONN_RESPONDED = 1 << 1;
        /// Local Configuration Request sent
        const LOCAL_CONFIG_SENT = 1 << 2;
        /// Local Configuration Request accepted by the peer
        const LOCAL_CONFIG_ACCEPTED = 1 << 3;
        /// Complete Configuration Request received from the peer
        const REMOTE_CONFIG_RECEIVED = 1 << 4;
        /// Peer's Configuration Request accepted by us
        const REMOTE_CONFIG_ACCEPTED = 1 << 5;
        /// Channel is disconnected (terminal)
        const DISCONNECTED = 1 << 6;
    }
}

/// Who initiated the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outbound,
    Inbound,
}

/// Registry-level follow-up required after a channel event.
///
/// Channels schedule their own user callbacks; this tells the owning
/// registry what bookkeeping remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Disposition {
    /// Nothing to do
    #[default]
    None,
    /// The channel opened
    Opened,
    /// The open attempt reached a terminal failure; remove the channel
    /// unless a disconnect handshake is still in flight
    OpenFailed,
    /// The peer closed the channel; fire the registry close callback iff
    /// the channel had opened, then remove it
    RemoteDisconnected,
    /// A locally initiated disconnect completed; remove the channel
    DisconnectComplete,
}

impl Disposition {
    /// Combine two follow-ups from one event, keeping the first significant one
    pub(crate) fn or(self, other: Disposition) -> Disposition {
        match self {
            Disposition::None => other,
            _ => self,
        }
    }
}

/// Identity and lifecycle state common to every dynamic channel.
///
/// `local_cid` is immutable once assigned; `remote_cid` is set exactly once,
/// when the peer's endpoint is learned. `opened` latches true the first time
/// the channel becomes open and is what gates the registry close callback.
#[derive(Debug)]
pub struct DynamicChannel {
    psm: Psm,
    local_cid: ChannelId,
    remote_cid: ChannelId,
    opened: bool,
}

impl DynamicChannel {
    fn new(psm: Psm, local_cid: ChannelId, remote_cid: ChannelId) -> Self {
        Self {
            psm,
            local_cid,
            remote_cid,
            opened: false,
        }
    }

    /// Get the Protocol/Service Multiplexer
    pub fn psm(&self) -> Psm {
        self.psm
    }

    /// Get the local Channel Identifier
    pub fn local_cid(&self) -> ChannelId {
        self.local_cid
    }

    /// Get the remote Channel Identifier (invalid until learned)
    pub fn remote_cid(&self) -> ChannelId {
        self.remote_cid
    }

    /// Whether this channel ever finished opening
    pub fn opened(&self) -> bool {
        self.opened
    }

    fn set_remote_cid(&mut self, remote_cid: ChannelId) {
        if self.remote_cid != INVALID_CHANNEL_ID && self.remote_cid != remote_cid {
            warn!(
                "L2CAP ignoring remote CID reassignment 0x{:04X} -> 0x{:04X} for channel 0x{:04X}",
                self.remote_cid, remote_cid, self.local_cid
            );
            return;
        }
        self.remote_cid = remote_cid;
    }
}

/// Connection and configuration state machine for one BR/EDR dynamic channel.
///
/// Owned exclusively by the registry; every transition runs synchronously
/// within one signaling callback or registry entry point.
pub struct BrEdrDynamicChannel {
    base: DynamicChannel,
    direction: Direction,
    state: ChannelState,
    parameters: ChannelParameters,
    peer_supports_ertm: Option<bool>,
    /// Options we sent and the peer accepted (with its adjustments folded in)
    local_config: ChannelConfiguration,
    /// Options the peer sent and we accepted
    remote_config: ChannelConfiguration,
    /// Accumulator for a fragmented peer Configuration Request
    remote_config_accum: Option<ChannelConfiguration>,
    open_result_cb: Option<OpenResultCallback>,
    /// Whether a failed open is reported through the open callback
    /// (outbound yes; inbound failures are silent to the service)
    relay_failure: bool,
    /// One Pending connection response is tolerated; the next is final
    conn_pending_seen: bool,
    /// Unacceptable Parameters recovery is permitted exactly once
    config_recovery_attempted: bool,
    undesired_mode_config_requests: u8,
    /// Completions to run when the in-flight disconnect handshake finishes
    disconnect_done_cbs: Vec<CloseDoneCallback>,
    awaiting_disconnect_rsp: bool,
}

impl BrEdrDynamicChannel {
    pub(crate) fn new_outbound(
        psm: Psm,
        local_cid: ChannelId,
        parameters: ChannelParameters,
        peer_supports_ertm: Option<bool>,
    ) -> Self {
        Self {
            base: DynamicChannel::new(psm, local_cid, INVALID_CHANNEL_ID),
            direction: Direction::Outbound,
            state: ChannelState::empty(),
            parameters,
            peer_supports_ertm,
            local_config: ChannelConfiguration::default(),
            remote_config: ChannelConfiguration::default(),
            remote_config_accum: None,
            open_result_cb: None,
            relay_failure: true,
            conn_pending_seen: false,
            config_recovery_attempted: false,
            undesired_mode_config_requests: 0,
            disconnect_done_cbs: Vec::new(),
            awaiting_disconnect_rsp: false,
        }
    }

    pub(crate) fn new_inbound(
        psm: Psm,
        local_cid: ChannelId,
        remote_cid: ChannelId,
        parameters: ChannelParameters,
        peer_supports_ertm: Option<bool>,
    ) -> Self {
        let mut channel = Self::new_outbound(psm, local_cid, parameters, peer_supports_ertm);
        channel.base = DynamicChannel::new(psm, local_cid, remote_cid);
        channel.direction = Direction::Inbound;
        // The triggering Connection Request counts as the request phase.
        channel.state = ChannelState::CONN_REQUESTED;
        channel
    }

    /// Get the Protocol/Service Multiplexer
    pub fn psm(&self) -> Psm {
        self.base.psm()
    }

    /// Get the local Channel Identifier
    pub fn local_cid(&self) -> ChannelId {
        self.base.local_cid()
    }

    /// Get the remote Channel Identifier (invalid until learned)
    pub fn remote_cid(&self) -> ChannelId {
        self.base.remote_cid()
    }

    /// Whether the connection phase completed and the channel has not been
    /// disconnected
    pub fn is_connected(&self) -> bool {
        self.state.contains(ChannelState::CONN_REQUESTED)
            && self.state.contains(ChannelState::CONN_RESPONDED)
            && !self.state.contains(ChannelState::DISCONNECTED)
            && self.remote_cid() != INVALID_CHANNEL_ID
    }

    /// Whether both directions of configuration have been accepted
    fn both_configs_accepted(&self) -> bool {
        self.state.contains(ChannelState::LOCAL_CONFIG_ACCEPTED)
            && self.state.contains(ChannelState::REMOTE_CONFIG_ACCEPTED)
    }

    /// Whether the channel is fully established and usable
    pub fn is_open(&self) -> bool {
        self.is_connected() && self.both_configs_accepted()
    }

    /// Negotiated identity and configuration snapshot. The mode and MTU
    /// fields are meaningful only once the channel is open.
    pub fn info(&self) -> ChannelInfo {
        let mode = match self.local_config.requested_mode() {
            RfcMode::EnhancedRetransmission => ChannelMode::EnhancedRetransmission,
            _ => ChannelMode::Basic,
        };
        ChannelInfo {
            psm: self.psm(),
            local_cid: self.local_cid(),
            remote_cid: self.remote_cid(),
            mode,
            max_tx_sdu_size: self.remote_config.mtu.unwrap_or(DEFAULT_MTU),
            max_rx_sdu_size: self.local_config.mtu.unwrap_or(DEFAULT_MTU),
        }
    }

    pub(crate) fn opened(&self) -> bool {
        self.base.opened()
    }

    pub(crate) fn awaiting_disconnect_rsp(&self) -> bool {
        self.awaiting_disconnect_rsp
    }

    /// Begin the open attempt. Outbound channels send the Connection
    /// Request here; inbound channels proceed when
    /// [`Self::complete_inbound_connection`] runs.
    pub(crate) fn open(
        &mut self,
        open_cb: OpenResultCallback,
        relay_failure: bool,
        cx: &mut ChannelContext<'_>,
    ) -> Disposition {
        self.relay_failure = relay_failure;
        self.open_result_cb = Some(open_cb);
        if self.direction == Direction::Inbound {
            return Disposition::None;
        }

        let request = SignalingRequest::Connection {
            psm: self.psm(),
            source_cid: self.local_cid(),
        };
        let handler = cx.handle.conn_rsp_handler(self.local_cid());
        if !cx.sig.send_request(request, handler) {
            warn!(
                "L2CAP failed to send Connection Request for channel 0x{:04X}",
                self.local_cid()
            );
            self.pass_open_error(cx);
            return Disposition::OpenFailed;
        }
        trace!(
            "L2CAP sent Connection Request for {} on channel 0x{:04X}",
            self.psm(),
            self.local_cid()
        );
        self.state |= ChannelState::CONN_REQUESTED;
        Disposition::None
    }

    /// Answer the triggering Connection Request affirmatively and enter the
    /// configuration phase.
    pub(crate) fn complete_inbound_connection(
        &mut self,
        responder: &mut dyn ConnectionResponder,
        cx: &mut ChannelContext<'_>,
    ) -> Disposition {
        responder.send(
            self.local_cid(),
            ConnectionResult::Success,
            ConnectionStatus::NoInfoAvailable,
        );
        self.state |= ChannelState::CONN_RESPONDED;
        self.try_send_local_config(cx)
    }

    /// Handle a Connection Response. `duplicate_remote_cid` reports whether
    /// the response's destination CID is already assigned to another channel
    /// on this link.
    pub(crate) fn on_connection_response(
        &mut self,
        result: ConnectionResult,
        remote_cid: ChannelId,
        duplicate_remote_cid: bool,
        cx: &mut ChannelContext<'_>,
    ) -> (ResponseHandlerAction, Disposition) {
        if self.state.contains(ChannelState::DISCONNECTED) {
            return (ResponseHandlerAction::Complete, Disposition::None);
        }
        if self.state.contains(ChannelState::CONN_RESPONDED) {
            trace!(
                "L2CAP ignoring extra Connection Response for channel 0x{:04X}",
                self.local_cid()
            );
            return (ResponseHandlerAction::Complete, Disposition::None);
        }

        match result {
            ConnectionResult::Pending if !self.conn_pending_seen => {
                // A CID carried here may not be final; it is ignored.
                self.conn_pending_seen = true;
                trace!(
                    "L2CAP connection pending for channel 0x{:04X}",
                    self.local_cid()
                );
                (ResponseHandlerAction::ExpectAdditional, Disposition::None)
            }
            ConnectionResult::Success => {
                if remote_cid < FIRST_DYNAMIC_CHANNEL_ID || duplicate_remote_cid {
                    warn!(
                        "L2CAP Connection Response carried invalid or duplicate \
                         destination CID 0x{remote_cid:04X}; failing channel 0x{:04X}",
                        self.local_cid()
                    );
                    self.pass_open_error(cx);
                    return (ResponseHandlerAction::Complete, Disposition::OpenFailed);
                }
                self.base.set_remote_cid(remote_cid);
                self.state |= ChannelState::CONN_RESPONDED;
                let disposition = self.try_send_local_config(cx);
                (ResponseHandlerAction::Complete, disposition)
            }
            _ => {
                debug!(
                    "L2CAP connection refused for channel 0x{:04X}: {result:?}",
                    self.local_cid()
                );
                self.pass_open_error(cx);
                (ResponseHandlerAction::Complete, Disposition::OpenFailed)
            }
        }
    }

    /// Handle a transport-level failure (Command Reject or timeout) of the
    /// Connection Request. The peer never owned an endpoint, so no
    /// Disconnection Request is sent.
    pub(crate) fn on_connection_failure(&mut self, cx: &mut ChannelContext<'_>) -> Disposition {
        self.pass_open_error(cx);
        Disposition::OpenFailed
    }

    /// Send our Configuration Request unless local ERTM preference is still
    /// waiting on the peer's extended-features answer.
    fn try_send_local_config(&mut self, cx: &mut ChannelContext<'_>) -> Disposition {
        if self.state.contains(ChannelState::LOCAL_CONFIG_SENT)
            || self.state.contains(ChannelState::DISCONNECTED)
        {
            return Disposition::None;
        }
        if self.is_waiting_for_peer_ertm_support() {
            trace!(
                "L2CAP deferring local configuration of channel 0x{:04X} until \
                 peer ERTM support is known",
                self.local_cid()
            );
            return Disposition::None;
        }
        self.send_local_config(cx)
    }

    fn send_local_config(&mut self, cx: &mut ChannelContext<'_>) -> Disposition {
        let mtu = self.calculate_local_mtu();
        let rfc = if self.should_request_enhanced_retransmission() {
            Some(RetransmissionFlowControl::ertm_request(mtu))
        } else {
            None
        };
        self.local_config = ChannelConfiguration {
            mtu: Some(mtu),
            retransmission_flow_control: rfc,
            ext_window_size: None,
        };
        self.send_config_request(self.local_config, cx)
    }

    fn send_config_request(
        &mut self,
        config: ChannelConfiguration,
        cx: &mut ChannelContext<'_>,
    ) -> Disposition {
        let request = SignalingRequest::Configuration {
            destination_cid: self.remote_cid(),
            flags: 0,
            config,
        };
        let handler = cx.handle.config_rsp_handler(self.local_cid());
        if !cx.sig.send_request(request, handler) {
            warn!(
                "L2CAP failed to send Configuration Request for channel 0x{:04X}",
                self.local_cid()
            );
            self.start_disconnect(cx);
            self.pass_open_error(cx);
            return Disposition::OpenFailed;
        }
        trace!(
            "L2CAP sent Configuration Request for channel 0x{:04X}: {config:?}",
            self.local_cid()
        );
        self.state |= ChannelState::LOCAL_CONFIG_SENT;
        Disposition::None
    }

    /// Handle a Configuration Response to our request.
    pub(crate) fn on_configuration_response(
        &mut self,
        result: ConfigurationResult,
        flags: u16,
        config: ChannelConfiguration,
        cx: &mut ChannelContext<'_>,
    ) -> (ResponseHandlerAction, Disposition) {
        if self.state.contains(ChannelState::DISCONNECTED) {
            return (ResponseHandlerAction::Complete, Disposition::None);
        }
        if flags & 0x0001 != 0 {
            warn!(
                "L2CAP continuation flag in Configuration Response for channel \
                 0x{:04X} not supported; treating response as final",
                self.local_cid()
            );
        }

        match result {
            ConfigurationResult::Success => {
                self.local_config = self.local_config.merge(config);
                self.state |= ChannelState::LOCAL_CONFIG_ACCEPTED;
                let disposition = if self.both_configs_accepted() {
                    self.finish_open(cx)
                } else {
                    Disposition::None
                };
                (ResponseHandlerAction::Complete, disposition)
            }
            ConfigurationResult::Pending => {
                trace!(
                    "L2CAP configuration pending for channel 0x{:04X}",
                    self.local_cid()
                );
                (ResponseHandlerAction::ExpectAdditional, Disposition::None)
            }
            ConfigurationResult::UnacceptableParameters => {
                let disposition = self.try_recover_from_unacceptable_parameters(config, cx);
                (ResponseHandlerAction::Complete, disposition)
            }
            _ => {
                warn!(
                    "L2CAP configuration of channel 0x{:04X} failed: {result:?}",
                    self.local_cid()
                );
                self.start_disconnect(cx);
                self.pass_open_error(cx);
                (ResponseHandlerAction::Complete, Disposition::OpenFailed)
            }
        }
    }

    /// Handle a transport-level failure (Command Reject or timeout) of our
    /// Configuration Request. The channel is connected by this stage, so it
    /// is torn down with a Disconnection Request.
    pub(crate) fn on_configuration_failure(&mut self, cx: &mut ChannelContext<'_>) -> Disposition {
        if self.state.contains(ChannelState::DISCONNECTED) {
            return Disposition::None;
        }
        debug!(
            "L2CAP Configuration Request for channel 0x{:04X} rejected or timed out",
            self.local_cid()
        );
        self.start_disconnect(cx);
        self.pass_open_error(cx);
        Disposition::OpenFailed
    }

    /// Attempt the single permitted recovery from an Unacceptable Parameters
    /// response: fall back from ERTM to Basic mode when the peer's suggested
    /// options say so. Anything else disconnects.
    fn try_recover_from_unacceptable_parameters(
        &mut self,
        rsp_config: ChannelConfiguration,
        cx: &mut ChannelContext<'_>,
    ) -> Disposition {
        let requested_ertm =
            self.local_config.requested_mode() == RfcMode::EnhancedRetransmission;
        let suggested = rsp_config.retransmission_flow_control;
        let recoverable = !self.config_recovery_attempted
            && requested_ertm
            && suggested.is_some_and(|rfc| rfc.mode == RfcMode::Basic);

        if !recoverable {
            warn!(
                "L2CAP unrecoverable Unacceptable Parameters response for channel \
                 0x{:04X} (suggested {suggested:?}); disconnecting",
                self.local_cid()
            );
            self.start_disconnect(cx);
            self.pass_open_error(cx);
            return Disposition::OpenFailed;
        }

        info!(
            "L2CAP peer rejected ERTM for channel 0x{:04X}; falling back to Basic mode",
            self.local_cid()
        );
        self.config_recovery_attempted = true;
        self.local_config = ChannelConfiguration {
            mtu: Some(self.calculate_local_mtu()),
            retransmission_flow_control: Some(RetransmissionFlowControl::basic()),
            ext_window_size: None,
        };
        self.send_config_request(self.local_config, cx)
    }

    /// Handle an inbound Configuration Request, accumulating continuation
    /// fragments until the request is complete.
    pub(crate) fn on_rx_configuration_request(
        &mut self,
        flags: u16,
        config: ChannelConfiguration,
        responder: &mut dyn ConfigurationResponder,
        cx: &mut ChannelContext<'_>,
    ) -> Disposition {
        if self.state.contains(ChannelState::DISCONNECTED) {
            responder.reject_invalid_channel_id();
            return Disposition::None;
        }

        let accumulated = match self.remote_config_accum.take() {
            Some(previous) => previous.merge(config),
            None => config,
        };
        if flags & 0x0001 != 0 {
            // More fragments to come; acknowledge this one.
            self.remote_config_accum = Some(accumulated);
            responder.send(
                self.local_cid(),
                0x0001,
                ConfigurationResult::Success,
                ChannelConfiguration::default(),
            );
            return Disposition::None;
        }

        // A peer proposing ERTM has thereby shown it supports it.
        if accumulated.requested_mode() == RfcMode::EnhancedRetransmission
            && self.peer_supports_ertm.is_none()
        {
            self.peer_supports_ertm = Some(true);
        }

        if let Some(rejection) = self.check_for_unacceptable_config_req_options(&accumulated) {
            self.undesired_mode_config_requests += 1;
            if self.undesired_mode_config_requests > MAX_UNDESIRED_MODE_CONFIG_REQUESTS {
                warn!(
                    "L2CAP peer keeps proposing unacceptable options for channel \
                     0x{:04X}; disconnecting",
                    self.local_cid()
                );
                responder.send(
                    self.local_cid(),
                    0,
                    ConfigurationResult::UnacceptableParameters,
                    rejection,
                );
                self.start_disconnect(cx);
                self.pass_open_error(cx);
                return Disposition::OpenFailed;
            }
            debug!(
                "L2CAP rejecting Configuration Request for channel 0x{:04X} with \
                 suggested options {rejection:?}",
                self.local_cid()
            );
            responder.send(
                self.local_cid(),
                0,
                ConfigurationResult::UnacceptableParameters,
                rejection,
            );
            return Disposition::None;
        }

        responder.send(
            self.local_cid(),
            0,
            ConfigurationResult::Success,
            self.acceptance_response_options(&accumulated),
        );
        self.remote_config = accumulated;
        self.state |= ChannelState::REMOTE_CONFIG_RECEIVED | ChannelState::REMOTE_CONFIG_ACCEPTED;

        // The peer's request may have just resolved ERTM support for a
        // deferred local configuration.
        let disposition = self.try_send_local_config(cx);
        if self.both_configs_accepted() {
            return disposition.or(self.finish_open(cx));
        }
        disposition
    }

    /// Validate a complete inbound Configuration Request. Returns the
    /// suggested options for an Unacceptable Parameters response, or `None`
    /// when the request is acceptable.
    fn check_for_unacceptable_config_req_options(
        &self,
        req: &ChannelConfiguration,
    ) -> Option<ChannelConfiguration> {
        if let Some(mtu) = req.mtu {
            if mtu < MIN_ACL_MTU {
                debug!(
                    "L2CAP peer proposed MTU {mtu} below minimum {MIN_ACL_MTU} for \
                     channel 0x{:04X}",
                    self.local_cid()
                );
                return Some(ChannelConfiguration {
                    mtu: Some(MIN_ACL_MTU),
                    ..ChannelConfiguration::default()
                });
            }
        }
        if let Some(unacceptable) = self.check_for_unacceptable_ertm_options(req) {
            return Some(unacceptable);
        }
        None
    }

    /// Validate the Retransmission and Flow Control option of an inbound
    /// request: only Basic and ERTM are negotiable, and the proposed mode
    /// must match the mode this side intends to operate in.
    fn check_for_unacceptable_ertm_options(
        &self,
        req: &ChannelConfiguration,
    ) -> Option<ChannelConfiguration> {
        let desired = self.desired_mode();
        if req.requested_mode() == desired {
            return None;
        }
        Some(ChannelConfiguration {
            retransmission_flow_control: Some(match desired {
                RfcMode::EnhancedRetransmission => {
                    RetransmissionFlowControl::ertm_request(self.calculate_local_mtu())
                }
                _ => RetransmissionFlowControl::basic(),
            }),
            ..ChannelConfiguration::default()
        })
    }

    /// Options confirmed back to the peer when accepting its request.
    /// An accepted ERTM option is echoed with our timer values filled in,
    /// as the Core Spec requires of the responder.
    fn acceptance_response_options(&self, req: &ChannelConfiguration) -> ChannelConfiguration {
        let rfc = req.retransmission_flow_control.map(|mut rfc| {
            if rfc.mode == RfcMode::EnhancedRetransmission {
                rfc.retransmit_timeout_ms = ERTM_RETRANSMIT_TIMEOUT_MS;
                rfc.monitor_timeout_ms = ERTM_MONITOR_TIMEOUT_MS;
            }
            rfc
        });
        ChannelConfiguration {
            mtu: req.mtu,
            retransmission_flow_control: rfc,
            ext_window_size: None,
        }
    }

    /// Record the link-level answer on ERTM support and unblock a deferred
    /// local configuration. A peer that already proactively requested ERTM
    /// is not downgraded by a later negative answer.
    pub(crate) fn set_enhanced_retransmission_support(
        &mut self,
        supported: bool,
        cx: &mut ChannelContext<'_>,
    ) -> Disposition {
        if self.peer_supports_ertm.is_none() {
            self.peer_supports_ertm = Some(supported);
        }
        if self.is_connected() {
            return self.try_send_local_config(cx);
        }
        Disposition::None
    }

    /// Locally initiated disconnect. `done_cb` fires when the handshake
    /// completes (immediately if the channel never connected); a close while
    /// a handshake is already in flight joins the pending completion. Never
    /// fires the open callback or the registry close callback.
    pub(crate) fn disconnect(
        &mut self,
        done_cb: CloseDoneCallback,
        cx: &mut ChannelContext<'_>,
    ) -> Disposition {
        // The open attempt, if still pending, is abandoned without a result.
        self.open_result_cb = None;

        if self.awaiting_disconnect_rsp {
            // The entry must survive until the Disconnection Response so the
            // CID is not reallocated mid-handshake.
            self.disconnect_done_cbs.push(done_cb);
            return Disposition::None;
        }

        if !self.is_connected() {
            self.state |= ChannelState::DISCONNECTED;
            cx.actions.push(done_cb);
            return Disposition::DisconnectComplete;
        }

        let request = SignalingRequest::Disconnection {
            destination_cid: self.remote_cid(),
            source_cid: self.local_cid(),
        };
        let handler = cx.handle.discon_rsp_handler(self.local_cid());
        self.state |= ChannelState::DISCONNECTED;
        if !cx.sig.send_request(request, handler) {
            warn!(
                "L2CAP failed to send Disconnection Request for channel 0x{:04X}",
                self.local_cid()
            );
            cx.actions.push(done_cb);
            return Disposition::DisconnectComplete;
        }
        debug!(
            "L2CAP disconnecting channel 0x{:04X}",
            self.local_cid()
        );
        self.disconnect_done_cbs.push(done_cb);
        self.awaiting_disconnect_rsp = true;
        Disposition::None
    }

    /// Completion of a locally initiated disconnect handshake. Reject and
    /// timeout outcomes complete it just like a Disconnection Response.
    pub(crate) fn on_disconnect_complete(&mut self, cx: &mut ChannelContext<'_>) -> Disposition {
        self.awaiting_disconnect_rsp = false;
        for done_cb in self.disconnect_done_cbs.drain(..) {
            cx.actions.push(done_cb);
        }
        Disposition::DisconnectComplete
    }

    /// Handle an inbound Disconnection Request: reply affirmatively and
    /// tear down. A still-pending open attempt fails here.
    pub(crate) fn on_rx_disconnection_request(
        &mut self,
        responder: &mut dyn DisconnectionResponder,
        cx: &mut ChannelContext<'_>,
    ) -> Disposition {
        responder.send();
        let locally_initiated =
            self.awaiting_disconnect_rsp || !self.disconnect_done_cbs.is_empty();
        self.state |= ChannelState::DISCONNECTED;
        self.pass_open_error(cx);
        if locally_initiated {
            // Both sides are closing; complete our handshake.
            self.awaiting_disconnect_rsp = false;
            for done_cb in self.disconnect_done_cbs.drain(..) {
                cx.actions.push(done_cb);
            }
            return Disposition::DisconnectComplete;
        }
        info!(
            "L2CAP channel 0x{:04X} disconnected by peer",
            self.local_cid()
        );
        Disposition::RemoteDisconnected
    }

    /// Both configurations accepted: verify mode consistency and open.
    fn finish_open(&mut self, cx: &mut ChannelContext<'_>) -> Disposition {
        if self.base.opened() {
            return Disposition::None;
        }
        if !self.accepted_channel_modes_are_consistent() {
            warn!(
                "L2CAP accepted channel modes are inconsistent for channel 0x{:04X} \
                 (local {:?}, remote {:?}); disconnecting",
                self.local_cid(),
                self.local_config.requested_mode(),
                self.remote_config.requested_mode()
            );
            self.start_disconnect(cx);
            self.pass_open_error(cx);
            return Disposition::OpenFailed;
        }
        self.base.opened = true;
        info!(
            "L2CAP channel 0x{:04X} is open ({:?}, TX MTU {}, RX MTU {})",
            self.local_cid(),
            self.info().mode,
            self.info().max_tx_sdu_size,
            self.info().max_rx_sdu_size
        );
        let info = self.info();
        if let Some(open_cb) = self.open_result_cb.take() {
            cx.actions.push(Box::new(move || open_cb(Some(info))));
        }
        Disposition::Opened
    }

    /// The mode the peer accepted for our config and the mode we accepted
    /// for the peer's config must agree.
    fn accepted_channel_modes_are_consistent(&self) -> bool {
        self.local_config.requested_mode() == self.remote_config.requested_mode()
    }

    /// Send a Disconnection Request as part of a failure path. Completion
    /// only clears the registry entry; there is no caller to notify.
    fn start_disconnect(&mut self, cx: &mut ChannelContext<'_>) {
        if self.is_connected() {
            let request = SignalingRequest::Disconnection {
                destination_cid: self.remote_cid(),
                source_cid: self.local_cid(),
            };
            let handler = cx.handle.discon_rsp_handler(self.local_cid());
            self.awaiting_disconnect_rsp = cx.sig.send_request(request, handler);
        }
        self.state |= ChannelState::DISCONNECTED;
    }

    /// Consume the one-shot open callback with a failure result. Inbound
    /// channels drop the callback instead: their failures are silent to the
    /// service that accepted the connection.
    fn pass_open_error(&mut self, cx: &mut ChannelContext<'_>) {
        if let Some(open_cb) = self.open_result_cb.take() {
            if self.relay_failure {
                cx.actions.push(Box::new(move || open_cb(None)));
            }
        }
    }

    /// Local preference requests ERTM but the link-level answer is not in yet
    fn is_waiting_for_peer_ertm_support(&self) -> bool {
        self.parameters.mode == Some(ChannelMode::EnhancedRetransmission)
            && self.peer_supports_ertm.is_none()
    }

    /// ERTM is requested only with a local preference and confirmed peer support
    fn should_request_enhanced_retransmission(&self) -> bool {
        self.parameters.mode == Some(ChannelMode::EnhancedRetransmission)
            && self.peer_supports_ertm == Some(true)
    }

    /// Mode this side intends to operate in, for validating peer proposals.
    /// Once our Configuration Request is out (possibly downgraded by
    /// Unacceptable Parameters recovery), the mode it carries is binding.
    fn desired_mode(&self) -> RfcMode {
        if self.state.contains(ChannelState::LOCAL_CONFIG_SENT) {
            return self.local_config.requested_mode();
        }
        if self.parameters.mode == Some(ChannelMode::EnhancedRetransmission)
            && self.peer_supports_ertm != Some(false)
        {
            RfcMode::EnhancedRetransmission
        } else {
            RfcMode::Basic
        }
    }

    fn calculate_local_mtu(&self) -> u16 {
        match self.parameters.max_rx_sdu_size {
            Some(mtu) if mtu >= MIN_ACL_MTU => mtu,
            Some(mtu) => {
                warn!(
                    "L2CAP requested RX MTU {mtu} below minimum {MIN_ACL_MTU} for \
                     channel 0x{:04X}; using default",
                    self.local_cid()
                );
                DEFAULT_MTU
            }
            None => DEFAULT_MTU,
        }
    }
}
