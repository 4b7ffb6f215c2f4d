//! Dynamic channel registry
//!
//! [`BrEdrDynamicChannelRegistry`] owns every dynamic channel on one BR/EDR
//! link: it allocates local CIDs, dispatches inbound signaling commands and
//! correlated responses to the per-channel state machines, performs the
//! link-level extended-features query that gates ERTM negotiation, and
//! relays open/close outcomes to callers.
//!
//! All registry state lives behind one mutex. User callbacks are never
//! invoked while it is held; they are queued as deferred actions and run
//! after the lock is released, so a callback may re-enter the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use bitflags::bitflags;
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::{BrEdrDynamicChannel, Disposition};
use crate::constants::*;
use crate::psm::Psm;
use crate::signaling::{
    ConfigurationResponder, ConnectionResponder, ConnectionResult, ConnectionStatus,
    DisconnectionResponder, ExtendedFeatures, InformationResponder, InformationResult,
    InformationType, ResponseHandler, ResponseHandlerAction, SignalingChannelInterface,
    SignalingRequest, SignalingResponse, SignalingStatus,
};
use crate::types::{
    ChannelId, ChannelInfo, ChannelParameters, CloseCallback, CloseDoneCallback, Error,
    OpenResultCallback, Result, ServiceInfo, ServiceRequestCallback,
};
use crate::config::ChannelConfiguration;

/// Feature mask advertised when the peer queries our extended features
const LOCAL_EXTENDED_FEATURES: ExtendedFeatures = ExtendedFeatures::ENHANCED_RETRANSMISSION;

bitflags! {
    /// Progress of the link-level extended-features exchange
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct FeatureExchangeState: u8 {
        const SENT = 1 << 0;
        const RECEIVED = 1 << 1;
    }
}

/// User callbacks queued while the registry lock is held, run after release
pub(crate) struct DeferredActions(Vec<Box<dyn FnOnce() + Send>>);

impl DeferredActions {
    fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn push(&mut self, action: Box<dyn FnOnce() + Send>) {
        self.0.push(action);
    }

    fn run(self) {
        for action in self.0 {
            action();
        }
    }
}

/// Per-event context handed to channel state machine methods: the signaling
/// service for sending commands, a handle for minting follow-up response
/// handlers, and the deferred action queue for user callbacks.
pub(crate) struct ChannelContext<'a> {
    pub(crate) sig: &'a mut dyn SignalingChannelInterface,
    pub(crate) handle: RegistryHandle,
    pub(crate) actions: &'a mut DeferredActions,
}

/// Weak handle to the registry for response handlers. A handler firing
/// after the registry is dropped is a no-op.
#[derive(Clone)]
pub(crate) struct RegistryHandle {
    weak: Weak<Mutex<Inner>>,
}

impl RegistryHandle {
    fn dispatch<F>(&self, f: F) -> ResponseHandlerAction
    where
        F: FnOnce(&mut Inner, &mut DeferredActions) -> ResponseHandlerAction,
    {
        let Some(inner) = self.weak.upgrade() else {
            return ResponseHandlerAction::Complete;
        };
        let mut actions = DeferredActions::new();
        let action = {
            let mut guard = inner.lock().unwrap();
            f(&mut guard, &mut actions)
        };
        actions.run();
        action
    }

    pub(crate) fn conn_rsp_handler(&self, local_cid: ChannelId) -> ResponseHandler {
        let handle = self.clone();
        Box::new(move |status| {
            handle.dispatch(|inner, actions| {
                inner.handle_connection_response(local_cid, status, actions)
            })
        })
    }

    pub(crate) fn config_rsp_handler(&self, local_cid: ChannelId) -> ResponseHandler {
        let handle = self.clone();
        Box::new(move |status| {
            handle.dispatch(|inner, actions| {
                inner.handle_configuration_response(local_cid, status, actions)
            })
        })
    }

    pub(crate) fn discon_rsp_handler(&self, local_cid: ChannelId) -> ResponseHandler {
        let handle = self.clone();
        Box::new(move |status| {
            handle.dispatch(|inner, actions| {
                inner.handle_disconnection_response(local_cid, status, actions)
            })
        })
    }

    fn info_rsp_handler(&self) -> ResponseHandler {
        let handle = self.clone();
        Box::new(move |status| {
            handle.dispatch(|inner, actions| inner.handle_information_response(status, actions))
        })
    }
}

/// Channel storage and local CID allocation shared by channel registries
pub(crate) struct DynamicChannelRegistry {
    channels: HashMap<ChannelId, BrEdrDynamicChannel>,
    largest_channel_id: ChannelId,
    random_channel_ids: bool,
    rng: StdRng,
}

impl DynamicChannelRegistry {
    fn new(largest_channel_id: ChannelId, random_channel_ids: bool) -> Self {
        Self {
            channels: HashMap::new(),
            largest_channel_id: largest_channel_id.max(FIRST_DYNAMIC_CHANNEL_ID),
            random_channel_ids,
            rng: StdRng::from_entropy(),
        }
    }

    /// Allocate an unused local CID in the dynamic range, or the invalid
    /// sentinel when the range is exhausted. A CID stays unavailable until
    /// its channel is fully removed, including any disconnect handshake
    /// still completing.
    fn find_available_channel_id(&mut self) -> ChannelId {
        let first = u32::from(FIRST_DYNAMIC_CHANNEL_ID);
        let span = u32::from(self.largest_channel_id) - first + 1;
        let start = if self.random_channel_ids {
            self.rng.gen_range(first..first + span)
        } else {
            first
        };
        for offset in 0..span {
            let candidate = (first + (start - first + offset) % span) as ChannelId;
            if !self.channels.contains_key(&candidate) {
                return candidate;
            }
        }
        INVALID_CHANNEL_ID
    }

    fn insert(&mut self, channel: BrEdrDynamicChannel) {
        self.channels.insert(channel.local_cid(), channel);
    }

    fn remove(&mut self, local_cid: ChannelId) -> Option<BrEdrDynamicChannel> {
        self.channels.remove(&local_cid)
    }

    fn get(&self, local_cid: ChannelId) -> Option<&BrEdrDynamicChannel> {
        self.channels.get(&local_cid)
    }

    fn get_mut(&mut self, local_cid: ChannelId) -> Option<&mut BrEdrDynamicChannel> {
        self.channels.get_mut(&local_cid)
    }

    fn contains(&self, local_cid: ChannelId) -> bool {
        self.channels.contains_key(&local_cid)
    }

    fn alive_channel_count(&self) -> usize {
        self.channels.len()
    }

    fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.keys().copied().collect()
    }

    /// Whether any channel on this link already has `remote_cid` as its
    /// peer endpoint
    fn remote_cid_in_use(&self, remote_cid: ChannelId) -> bool {
        remote_cid != INVALID_CHANNEL_ID
            && self.channels.values().any(|ch| ch.remote_cid() == remote_cid)
    }
}

struct Inner {
    base: DynamicChannelRegistry,
    sig: Box<dyn SignalingChannelInterface + Send>,
    close_cb: CloseCallback,
    service_request_cb: ServiceRequestCallback,
    feature_exchange: FeatureExchangeState,
    peer_features: ExtendedFeatures,
    self_weak: Weak<Mutex<Inner>>,
}

impl Inner {
    /// Run `f` against one channel with a full [`ChannelContext`]. Returns
    /// `None` when no channel owns `local_cid`.
    fn with_channel<R>(
        &mut self,
        local_cid: ChannelId,
        actions: &mut DeferredActions,
        f: impl FnOnce(&mut BrEdrDynamicChannel, &mut ChannelContext<'_>) -> R,
    ) -> Option<R> {
        let handle = RegistryHandle {
            weak: self.self_weak.clone(),
        };
        let Inner { base, sig, .. } = self;
        let channel = base.get_mut(local_cid)?;
        let mut cx = ChannelContext {
            sig: sig.as_mut(),
            handle,
            actions,
        };
        Some(f(channel, &mut cx))
    }

    fn process_disposition(
        &mut self,
        local_cid: ChannelId,
        disposition: Disposition,
        actions: &mut DeferredActions,
    ) {
        match disposition {
            Disposition::None | Disposition::Opened => {}
            Disposition::OpenFailed => {
                // The entry outlives a disconnect handshake still in
                // flight so the CID is not reallocated mid-handshake.
                let awaiting = self
                    .base
                    .get(local_cid)
                    .is_some_and(|ch| ch.awaiting_disconnect_rsp());
                if !awaiting {
                    self.base.remove(local_cid);
                }
            }
            Disposition::RemoteDisconnected => {
                if let Some(channel) = self.base.remove(local_cid) {
                    if channel.opened() {
                        let info = channel.info();
                        let close_cb = Arc::clone(&self.close_cb);
                        actions.push(Box::new(move || {
                            let mut cb = close_cb.lock().unwrap();
                            (&mut *cb)(info);
                        }));
                    }
                }
            }
            Disposition::DisconnectComplete => {
                self.base.remove(local_cid);
            }
        }
    }

    fn peer_supports_ertm(&self) -> Option<bool> {
        if self.feature_exchange.contains(FeatureExchangeState::RECEIVED) {
            Some(
                self.peer_features
                    .contains(ExtendedFeatures::ENHANCED_RETRANSMISSION),
            )
        } else {
            None
        }
    }

    fn send_information_request(&mut self) {
        if self.feature_exchange.contains(FeatureExchangeState::SENT) {
            return;
        }
        self.feature_exchange |= FeatureExchangeState::SENT;
        let handler = RegistryHandle {
            weak: self.self_weak.clone(),
        }
        .info_rsp_handler();
        let request = SignalingRequest::Information {
            info_type: InformationType::ExtendedFeatures,
        };
        if !self.sig.send_request(request, handler) {
            warn!("L2CAP failed to send Information Request; assuming no extended features");
            self.feature_exchange |= FeatureExchangeState::RECEIVED;
            self.peer_features = ExtendedFeatures::empty();
        }
    }

    fn handle_information_response(
        &mut self,
        status: SignalingStatus<'_>,
        actions: &mut DeferredActions,
    ) -> ResponseHandlerAction {
        if self.feature_exchange.contains(FeatureExchangeState::RECEIVED) {
            return ResponseHandlerAction::Complete;
        }
        self.feature_exchange |= FeatureExchangeState::RECEIVED;
        self.peer_features = match status {
            SignalingStatus::Response(&SignalingResponse::Information {
                result: InformationResult::Success,
                info_type: InformationType::ExtendedFeatures,
                extended_features,
            }) => extended_features.unwrap_or_default(),
            SignalingStatus::Response(&SignalingResponse::Information {
                result, info_type, ..
            }) => {
                debug!("L2CAP extended features unavailable ({result:?} for {info_type:?})");
                ExtendedFeatures::empty()
            }
            SignalingStatus::Response(other) => {
                warn!("L2CAP unexpected response to Information Request: {other:?}");
                ExtendedFeatures::empty()
            }
            SignalingStatus::Reject(reason) => {
                debug!("L2CAP Information Request rejected: {reason:?}");
                ExtendedFeatures::empty()
            }
            SignalingStatus::Timeout => {
                debug!("L2CAP Information Request timed out");
                ExtendedFeatures::empty()
            }
        };
        let supported = self
            .peer_features
            .contains(ExtendedFeatures::ENHANCED_RETRANSMISSION);
        debug!(
            "L2CAP peer extended features {:?} (ERTM supported: {supported})",
            self.peer_features
        );
        for local_cid in self.base.channel_ids() {
            let disposition = self
                .with_channel(local_cid, actions, |ch, cx| {
                    ch.set_enhanced_retransmission_support(supported, cx)
                })
                .unwrap_or_default();
            self.process_disposition(local_cid, disposition, actions);
        }
        ResponseHandlerAction::Complete
    }

    fn open_outbound(
        &mut self,
        psm: Psm,
        params: ChannelParameters,
        open_cb: OpenResultCallback,
        actions: &mut DeferredActions,
    ) {
        let local_cid = self.base.find_available_channel_id();
        if local_cid == INVALID_CHANNEL_ID {
            warn!("L2CAP dynamic channel IDs exhausted; cannot open channel for {psm}");
            actions.push(Box::new(move || open_cb(None)));
            return;
        }
        let channel =
            BrEdrDynamicChannel::new_outbound(psm, local_cid, params, self.peer_supports_ertm());
        self.base.insert(channel);
        let disposition = self
            .with_channel(local_cid, actions, |ch, cx| ch.open(open_cb, true, cx))
            .unwrap_or_default();
        self.process_disposition(local_cid, disposition, actions);
    }

    fn close_channel(
        &mut self,
        local_cid: ChannelId,
        done_cb: CloseDoneCallback,
        actions: &mut DeferredActions,
    ) {
        if !self.base.contains(local_cid) {
            actions.push(done_cb);
            return;
        }
        let disposition = self
            .with_channel(local_cid, actions, |ch, cx| ch.disconnect(done_cb, cx))
            .unwrap_or_default();
        self.process_disposition(local_cid, disposition, actions);
    }

    /// Look up the service registered for `psm` and, if present, create and
    /// activate an inbound channel for it.
    fn request_service(
        &mut self,
        psm: Psm,
        local_cid: ChannelId,
        remote_cid: ChannelId,
        actions: &mut DeferredActions,
    ) -> bool {
        let service = {
            let mut cb = self.service_request_cb.lock().unwrap();
            (&mut *cb)(psm)
        };
        let Some(ServiceInfo { params, open_cb }) = service else {
            debug!("L2CAP no service registered for {psm}");
            return false;
        };
        let channel = BrEdrDynamicChannel::new_inbound(
            psm,
            local_cid,
            remote_cid,
            params,
            self.peer_supports_ertm(),
        );
        self.base.insert(channel);
        // Inbound activation is passive until the connection is answered.
        let _ = self.with_channel(local_cid, actions, |ch, cx| ch.open(open_cb, false, cx));
        true
    }

    fn on_rx_connection_request(
        &mut self,
        psm: Psm,
        remote_cid: ChannelId,
        responder: &mut dyn ConnectionResponder,
        actions: &mut DeferredActions,
    ) {
        if !psm.is_valid() {
            debug!("L2CAP refusing Connection Request with invalid {psm}");
            responder.send(
                INVALID_CHANNEL_ID,
                ConnectionResult::PsmNotSupported,
                ConnectionStatus::NoInfoAvailable,
            );
            return;
        }
        if remote_cid < FIRST_DYNAMIC_CHANNEL_ID {
            warn!("L2CAP Connection Request with invalid source CID 0x{remote_cid:04X}");
            responder.send(
                INVALID_CHANNEL_ID,
                ConnectionResult::InvalidSourceCid,
                ConnectionStatus::NoInfoAvailable,
            );
            return;
        }
        if self.base.remote_cid_in_use(remote_cid) {
            warn!("L2CAP Connection Request with already-allocated source CID 0x{remote_cid:04X}");
            responder.send(
                INVALID_CHANNEL_ID,
                ConnectionResult::SourceCidAlreadyAllocated,
                ConnectionStatus::NoInfoAvailable,
            );
            return;
        }
        let local_cid = self.base.find_available_channel_id();
        if local_cid == INVALID_CHANNEL_ID {
            warn!("L2CAP dynamic channel IDs exhausted; refusing Connection Request for {psm}");
            responder.send(
                INVALID_CHANNEL_ID,
                ConnectionResult::NoResources,
                ConnectionStatus::NoInfoAvailable,
            );
            return;
        }
        if !self.request_service(psm, local_cid, remote_cid, actions) {
            responder.send(
                INVALID_CHANNEL_ID,
                ConnectionResult::PsmNotSupported,
                ConnectionStatus::NoInfoAvailable,
            );
            return;
        }
        let disposition = self
            .with_channel(local_cid, actions, |ch, cx| {
                ch.complete_inbound_connection(responder, cx)
            })
            .unwrap_or_default();
        self.process_disposition(local_cid, disposition, actions);
    }

    fn on_rx_configuration_request(
        &mut self,
        local_cid: ChannelId,
        flags: u16,
        config: ChannelConfiguration,
        responder: &mut dyn ConfigurationResponder,
        actions: &mut DeferredActions,
    ) {
        if !self.base.contains(local_cid) {
            warn!("L2CAP Configuration Request for unknown channel 0x{local_cid:04X}");
            responder.reject_invalid_channel_id();
            return;
        }
        let disposition = self
            .with_channel(local_cid, actions, |ch, cx| {
                ch.on_rx_configuration_request(flags, config, responder, cx)
            })
            .unwrap_or_default();
        self.process_disposition(local_cid, disposition, actions);
    }

    fn on_rx_disconnection_request(
        &mut self,
        local_cid: ChannelId,
        remote_cid: ChannelId,
        responder: &mut dyn DisconnectionResponder,
        actions: &mut DeferredActions,
    ) {
        let endpoints_match = self
            .base
            .get(local_cid)
            .is_some_and(|ch| ch.remote_cid() == remote_cid);
        if !endpoints_match {
            warn!(
                "L2CAP Disconnection Request for unknown channel pair \
                 (destination 0x{local_cid:04X}, source 0x{remote_cid:04X})"
            );
            responder.reject_invalid_channel_id();
            return;
        }
        let disposition = self
            .with_channel(local_cid, actions, |ch, cx| {
                ch.on_rx_disconnection_request(responder, cx)
            })
            .unwrap_or_default();
        self.process_disposition(local_cid, disposition, actions);
    }

    fn handle_connection_response(
        &mut self,
        local_cid: ChannelId,
        status: SignalingStatus<'_>,
        actions: &mut DeferredActions,
    ) -> ResponseHandlerAction {
        let outcome = match status {
            SignalingStatus::Response(&SignalingResponse::Connection {
                result,
                destination_cid,
                ..
            }) => {
                let duplicate = self.base.remote_cid_in_use(destination_cid);
                self.with_channel(local_cid, actions, |ch, cx| {
                    ch.on_connection_response(result, destination_cid, duplicate, cx)
                })
            }
            SignalingStatus::Response(other) => {
                warn!("L2CAP unexpected response to Connection Request: {other:?}");
                self.with_channel(local_cid, actions, |ch, cx| {
                    (
                        ResponseHandlerAction::Complete,
                        ch.on_connection_failure(cx),
                    )
                })
            }
            SignalingStatus::Reject(reason) => {
                debug!("L2CAP Connection Request rejected: {reason:?}");
                self.with_channel(local_cid, actions, |ch, cx| {
                    (
                        ResponseHandlerAction::Complete,
                        ch.on_connection_failure(cx),
                    )
                })
            }
            SignalingStatus::Timeout => {
                debug!("L2CAP Connection Request timed out");
                self.with_channel(local_cid, actions, |ch, cx| {
                    (
                        ResponseHandlerAction::Complete,
                        ch.on_connection_failure(cx),
                    )
                })
            }
        };
        let Some((action, disposition)) = outcome else {
            trace!("L2CAP Connection Response for removed channel 0x{local_cid:04X}");
            return ResponseHandlerAction::Complete;
        };
        self.process_disposition(local_cid, disposition, actions);
        action
    }

    fn handle_configuration_response(
        &mut self,
        local_cid: ChannelId,
        status: SignalingStatus<'_>,
        actions: &mut DeferredActions,
    ) -> ResponseHandlerAction {
        let outcome = match status {
            SignalingStatus::Response(&SignalingResponse::Configuration {
                result,
                flags,
                config,
            }) => self.with_channel(local_cid, actions, |ch, cx| {
                ch.on_configuration_response(result, flags, config, cx)
            }),
            SignalingStatus::Response(other) => {
                warn!("L2CAP unexpected response to Configuration Request: {other:?}");
                self.with_channel(local_cid, actions, |ch, cx| {
                    (
                        ResponseHandlerAction::Complete,
                        ch.on_configuration_failure(cx),
                    )
                })
            }
            SignalingStatus::Reject(reason) => {
                debug!("L2CAP Configuration Request rejected: {reason:?}");
                self.with_channel(local_cid, actions, |ch, cx| {
                    (
                        ResponseHandlerAction::Complete,
                        ch.on_configuration_failure(cx),
                    )
                })
            }
            SignalingStatus::Timeout => {
                debug!("L2CAP Configuration Request timed out");
                self.with_channel(local_cid, actions, |ch, cx| {
                    (
                        ResponseHandlerAction::Complete,
                        ch.on_configuration_failure(cx),
                    )
                })
            }
        };
        let Some((action, disposition)) = outcome else {
            trace!("L2CAP Configuration Response for removed channel 0x{local_cid:04X}");
            return ResponseHandlerAction::Complete;
        };
        self.process_disposition(local_cid, disposition, actions);
        action
    }

    /// Reject and timeout complete a disconnect handshake the same way a
    /// Disconnection Response does: the local side is done either way.
    fn handle_disconnection_response(
        &mut self,
        local_cid: ChannelId,
        _status: SignalingStatus<'_>,
        actions: &mut DeferredActions,
    ) -> ResponseHandlerAction {
        let disposition = self
            .with_channel(local_cid, actions, |ch, cx| ch.on_disconnect_complete(cx))
            .unwrap_or_default();
        self.process_disposition(local_cid, disposition, actions);
        ResponseHandlerAction::Complete
    }
}

/// Registry of BR/EDR dynamic channels for one ACL link.
///
/// Construction sends the extended-features Information Request that gates
/// ERTM negotiation. All methods are safe to call from user callbacks.
pub struct BrEdrDynamicChannelRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl BrEdrDynamicChannelRegistry {
    /// Create a registry over `sig` for one link.
    ///
    /// `close_cb` fires when a previously opened channel is closed by the
    /// peer; `service_request_cb` resolves inbound Connection Requests.
    /// `largest_channel_id` bounds local CID allocation (clamped to the
    /// dynamic range) and `random_channel_ids` selects randomized rather
    /// than lowest-first allocation.
    pub fn new(
        sig: Box<dyn SignalingChannelInterface + Send>,
        close_cb: CloseCallback,
        service_request_cb: ServiceRequestCallback,
        largest_channel_id: ChannelId,
        random_channel_ids: bool,
    ) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            base: DynamicChannelRegistry::new(largest_channel_id, random_channel_ids),
            sig,
            close_cb,
            service_request_cb,
            feature_exchange: FeatureExchangeState::empty(),
            peer_features: ExtendedFeatures::empty(),
            self_weak: Weak::new(),
        }));
        {
            let mut guard = inner.lock().unwrap();
            guard.self_weak = Arc::downgrade(&inner);
            guard.send_information_request();
        }
        Self { inner }
    }

    /// Open an outbound channel to `psm`. The outcome, success or failure,
    /// arrives through `open_cb` exactly once.
    pub fn open_outbound(
        &self,
        psm: Psm,
        params: ChannelParameters,
        open_cb: OpenResultCallback,
    ) -> Result<()> {
        if !psm.is_valid() {
            return Err(Error::InvalidPsm(psm.value()));
        }
        let mut actions = DeferredActions::new();
        self.inner
            .lock()
            .unwrap()
            .open_outbound(psm, params, open_cb, &mut actions);
        actions.run();
        Ok(())
    }

    /// Close a channel locally. `done_cb` fires when the disconnect
    /// handshake completes; closing an unknown channel completes
    /// immediately. Local closure never fires the open callback or the
    /// registry close callback.
    pub fn close_channel(&self, local_cid: ChannelId, done_cb: CloseDoneCallback) {
        let mut actions = DeferredActions::new();
        self.inner
            .lock()
            .unwrap()
            .close_channel(local_cid, done_cb, &mut actions);
        actions.run();
    }

    /// Handle an inbound Connection Request for `psm` with the peer's
    /// endpoint `remote_cid`.
    pub fn on_rx_connection_request(
        &self,
        psm: Psm,
        remote_cid: ChannelId,
        responder: &mut dyn ConnectionResponder,
    ) {
        let mut actions = DeferredActions::new();
        self.inner
            .lock()
            .unwrap()
            .on_rx_connection_request(psm, remote_cid, responder, &mut actions);
        actions.run();
    }

    /// Handle an inbound Configuration Request addressed to `local_cid`.
    pub fn on_rx_configuration_request(
        &self,
        local_cid: ChannelId,
        flags: u16,
        config: ChannelConfiguration,
        responder: &mut dyn ConfigurationResponder,
    ) {
        let mut actions = DeferredActions::new();
        self.inner.lock().unwrap().on_rx_configuration_request(
            local_cid,
            flags,
            config,
            responder,
            &mut actions,
        );
        actions.run();
    }

    /// Answer an inbound Information Request. Only the extended-features
    /// query is served; everything else is answered Not Supported.
    pub fn on_rx_information_request(
        &self,
        info_type: InformationType,
        responder: &mut dyn InformationResponder,
    ) {
        match info_type {
            InformationType::ExtendedFeatures => {
                responder.send_extended_features(LOCAL_EXTENDED_FEATURES);
            }
            other => {
                debug!("L2CAP Information Request for unsupported type {other:?}");
                responder.send_not_supported();
            }
        }
    }

    /// Handle an inbound Disconnection Request naming our endpoint
    /// `local_cid` and the peer's endpoint `remote_cid`.
    pub fn on_rx_disconnection_request(
        &self,
        local_cid: ChannelId,
        remote_cid: ChannelId,
        responder: &mut dyn DisconnectionResponder,
    ) {
        let mut actions = DeferredActions::new();
        self.inner.lock().unwrap().on_rx_disconnection_request(
            local_cid,
            remote_cid,
            responder,
            &mut actions,
        );
        actions.run();
    }

    /// Number of channels present, including channels still connecting or
    /// disconnecting
    pub fn alive_channel_count(&self) -> usize {
        self.inner.lock().unwrap().base.alive_channel_count()
    }

    /// Peer's ERTM support, once the extended-features exchange has resolved
    pub fn peer_supports_ertm(&self) -> Option<bool> {
        self.inner.lock().unwrap().peer_supports_ertm()
    }

    /// Whether the channel identified by `local_cid` is connected
    pub fn is_connected(&self, local_cid: ChannelId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .base
            .get(local_cid)
            .is_some_and(|ch| ch.is_connected())
    }

    /// Whether the channel identified by `local_cid` is open
    pub fn is_open(&self, local_cid: ChannelId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .base
            .get(local_cid)
            .is_some_and(|ch| ch.is_open())
    }

    /// Negotiated parameters of an open channel
    pub fn channel_info(&self, local_cid: ChannelId) -> Option<ChannelInfo> {
        self.inner
            .lock()
            .unwrap()
            .base
            .get(local_cid)
            .filter(|ch| ch.is_open())
            .map(BrEdrDynamicChannel::info)
    }
}
