//! Type definitions for dynamic channel management
//!
//! This module contains the core data structures shared by the channel state
//! machine and the registry, and the callback types exposed to callers.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::psm::Psm;

/// Channel Identifier: per-link, per-direction handle for an L2CAP endpoint
pub type ChannelId = u16;

/// Errors surfaced synchronously by this subsystem.
///
/// Protocol outcomes (peer rejection, negotiation failure, timeouts) are not
/// errors in this sense; they are delivered through the one-shot open
/// callback and the registry close callback.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid PSM value 0x{0:04X}")]
    InvalidPsm(u16),
}

/// Result type for dynamic channel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Channel modes this subsystem is willing to negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// Basic L2CAP mode (no retransmission or flow control)
    #[default]
    Basic,
    /// Enhanced Retransmission Mode
    EnhancedRetransmission,
}

/// Preferences supplied by the channel requester. Immutable for the
/// channel's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelParameters {
    /// Preferred channel mode. `None` lets the subsystem pick Basic.
    pub mode: Option<ChannelMode>,
    /// Largest SDU this endpoint wants to receive. `None` selects the
    /// Core Spec default MTU.
    pub max_rx_sdu_size: Option<u16>,
}

/// Snapshot of a channel's negotiated identity and configuration.
///
/// Handed to open and close callbacks. The MTU fields are only meaningful
/// once the channel has opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Protocol/Service Multiplexer this channel serves
    pub psm: Psm,
    /// Local endpoint identifier
    pub local_cid: ChannelId,
    /// Remote endpoint identifier
    pub remote_cid: ChannelId,
    /// Negotiated channel mode
    pub mode: ChannelMode,
    /// Largest SDU the peer will accept from us
    pub max_tx_sdu_size: u16,
    /// Largest SDU we will accept from the peer
    pub max_rx_sdu_size: u16,
}

/// One-shot callback delivering the outcome of an open attempt.
///
/// `None` means the channel failed to open; the channel is already removed
/// by the time the callback runs.
pub type OpenResultCallback = Box<dyn FnOnce(Option<ChannelInfo>) + Send>;

/// Completion callback for a locally initiated close
pub type CloseDoneCallback = Box<dyn FnOnce() + Send>;

/// Callback fired when a previously opened channel is closed by the peer
pub type CloseCallback = Arc<Mutex<dyn FnMut(ChannelInfo) + Send>>;

/// Answer to an inbound connection request for a registered service
pub struct ServiceInfo {
    /// Channel preferences the service registered with
    pub params: ChannelParameters,
    /// Callback receiving the opened channel (or nothing on failure:
    /// inbound open failures are silent to the service)
    pub open_cb: OpenResultCallback,
}

/// Service lookup injected into the registry. Returning `None` refuses the
/// inbound connection request.
pub type ServiceRequestCallback = Arc<Mutex<dyn FnMut(Psm) -> Option<ServiceInfo> + Send>>;
