//! Negotiable channel configuration options
//!
//! Structured representation of the options carried by Configuration
//! Request/Response commands. Wire encoding of the option TLVs is owned by
//! the signaling transport; this subsystem only deals in these structs.

use crate::constants::*;
use crate::types::ChannelMode;

/// Retransmission and Flow Control modes defined by the Core Spec.
///
/// Only `Basic` and `EnhancedRetransmission` are negotiable by this
/// subsystem; the remaining modes are recognized so a peer proposing one can
/// be answered with Unacceptable Parameters instead of a command reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RfcMode {
    /// Basic L2CAP mode
    Basic = 0x00,
    /// Retransmission mode (legacy)
    Retransmission = 0x01,
    /// Flow control mode (legacy)
    FlowControl = 0x02,
    /// Enhanced Retransmission mode
    EnhancedRetransmission = 0x03,
    /// Streaming mode
    Streaming = 0x04,
}

impl From<ChannelMode> for RfcMode {
    fn from(mode: ChannelMode) -> Self {
        match mode {
            ChannelMode::Basic => RfcMode::Basic,
            ChannelMode::EnhancedRetransmission => RfcMode::EnhancedRetransmission,
        }
    }
}

/// Retransmission and Flow Control option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmissionFlowControl {
    /// Mode selection
    pub mode: RfcMode,
    /// Transmission window size
    pub tx_window_size: u8,
    /// Maximum number of transmissions of a single I-frame
    pub max_transmit: u8,
    /// Retransmission timeout (ms)
    pub retransmit_timeout_ms: u16,
    /// Monitor timeout (ms)
    pub monitor_timeout_ms: u16,
    /// Maximum PDU payload size
    pub mps: u16,
}

impl RetransmissionFlowControl {
    /// Option requesting Basic mode. The remaining fields are ignored for
    /// Basic mode per the Core Spec and are sent as zero.
    #[must_use]
    pub fn basic() -> Self {
        Self {
            mode: RfcMode::Basic,
            tx_window_size: 0,
            max_transmit: 0,
            retransmit_timeout_ms: 0,
            monitor_timeout_ms: 0,
            mps: 0,
        }
    }

    /// Option requesting ERTM with this endpoint's receiver capabilities
    #[must_use]
    pub fn ertm_request(mps: u16) -> Self {
        Self {
            mode: RfcMode::EnhancedRetransmission,
            tx_window_size: ERTM_MAX_UNACKED_INBOUND_FRAMES,
            max_transmit: ERTM_REQUEST_MAX_TRANSMIT,
            retransmit_timeout_ms: 0,
            monitor_timeout_ms: 0,
            mps: mps.min(MAX_ERTM_PDU_PAYLOAD),
        }
    }
}

/// Negotiable options carried by a single Configuration Request or Response.
///
/// Absent options take their Core Spec defaults on the receiving side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelConfiguration {
    /// Maximum Transmission Unit the sender will accept
    pub mtu: Option<u16>,
    /// Retransmission and Flow Control option
    pub retransmission_flow_control: Option<RetransmissionFlowControl>,
    /// Extended window size (ERTM with extended control fields)
    pub ext_window_size: Option<u16>,
}

impl ChannelConfiguration {
    /// Fold a continuation fragment into this configuration.
    ///
    /// Options present in `fragment` replace options already accumulated; a
    /// complete request is the fold of its fragments in arrival order.
    #[must_use]
    pub fn merge(mut self, fragment: ChannelConfiguration) -> Self {
        if fragment.mtu.is_some() {
            self.mtu = fragment.mtu;
        }
        if fragment.retransmission_flow_control.is_some() {
            self.retransmission_flow_control = fragment.retransmission_flow_control;
        }
        if fragment.ext_window_size.is_some() {
            self.ext_window_size = fragment.ext_window_size;
        }
        self
    }

    /// Mode requested by this configuration, defaulting to Basic when the
    /// Retransmission and Flow Control option is absent
    #[must_use]
    pub fn requested_mode(&self) -> RfcMode {
        self.retransmission_flow_control
            .map_or(RfcMode::Basic, |rfc| rfc.mode)
    }
}
