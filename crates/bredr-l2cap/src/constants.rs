//! Constants for L2CAP BR/EDR dynamic channel management
//!
//! Values are taken from the Bluetooth Core Specification v5.x, Vol 3, Part A.

use crate::types::ChannelId;

/// Sentinel for an unassigned channel ID (or an exhausted allocation)
pub const INVALID_CHANNEL_ID: ChannelId = 0x0000;

/// Fixed signaling channel for BR/EDR links
pub const SIGNALING_CHANNEL_ID: ChannelId = 0x0001;

/// First channel ID available for dynamically allocated channels
pub const FIRST_DYNAMIC_CHANNEL_ID: ChannelId = 0x0040;

/// Largest channel ID usable by dynamic channels on a BR/EDR link
pub const LAST_DYNAMIC_CHANNEL_ID: ChannelId = 0xFFFF;

/// Default MTU for BR/EDR connection-oriented channels (Core Spec 5.1)
pub const DEFAULT_MTU: u16 = 672;

/// Minimum MTU any BR/EDR L2CAP endpoint must accept (Core Spec 5.1)
pub const MIN_ACL_MTU: u16 = 48;

/// Maximum number of unacknowledged ERTM I-frames we are willing to receive.
/// Advertised as TxWindow in our outbound Configuration Request.
pub const ERTM_MAX_UNACKED_INBOUND_FRAMES: u8 = 63;

/// MaxTransmit we advertise when requesting ERTM. Zero defers the bound to
/// the responder per the Core Spec option rules.
pub const ERTM_REQUEST_MAX_TRANSMIT: u8 = 0;

/// Largest PDU payload we will advertise as MPS in an ERTM request
pub const MAX_ERTM_PDU_PAYLOAD: u16 = 1010;

/// Retransmission timeout filled into an accepted ERTM option (ms)
pub const ERTM_RETRANSMIT_TIMEOUT_MS: u16 = 2000;

/// Monitor timeout filled into an accepted ERTM option (ms)
pub const ERTM_MONITOR_TIMEOUT_MS: u16 = 12_000;

/// Inbound Configuration Requests proposing a channel mode we will not
/// accept are answered Unacceptable Parameters at most this many times
/// before the channel is disconnected.
pub const MAX_UNDESIRED_MODE_CONFIG_REQUESTS: u8 = 2;
