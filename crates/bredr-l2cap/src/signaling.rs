//! Signaling channel boundary
//!
//! The registry and channels drive the peer through an abstract
//! request/response service over the fixed signaling channel (CID 0x0001).
//! PDU framing, command-response correlation, RTX/ERTX timers, and command
//! rejects all live behind [`SignalingChannelInterface`]; this subsystem
//! exchanges typed payloads only.

use bitflags::bitflags;

use crate::config::ChannelConfiguration;
use crate::psm::Psm;
use crate::types::ChannelId;

/// Connection Response result codes (Core Spec Vol 3, Part A, 4.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ConnectionResult {
    /// Connection successful
    Success = 0x0000,
    /// Connection pending
    Pending = 0x0001,
    /// Connection refused - PSM not supported
    PsmNotSupported = 0x0002,
    /// Connection refused - security block
    SecurityBlock = 0x0003,
    /// Connection refused - no resources available
    NoResources = 0x0004,
    /// Connection refused - invalid source CID
    InvalidSourceCid = 0x0006,
    /// Connection refused - source CID already allocated
    SourceCidAlreadyAllocated = 0x0007,
}

/// Status accompanying a Pending connection result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ConnectionStatus {
    /// No further information available
    NoInfoAvailable = 0x0000,
    /// Authentication pending
    AuthenticationPending = 0x0001,
    /// Authorization pending
    AuthorizationPending = 0x0002,
}

/// Configuration Response result codes (Core Spec Vol 3, Part A, 4.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ConfigurationResult {
    /// Success
    Success = 0x0000,
    /// Failure - unacceptable parameters
    UnacceptableParameters = 0x0001,
    /// Failure - rejected (no reason provided)
    Rejected = 0x0002,
    /// Failure - unknown options
    UnknownOptions = 0x0003,
    /// Pending
    Pending = 0x0004,
    /// Failure - flow spec rejected
    FlowSpecRejected = 0x0005,
}

/// Information Response result codes (Core Spec Vol 3, Part A, 4.11)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InformationResult {
    /// Success
    Success = 0x0000,
    /// Requested information not supported
    NotSupported = 0x0001,
}

/// Information Request types this subsystem uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InformationType {
    /// Connectionless MTU
    ConnectionlessMtu = 0x0001,
    /// Extended features mask for the link
    ExtendedFeatures = 0x0002,
    /// Fixed channels supported
    FixedChannelsSupported = 0x0003,
}

bitflags! {
    /// Extended features mask carried by an Information Response
    /// (Core Spec Vol 3, Part A, 4.12)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExtendedFeatures: u32 {
        /// Flow control mode
        const FLOW_CONTROL = 0x0000_0001;
        /// Retransmission mode
        const RETRANSMISSION = 0x0000_0002;
        /// Bi-directional QoS
        const BIDIRECTIONAL_QOS = 0x0000_0004;
        /// Enhanced Retransmission Mode
        const ENHANCED_RETRANSMISSION = 0x0000_0008;
        /// Streaming mode
        const STREAMING = 0x0000_0010;
        /// FCS option
        const FCS = 0x0000_0020;
        /// Extended flow specification for BR/EDR
        const EXTENDED_FLOW_SPEC = 0x0000_0040;
        /// Fixed channels
        const FIXED_CHANNELS = 0x0000_0080;
        /// Extended window size
        const EXTENDED_WINDOW_SIZE = 0x0000_0100;
        /// Unicast connectionless data reception
        const UNICAST_CONNECTIONLESS = 0x0000_0200;
    }
}

/// Reasons a peer may reject a command outright (Command Reject)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RejectReason {
    /// Command not understood
    NotUnderstood = 0x0000,
    /// Signaling MTU exceeded
    SignalingMtuExceeded = 0x0001,
    /// Invalid CID in request
    InvalidChannelId = 0x0002,
}

/// A signaling command to send to the peer
#[derive(Debug, Clone)]
pub enum SignalingRequest {
    /// Connection Request
    Connection {
        /// Service the channel is for
        psm: Psm,
        /// Our endpoint of the requested channel
        source_cid: ChannelId,
    },
    /// Configuration Request
    Configuration {
        /// Peer's endpoint being configured
        destination_cid: ChannelId,
        /// Continuation flag in bit 0
        flags: u16,
        /// Options proposed for our inbound traffic
        config: ChannelConfiguration,
    },
    /// Disconnection Request
    Disconnection {
        /// Peer's endpoint
        destination_cid: ChannelId,
        /// Our endpoint
        source_cid: ChannelId,
    },
    /// Information Request
    Information {
        /// Requested information type
        info_type: InformationType,
    },
}

/// A correlated response received from the peer
#[derive(Debug, Clone)]
pub enum SignalingResponse {
    /// Connection Response
    Connection {
        /// Result code
        result: ConnectionResult,
        /// Status, meaningful for Pending results
        status: ConnectionStatus,
        /// Peer's endpoint of the channel (may be invalid while Pending)
        destination_cid: ChannelId,
        /// Our endpoint, echoed back
        source_cid: ChannelId,
    },
    /// Configuration Response
    Configuration {
        /// Result code
        result: ConfigurationResult,
        /// Continuation flag in bit 0
        flags: u16,
        /// Accepted or suggested options
        config: ChannelConfiguration,
    },
    /// Disconnection Response
    Disconnection {
        /// Peer's endpoint, echoed back
        destination_cid: ChannelId,
        /// Our endpoint, echoed back
        source_cid: ChannelId,
    },
    /// Information Response
    Information {
        /// Result code
        result: InformationResult,
        /// Echoed information type
        info_type: InformationType,
        /// Extended features mask, present for successful
        /// `ExtendedFeatures` queries
        extended_features: Option<ExtendedFeatures>,
    },
}

/// Outcome delivered to a response handler
#[derive(Debug)]
pub enum SignalingStatus<'a> {
    /// The peer answered with a correlated response
    Response(&'a SignalingResponse),
    /// The peer answered with a Command Reject
    Reject(RejectReason),
    /// The transport's RTX/ERTX timer expired without a response
    Timeout,
}

/// Whether a response handler expects further correlated responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHandlerAction {
    /// Done; the transport may release the correlation
    Complete,
    /// Keep the correlation alive for an additional response
    ExpectAdditional,
}

/// Handler invoked with each correlated response to a sent request.
///
/// Handlers are invoked from the transport's dispatch context, never
/// re-entrantly from within [`SignalingChannelInterface::send_request`].
pub type ResponseHandler = Box<dyn FnMut(SignalingStatus<'_>) -> ResponseHandlerAction + Send>;

/// Abstract request/response service over the signaling channel.
///
/// Implementations own framing, identifier correlation, retransmission
/// timers, and command-reject generation.
pub trait SignalingChannelInterface {
    /// Send a signaling command and register `handler` for its correlated
    /// response(s). Returns false if the command could not be sent, in
    /// which case `handler` will never be invoked.
    fn send_request(&mut self, request: SignalingRequest, handler: ResponseHandler) -> bool;
}

/// Reply builder for an inbound Connection Request
pub trait ConnectionResponder {
    /// Send the Connection Response. `local_cid` is our endpoint
    /// (the response's destination CID), invalid for rejections.
    fn send(&mut self, local_cid: ChannelId, result: ConnectionResult, status: ConnectionStatus);
}

/// Reply builder for an inbound Configuration Request
pub trait ConfigurationResponder {
    /// Send the Configuration Response with accepted or suggested options
    fn send(
        &mut self,
        local_cid: ChannelId,
        flags: u16,
        result: ConfigurationResult,
        config: ChannelConfiguration,
    );

    /// Answer with a Command Reject naming an invalid CID
    fn reject_invalid_channel_id(&mut self);
}

/// Reply builder for an inbound Information Request
pub trait InformationResponder {
    /// Answer an extended-features query with our feature mask
    fn send_extended_features(&mut self, features: ExtendedFeatures);

    /// Answer a query for information we do not provide
    fn send_not_supported(&mut self);
}

/// Reply builder for an inbound Disconnection Request
pub trait DisconnectionResponder {
    /// Send the affirmative Disconnection Response
    fn send(&mut self);

    /// Answer with a Command Reject naming an invalid CID
    fn reject_invalid_channel_id(&mut self);
}
