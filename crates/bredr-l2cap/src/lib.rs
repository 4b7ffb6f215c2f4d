//! bredr-l2cap - L2CAP dynamic channel management for BR/EDR links
//!
//! This library implements connection-oriented channel establishment over
//! the L2CAP signaling channel of a BR/EDR ACL link: Connection,
//! Configuration (including ERTM negotiation and Unacceptable Parameters
//! recovery), and Disconnection, plus the link-level extended-features
//! query that gates ERTM. It operates on typed signaling payloads; PDU
//! framing, command correlation, and retransmission timers are supplied by
//! the embedding stack through [`signaling::SignalingChannelInterface`].

pub mod channel;
pub mod config;
pub mod constants;
pub mod psm;
pub mod registry;
pub mod signaling;
pub mod types;


// Re-export common types for convenience
pub use channel::{BrEdrDynamicChannel, DynamicChannel};
pub use config::{ChannelConfiguration, RetransmissionFlowControl, RfcMode};
pub use psm::Psm;
pub use registry::BrEdrDynamicChannelRegistry;
pub use signaling::{
    ConfigurationResponder, ConfigurationResult, ConnectionResponder, ConnectionResult,
    ConnectionStatus, DisconnectionResponder, ExtendedFeatures, InformationResponder,
    InformationResult, InformationType, RejectReason, ResponseHandler, ResponseHandlerAction,
    SignalingChannelInterface, SignalingRequest, SignalingResponse, SignalingStatus,
};
pub use types::{
    ChannelId, ChannelInfo, ChannelMode, ChannelParameters, CloseCallback, CloseDoneCallback,
    Error, OpenResultCallback, Result, ServiceInfo, ServiceRequestCallback,
};
