//! Protocol/Service Multiplexer (PSM) handling
//!
//! See Bluetooth Core Specification Vol 3, Part A, Section 4 and the
//! assigned numbers for well-known PSM values.

use std::fmt;

use crate::types::Error;

/// Protocol/Service Multiplexer identifying the service a channel serves.
///
/// Well-known values are exposed as associated constants. Dynamically
/// registered PSMs must be odd-valued: the least significant bit of the low
/// byte must be 1 and the least significant bit of the high byte must be 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Psm(u16);

impl Psm {
    /// Service Discovery Protocol
    pub const SDP: Psm = Psm(0x0001);
    /// RFCOMM protocol
    pub const RFCOMM: Psm = Psm(0x0003);
    /// Telephony Control Protocol
    pub const TCS_BIN: Psm = Psm(0x0005);
    /// BNEP protocol
    pub const BNEP: Psm = Psm(0x000F);
    /// HID Control
    pub const HID_CONTROL: Psm = Psm(0x0011);
    /// HID Interrupt
    pub const HID_INTERRUPT: Psm = Psm(0x0013);
    /// AVCTP protocol
    pub const AVCTP: Psm = Psm(0x0017);
    /// AVDTP protocol
    pub const AVDTP: Psm = Psm(0x0019);

    /// Create a PSM from a raw value without validation
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Psm(value)
    }

    /// Get the raw PSM value
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0
    }

    /// Check whether this PSM satisfies the Core Spec value rules
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 & 0x0001 == 0x0001 && self.0 & 0x0100 == 0x0000
    }
}

impl TryFrom<u16> for Psm {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let psm = Psm(value);
        if psm.is_valid() {
            Ok(psm)
        } else {
            Err(Error::InvalidPsm(value))
        }
    }
}

impl From<Psm> for u16 {
    fn from(psm: Psm) -> Self {
        psm.0
    }
}

impl fmt::Display for Psm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Psm::SDP => write!(f, "SDP (0x0001)"),
            Psm::RFCOMM => write!(f, "RFCOMM (0x0003)"),
            Psm::TCS_BIN => write!(f, "TCS-BIN (0x0005)"),
            Psm::BNEP => write!(f, "BNEP (0x000F)"),
            Psm::HID_CONTROL => write!(f, "HID-Control (0x0011)"),
            Psm::HID_INTERRUPT => write!(f, "HID-Interrupt (0x0013)"),
            Psm::AVCTP => write!(f, "AVCTP (0x0017)"),
            Psm::AVDTP => write!(f, "AVDTP (0x0019)"),
            Psm(value) => write!(f, "PSM (0x{value:04X})"),
        }
    }
}
