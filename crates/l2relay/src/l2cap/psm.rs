//! Protocol/Service Multiplexer (PSM) handling for L2CAP
//!
//! The relay intercepts a fixed table of well-known PSMs. Table order is
//! significant: it is the order in which channels are scanned after each
//! readiness wake, and the reverse of the order in which they are closed.

use std::fmt;

/// Protocol/Service Multiplexer (PSM) values relayed over L2CAP.
///
/// See Bluetooth Core Specification Vol 3, Part A, Section 4.
/// And assigned numbers: https://www.bluetooth.com/specifications/assigned-numbers/logical-link-control/
///
/// RFCOMM (0x0003) is absent: the kernel does not allow plain L2CAP sockets
/// on it.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum PSM {
    /// Service Discovery Protocol
    SDP = 0x0001,
    /// Telephony Control Protocol
    TCS_BIN = 0x0005,
    /// TCS_BIN_CORDLESS
    TCS_BIN_CORDLESS = 0x0007,
    /// BNEP protocol
    BNEP = 0x000F,
    /// HID Control
    HID_CONTROL = 0x0011,
    /// HID Interrupt
    HID_INTERRUPT = 0x0013,
    /// UPnP protocol (ESDP)
    UPNP = 0x0015,
    /// AVCTP protocol
    AVCTP = 0x0017,
    /// AVDTP protocol
    AVDTP = 0x0019,
    /// AVCTP Browsing
    AVCTP_BROWSING = 0x001B,
    /// Unrestricted Digital Information Profile, C-plane
    UDI_C_PLANE = 0x001D,
    /// ATT protocol
    ATT = 0x001F,
    /// 3D Synchronization Profile
    _3DSP = 0x0021,
}

/// Number of PSMs in the relay table
pub const PSM_COUNT: usize = 13;

impl PSM {
    /// Every relayed PSM, in table order
    pub const ALL: [PSM; PSM_COUNT] = [
        PSM::SDP,
        PSM::TCS_BIN,
        PSM::TCS_BIN_CORDLESS,
        PSM::BNEP,
        PSM::HID_CONTROL,
        PSM::HID_INTERRUPT,
        PSM::UPNP,
        PSM::AVCTP,
        PSM::AVDTP,
        PSM::AVCTP_BROWSING,
        PSM::UDI_C_PLANE,
        PSM::ATT,
        PSM::_3DSP,
    ];

    /// Get the PSM value as u16
    pub fn value(&self) -> u16 {
        *self as u16
    }

    /// Position of this PSM in [`PSM::ALL`]
    pub fn index(&self) -> usize {
        match self {
            PSM::SDP => 0,
            PSM::TCS_BIN => 1,
            PSM::TCS_BIN_CORDLESS => 2,
            PSM::BNEP => 3,
            PSM::HID_CONTROL => 4,
            PSM::HID_INTERRUPT => 5,
            PSM::UPNP => 6,
            PSM::AVCTP => 7,
            PSM::AVDTP => 8,
            PSM::AVCTP_BROWSING => 9,
            PSM::UDI_C_PLANE => 10,
            PSM::ATT => 11,
            PSM::_3DSP => 12,
        }
    }

    /// Try to create a PSM from a u16 value
    pub fn from_value(value: u16) -> Option<Self> {
        PSM::ALL.iter().copied().find(|psm| psm.value() == value)
    }

    /// Short protocol name
    pub fn name(&self) -> &'static str {
        match self {
            PSM::SDP => "SDP",
            PSM::TCS_BIN => "TCS-BIN",
            PSM::TCS_BIN_CORDLESS => "TCS-BIN-CORDLESS",
            PSM::BNEP => "BNEP",
            PSM::HID_CONTROL => "HID-Control",
            PSM::HID_INTERRUPT => "HID-Interrupt",
            PSM::UPNP => "UPnP",
            PSM::AVCTP => "AVCTP",
            PSM::AVDTP => "AVDTP",
            PSM::AVCTP_BROWSING => "AVCTP-Browsing",
            PSM::UDI_C_PLANE => "UDI-C-Plane",
            PSM::ATT => "ATT",
            PSM::_3DSP => "3DSP",
        }
    }
}

impl fmt::Display for PSM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04x})", self.name(), self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psm_value_conversion() {
        assert_eq!(PSM::SDP.value(), 0x0001);
        assert_eq!(PSM::HID_CONTROL.value(), 0x0011);
        assert_eq!(PSM::_3DSP.value(), 0x0021);

        assert_eq!(PSM::from_value(0x0001), Some(PSM::SDP));
        assert_eq!(PSM::from_value(0x001D), Some(PSM::UDI_C_PLANE));

        // RFCOMM and dynamic PSMs are not relayed
        assert_eq!(PSM::from_value(0x0003), None);
        assert_eq!(PSM::from_value(0x1001), None);
    }

    #[test]
    fn test_table_order() {
        for (i, psm) in PSM::ALL.iter().enumerate() {
            assert_eq!(psm.index(), i);
        }

        // Ascending values, so a sorted copy keeps table order
        let mut sorted = PSM::ALL;
        sorted.sort();
        assert_eq!(sorted, PSM::ALL);
    }

    #[test]
    fn test_display() {
        assert_eq!(PSM::HID_INTERRUPT.to_string(), "HID-Interrupt (0x0013)");
    }
}
