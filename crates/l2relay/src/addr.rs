//! Bluetooth device addresses
//!
//! Addresses are stored in the little-endian byte order used on the wire and
//! by the kernel's `bdaddr_t`, and printed most-significant byte first.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Length of the textual form `XX:XX:XX:XX:XX:XX`
const BDADDR_STR_LEN: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    /// The wildcard address, binds to any local adapter
    pub const ANY: BdAddr = BdAddr { bytes: [0; 6] };

    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl FromStr for BdAddr {
    type Err = Error;

    /// Parses `AA:BB:CC:DD:EE:FF`. Every octet must be exactly two hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidAddress(s.to_string());

        if s.len() != BDADDR_STR_LEN {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        let mut octets = 0;
        for (i, part) in s.split(':').enumerate() {
            if i >= 6 || part.len() != 2 {
                return Err(invalid());
            }
            let mut octet = [0u8; 1];
            hex::decode_to_slice(part, &mut octet).map_err(|_| invalid())?;
            // Text is big-endian, storage is little-endian
            bytes[5 - i] = octet[0];
            octets += 1;
        }

        if octets != 6 {
            return Err(invalid());
        }

        Ok(Self { bytes })
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: BdAddr = "00:1B:DC:0F:AA:58".parse().unwrap();
        assert_eq!(addr.bytes, [0x58, 0xAA, 0x0F, 0xDC, 0x1B, 0x00]);
        assert_eq!(addr.to_string(), "00:1B:DC:0F:AA:58");

        let lower: BdAddr = "00:1b:dc:0f:aa:58".parse().unwrap();
        assert_eq!(lower, addr);
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "00:1B:DC:0F:AA",
            "00:1B:DC:0F:AA:58:01",
            "001B:DC:0F:AA:58:",
            "00-1B-DC-0F-AA-58",
            "00:1B:DC:0F:AA:5G",
            "0:01B:DC:0F:AA:58",
        ] {
            assert!(bad.parse::<BdAddr>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_any() {
        assert!(BdAddr::ANY.is_any());
        assert!(BdAddr::default().is_any());
        assert!(!BdAddr::new([1, 0, 0, 0, 0, 0]).is_any());
    }
}
