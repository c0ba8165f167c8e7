//! HCI packet structures and parsing
//!
//! This module contains structures and methods for handling HCI command,
//! event and ACL data packets.

use crate::hci::constants::*;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// HCI commands used for link maintenance
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum HciCommand {
    // Link Control Commands (OGF: 0x01)
    AuthenticationRequested { handle: u16 },
    SetConnectionEncryption { handle: u16, enable: bool },

    // Host Controller Commands (OGF: 0x03)
    WriteStoredLinkKey { bd_addr: [u8; 6], key: [u8; LINK_KEY_SIZE] },
    DeleteStoredLinkKey { bd_addr: [u8; 6], delete_all: bool },
    WriteClassOfDevice { class: u32 },
}

impl HciCommand {
    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            // Link Control Commands
            Self::AuthenticationRequested { .. } => (OGF_LINK_CTL, OCF_AUTH_REQUESTED),
            Self::SetConnectionEncryption { .. } => (OGF_LINK_CTL, OCF_SET_CONN_ENCRYPT),

            // Host Controller Commands
            Self::WriteStoredLinkKey { .. } => (OGF_HOST_CTL, OCF_WRITE_STORED_LINK_KEY),
            Self::DeleteStoredLinkKey { .. } => (OGF_HOST_CTL, OCF_DELETE_STORED_LINK_KEY),
            Self::WriteClassOfDevice { .. } => (OGF_HOST_CTL, OCF_WRITE_CLASS_OF_DEV),
        }
    }

    /// Packed 16-bit opcode: OGF in the top 6 bits, OCF in the low 10
    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        opcode_pack(ogf, ocf)
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match *self {
            Self::AuthenticationRequested { handle } => handle.to_le_bytes().to_vec(),

            Self::SetConnectionEncryption { handle, enable } => {
                let mut params = Vec::with_capacity(3);
                params.extend_from_slice(&handle.to_le_bytes());
                params.push(enable as u8);
                params
            }

            Self::WriteStoredLinkKey { bd_addr, key } => {
                let mut params = Vec::with_capacity(1 + 6 + LINK_KEY_SIZE);
                params.push(1); // Num_Keys_To_Write
                params.extend_from_slice(&bd_addr);
                params.extend_from_slice(&key);
                params
            }

            Self::DeleteStoredLinkKey { bd_addr, delete_all } => {
                let mut params = Vec::with_capacity(7);
                params.extend_from_slice(&bd_addr);
                params.push(delete_all as u8);
                params
            }

            // Class of device is a 24-bit little-endian field
            Self::WriteClassOfDevice { class } => class.to_le_bytes()[..3].to_vec(),
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();
        debug_assert!(params.len() <= HCI_MAX_PARAM_LEN);

        let mut packet = vec![HCI_COMMAND_PKT];
        packet.extend_from_slice(&self.opcode().to_le_bytes());
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

pub fn opcode_pack(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x3ff)
}

/// HCI Event packet
#[derive(Debug, Clone)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes (without the packet type byte)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + 2) {
            return None;
        }

        let parameters = data[2..(parameter_total_length as usize + 2)].to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }

    /// Opcode acknowledged by a Command Complete or Command Status event
    pub fn command_opcode(&self) -> Option<u16> {
        let offset = match self.event_code {
            // Num_HCI_Command_Packets, Command_Opcode
            EVT_CMD_COMPLETE => 1,
            // Status, Num_HCI_Command_Packets, Command_Opcode
            EVT_CMD_STATUS => 2,
            _ => return None,
        };
        let mut cursor = Cursor::new(self.parameters.get(offset..offset + 2)?);
        cursor.read_u16::<LittleEndian>().ok()
    }

    /// Return parameters of a Command Complete event, status first
    pub fn return_parameters(&self) -> Option<&[u8]> {
        if self.event_code != EVT_CMD_COMPLETE {
            return None;
        }
        self.parameters.get(3..)
    }

    /// Status byte of Command Status and most completion events
    pub fn status(&self) -> Option<u8> {
        match self.event_code {
            EVT_CMD_COMPLETE => self.return_parameters()?.first().copied(),
            _ => self.parameters.first().copied(),
        }
    }

    /// Connection handle carried after the status byte of completion events
    /// such as Authentication Complete and Encryption Change
    pub fn connection_handle(&self) -> Option<u16> {
        let mut cursor = Cursor::new(self.parameters.get(1..3)?);
        cursor.read_u16::<LittleEndian>().ok()
    }
}

/// Packs a 12-bit connection handle with the packet boundary flags
pub fn acl_handle_pack(handle: u16, flags: u16) -> u16 {
    (handle & ACL_HANDLE_MASK) | (flags << 12)
}

/// HCI ACL data packet header
///
/// Wire layout, little-endian:
/// - bits 0..12 of the first field: connection handle
/// - bits 12..16 of the first field: packet boundary and broadcast flags
/// - second field: data length of the fragment (`dlen`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclHeader {
    pub handle: u16,
    pub flags: u16,
    pub dlen: u16,
}

impl AclHeader {
    pub fn new(handle: u16, flags: u16, dlen: u16) -> Self {
        Self { handle, flags, dlen }
    }

    /// Parse an ACL header from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HCI_ACL_HDR_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let packed = cursor.read_u16::<LittleEndian>().ok()?;
        let dlen = cursor.read_u16::<LittleEndian>().ok()?;

        Some(Self {
            handle: packed & ACL_HANDLE_MASK,
            flags: packed >> 12,
            dlen,
        })
    }

    /// Serialize the header to bytes
    pub fn to_bytes(&self) -> [u8; HCI_ACL_HDR_SIZE] {
        let mut result = [0u8; HCI_ACL_HDR_SIZE];
        let mut cursor = Cursor::new(&mut result[..]);

        // Writing into a fixed-size buffer of the exact length cannot fail
        let _ = cursor.write_u16::<LittleEndian>(acl_handle_pack(self.handle, self.flags));
        let _ = cursor.write_u16::<LittleEndian>(self.dlen);

        result
    }
}
