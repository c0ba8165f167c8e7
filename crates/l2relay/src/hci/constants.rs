//! HCI protocol constants
//!
//! This module contains constants used in the Bluetooth HCI protocol and the
//! Linux HCI socket interface.

// HCI packet types
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACL_PKT: u8 = 0x02;
pub const HCI_EVENT_PKT: u8 = 0x04;

// Maximum size of HCI command parameters
pub const HCI_MAX_PARAM_LEN: usize = 255;

// Size of a full event packet: type, code, length, parameters
pub const HCI_MAX_EVENT_SIZE: usize = 260;

// ACL data packet header: handle + flags (2), data length (2)
pub const HCI_ACL_HDR_SIZE: usize = 4;

// Packet boundary flags, packed into the top bits of the ACL handle field
pub const ACL_CONT: u16 = 0x01;
pub const ACL_START: u16 = 0x02;

// Connection handles are 12 bits wide
pub const ACL_HANDLE_MASK: u16 = 0x0fff;

// MTU used when writing raw ACL fragments
pub const ACL_MTU: usize = 1024;

// Link type reported by HCIGETCONNINFO
pub const ACL_LINK: u8 = 0x01;

// Common OGF (Opcode Group Field) values
pub const OGF_LINK_CTL: u8 = 0x01;
pub const OGF_HOST_CTL: u8 = 0x03;

// Link Control Commands (OGF: 0x01)
pub const OCF_AUTH_REQUESTED: u16 = 0x0011;
pub const OCF_SET_CONN_ENCRYPT: u16 = 0x0013;

// Host Controller Commands (OGF: 0x03)
pub const OCF_WRITE_STORED_LINK_KEY: u16 = 0x0011;
pub const OCF_DELETE_STORED_LINK_KEY: u16 = 0x0012;
pub const OCF_WRITE_CLASS_OF_DEV: u16 = 0x0024;

// HCI Events
pub const EVT_AUTH_COMPLETE: u8 = 0x06;
pub const EVT_ENCRYPT_CHANGE: u8 = 0x08;
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_CMD_STATUS: u8 = 0x0F;

// Linux HCI socket interface
pub const SOL_HCI: i32 = 0;
pub const HCI_FILTER: i32 = 2;
pub const HCI_CHANNEL_RAW: u16 = 0;
pub const HCI_MAX_DEV: usize = 16;

// Device flag bit set while the adapter is up
pub const HCI_UP: u32 = 0;

// ioctl requests, _IOR('H', nr, int)
pub const HCIGETDEVLIST: u64 = 0x800448d2;
pub const HCIGETDEVINFO: u64 = 0x800448d3;
pub const HCIGETCONNINFO: u64 = 0x800448d5;

// Default timeout for HCI requests in milliseconds
pub const HCI_REQ_TIMEOUT_MS: u64 = 1000;

// Length of a BR/EDR link key
pub const LINK_KEY_SIZE: usize = 16;
