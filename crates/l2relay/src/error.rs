//! Error types for the l2relay library
//!
//! This module defines the error types used throughout the library.

use crate::addr::BdAddr;
use thiserror::Error;

/// Errors that can occur when working with HCI sockets
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("Failed to bind to HCI device {0}: {1}")]
    BindError(u16, std::io::Error),

    #[error("Failed to send HCI packet: {0}")]
    SendError(std::io::Error),

    #[error("Failed to receive HCI event: {0}")]
    ReceiveError(std::io::Error),

    #[error("HCI ioctl {0} failed: {1}")]
    IoctlError(&'static str, std::io::Error),

    #[error("Invalid HCI packet format")]
    InvalidPacketFormat,

    #[error("HCI command 0x{opcode:04x} failed with status 0x{status:02x}")]
    CommandFailed { opcode: u16, status: u8 },

    #[error("Timed out waiting for HCI command 0x{0:04x}")]
    Timeout(u16),

    #[error("No Bluetooth adapter available")]
    NoAdapter,

    #[error("No adapter with address {0}")]
    AdapterNotFound(BdAddr),

    #[error("No ACL connection to {0}")]
    NotConnected(BdAddr),
}

/// Top-level error type for the relay
#[derive(Error, Debug)]
pub enum Error {
    #[error("HCI error: {0}")]
    Hci(#[from] HciError),

    #[error("L2CAP error: {0}")]
    L2cap(#[from] crate::l2cap::L2capError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid Bluetooth address: {0:?}")]
    InvalidAddress(String),

    #[error("Payload of {0} bytes does not fit in one L2CAP frame")]
    PayloadTooLarge(usize),

    #[error("Failed to reset stored link key of {peer}: {source}")]
    LinkKeyReset {
        peer: BdAddr,
        #[source]
        source: Box<Error>,
    },
}

/// Convenience type alias for Results with the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
