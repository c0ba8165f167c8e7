//! L2CAP (Logical Link Control and Adaptation Protocol) support
//!
//! This module provides what the relay needs from L2CAP:
//! - The table of relayed Protocol/Service Multiplexers
//! - The basic frame header, for hand-built fragments
//! - BlueZ connection-oriented sockets implementing the relay transport

pub mod constants;
pub mod packet;
pub mod psm;
pub mod socket;
pub mod types;
#[cfg(test)]
mod tests;

// Re-export the public API
pub use self::packet::L2capHeader;
pub use self::psm::{PSM, PSM_COUNT};
pub use self::socket::{L2capListener, L2capStream, L2capTransport};
pub use self::types::{L2capError, L2capResult};
