//! l2relay - relay L2CAP channels between a console and a Bluetooth
//! peripheral
//!
//! The local adapter poses as the peripheral toward the console (the
//! master) and as the console toward the real peripheral (the slave). Every
//! configured PSM gets a listener; each inbound channel is paired with an
//! outgoing one on the same PSM and frames are copied verbatim between the
//! two. Frames too large for the console's default MTU are written as raw
//! HCI ACL fragments instead.

pub mod acl;
pub mod addr;
pub mod config;
pub mod error;
pub mod hci;
pub mod l2cap;
pub mod relay;

// Re-export common types for convenience
pub use addr::BdAddr;
pub use config::RelayConfig;
pub use error::{Error, HciError, Result};
pub use hci::{HciLinkControl, HciSocket};
pub use l2cap::{L2capError, L2capTransport, PSM};
pub use relay::{LinkControl, Relay, Transport};
