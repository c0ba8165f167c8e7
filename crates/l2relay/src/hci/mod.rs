//! Bluetooth HCI (Host Controller Interface) implementation
//!
//! This module provides functionality for interacting with HCI interfaces:
//! the command/event/ACL packet codecs, the raw socket, and the link
//! maintenance operations built on top of them.

pub mod constants;
pub mod link;
pub mod packet;
pub mod socket;

#[cfg(test)]
mod tests;

pub use link::HciLinkControl;
pub use packet::{AclHeader, HciCommand, HciEvent};
pub use socket::HciSocket;
