//! Console/peripheral L2CAP relay
//!
//! The relay listens on every configured PSM. A connection from the master
//! (the console) is paired with an outgoing connection to the slave (the
//! real peripheral) on the same PSM and vice versa; once both sides are up,
//! frames are copied verbatim between them.
//!
//! Sockets and HCI commands are reached through the [`Transport`] and
//! [`LinkControl`] traits so the event loop can be driven without Bluetooth
//! hardware.

use crate::addr::BdAddr;
use crate::error::Result;
use crate::hci::constants::LINK_KEY_SIZE;
use crate::l2cap::PSM;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;

mod event_loop;
pub mod poll;
pub mod session;
pub mod table;


pub use event_loop::Relay;
pub use poll::{Interest, Readiness};
pub use session::Session;
pub use table::{ChannelState, ChannelTable, Role, Side};

/// Stored pairing key for one peer
pub type LinkKey = [u8; LINK_KEY_SIZE];

/// Written over the master's key whenever an SDP pairing goes away
pub const ZERO_LINK_KEY: LinkKey = [0; LINK_KEY_SIZE];

/// A connection taken off a listener
#[derive(Debug)]
pub struct Accepted<S> {
    pub stream: S,
    pub peer: BdAddr,
    /// PSM reported by the kernel for the accepted channel
    pub psm: u16,
    /// Channel id reported by the kernel for the accepted channel
    pub cid: u16,
}

/// Socket operations the relay needs
pub trait Transport {
    type Listener: AsRawFd;
    type Stream: AsRawFd + Read + Write;

    /// Opens a listener for `psm` on any local adapter
    fn listen(&mut self, psm: PSM) -> Result<Self::Listener>;

    fn accept(&mut self, listener: &Self::Listener) -> Result<Accepted<Self::Stream>>;

    /// Starts a non-blocking connect; the stream polls writable once resolved
    fn connect(&mut self, local: Option<BdAddr>, remote: BdAddr, psm: PSM) -> Result<Self::Stream>;

    /// `Ok(true)` once connected, `Ok(false)` while pending, `Err` on failure
    fn is_connected(&mut self, stream: &Self::Stream) -> io::Result<bool>;

    /// Remote channel id of a connected stream
    fn channel_id(&mut self, stream: &Self::Stream) -> io::Result<u16>;

    /// Sends one frame to `dst` as raw ACL fragments, bypassing the socket MTU
    fn send_acl(&mut self, dst: BdAddr, cid: u16, payload: &[u8]) -> Result<()>;
}

/// Adapter and link administration
pub trait LinkControl {
    fn set_device_class(&mut self, local: Option<BdAddr>, class: u32) -> Result<()>;

    fn delete_stored_link_key(&mut self, local: Option<BdAddr>, peer: BdAddr) -> Result<()>;

    fn write_stored_link_key(
        &mut self,
        local: Option<BdAddr>,
        peer: BdAddr,
        key: &LinkKey,
    ) -> Result<()>;

    /// Requests authentication on the ACL link to `peer`
    fn authenticate_link(&mut self, peer: BdAddr) -> Result<()>;

    /// Turns on encryption on the ACL link to `peer`
    fn encrypt_link(&mut self, peer: BdAddr) -> Result<()>;
}
