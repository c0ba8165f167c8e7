//! Link maintenance through HCI commands
//!
//! Device class, stored link keys and link security are adapter-level
//! operations. Each call opens its own socket on the relevant adapter and
//! closes it before returning.

use crate::addr::BdAddr;
use crate::error::{HciError, Result};
use crate::hci::constants::*;
use crate::hci::packet::HciCommand;
use crate::hci::socket::{self, HciSocket};
use crate::relay::{LinkControl, LinkKey};
use log::debug;
use std::time::Duration;

/// [`LinkControl`] backed by the kernel's raw HCI sockets
#[derive(Debug, Clone)]
pub struct HciLinkControl {
    timeout: Duration,
}

impl Default for HciLinkControl {
    fn default() -> Self {
        Self::new()
    }
}

impl HciLinkControl {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(HCI_REQ_TIMEOUT_MS),
        }
    }

    fn open(local: Option<BdAddr>) -> std::result::Result<HciSocket, HciError> {
        let dev_id = socket::route(local)?;
        let socket = HciSocket::open(dev_id)?;
        socket.set_event_filter()?;
        Ok(socket)
    }

    /// Runs a host controller command and checks the status it returns
    fn host_request(&self, local: Option<BdAddr>, command: HciCommand) -> Result<()> {
        let socket = Self::open(local)?;
        let event = socket.send_request(&command, EVT_CMD_COMPLETE, self.timeout)?;

        match event.status() {
            Some(0) => Ok(()),
            Some(status) => Err(HciError::CommandFailed {
                opcode: command.opcode(),
                status,
            }
            .into()),
            None => Err(HciError::InvalidPacketFormat.into()),
        }
    }

    /// Runs a link control command against the ACL link to `peer` and waits
    /// for the completion event that reports on that link
    fn link_request(
        &self,
        peer: BdAddr,
        command: impl FnOnce(u16) -> HciCommand,
        completion: u8,
    ) -> Result<()> {
        let (socket, handle) = socket::open_connection(peer)?;
        socket.set_event_filter()?;

        let command = command(handle);
        let event = socket.send_request(&command, completion, self.timeout)?;

        if event.connection_handle() != Some(handle) {
            debug!("completion event for another link: {:?}", event);
        }

        match event.status() {
            Some(0) => Ok(()),
            Some(status) => Err(HciError::CommandFailed {
                opcode: command.opcode(),
                status,
            }
            .into()),
            None => Err(HciError::InvalidPacketFormat.into()),
        }
    }
}

impl LinkControl for HciLinkControl {
    fn set_device_class(&mut self, local: Option<BdAddr>, class: u32) -> Result<()> {
        self.host_request(local, HciCommand::WriteClassOfDevice { class })
    }

    fn delete_stored_link_key(&mut self, local: Option<BdAddr>, peer: BdAddr) -> Result<()> {
        self.host_request(
            local,
            HciCommand::DeleteStoredLinkKey {
                bd_addr: peer.bytes,
                delete_all: false,
            },
        )
    }

    fn write_stored_link_key(
        &mut self,
        local: Option<BdAddr>,
        peer: BdAddr,
        key: &LinkKey,
    ) -> Result<()> {
        self.host_request(
            local,
            HciCommand::WriteStoredLinkKey {
                bd_addr: peer.bytes,
                key: *key,
            },
        )
    }

    fn authenticate_link(&mut self, peer: BdAddr) -> Result<()> {
        self.link_request(
            peer,
            |handle| HciCommand::AuthenticationRequested { handle },
            EVT_AUTH_COMPLETE,
        )
    }

    fn encrypt_link(&mut self, peer: BdAddr) -> Result<()> {
        self.link_request(
            peer,
            |handle| HciCommand::SetConnectionEncryption {
                handle,
                enable: true,
            },
            EVT_ENCRYPT_CHANGE,
        )
    }
}
