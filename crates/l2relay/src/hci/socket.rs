//! HCI Socket implementation for Bluetooth communication
//!
//! This module provides a wrapper around the raw HCI socket interface,
//! allowing for communication with Bluetooth controllers, adapter and
//! connection lookup through the kernel's HCI ioctls, and raw ACL writes.

use crate::addr::BdAddr;
use crate::error::HciError;
use crate::hci::constants::*;
use crate::hci::packet::{HciCommand, HciEvent};
use log::trace;
use std::io::{self, IoSlice};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

// Bluetooth socket constants
const AF_BLUETOOTH: i32 = 31;
const BTPROTO_HCI: i32 = 1;

/// Represents an HCI socket
#[derive(Debug)]
pub struct HciSocket {
    fd: RawFd,
}

// Define the sockaddr_hci structure
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct HciDevReq {
    dev_id: u16,
    dev_opt: u32,
}

#[repr(C)]
struct HciDevListReq {
    dev_num: u16,
    dev_req: [HciDevReq; HCI_MAX_DEV],
}

// Mirrors struct hci_dev_info; only the address is read back
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct HciDevInfo {
    dev_id: u16,
    name: [u8; 8],
    bdaddr: [u8; 6],
    flags: u32,
    dev_type: u8,
    features: [u8; 8],
    pkt_type: u32,
    link_policy: u32,
    link_mode: u32,
    acl_mtu: u16,
    acl_pkts: u16,
    sco_mtu: u16,
    sco_pkts: u16,
    stat: [u32; 10],
}

/// Connection information reported by the kernel for one baseband link
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HciConnInfo {
    pub handle: u16,
    pub bdaddr: [u8; 6],
    pub link_type: u8,
    pub out: u8,
    pub state: u16,
    pub link_mode: u32,
}

#[repr(C)]
struct HciConnInfoReq {
    bdaddr: [u8; 6],
    link_type: u8,
    conn_info: HciConnInfo,
}

/// An adapter known to the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HciDevice {
    pub dev_id: u16,
    pub up: bool,
}

impl HciSocket {
    /// Gets the raw file descriptor for the socket
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Opens an HCI socket that is not bound to any adapter.
    ///
    /// Unbound sockets are only good for the device-level ioctls.
    pub fn unbound() -> Result<Self, HciError> {
        let fd = unsafe {
            libc::socket(
                AF_BLUETOOTH,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                BTPROTO_HCI,
            )
        };

        if fd < 0 {
            return Err(HciError::SocketError(io::Error::last_os_error()));
        }

        Ok(HciSocket { fd })
    }

    /// Opens a new HCI socket
    ///
    /// # Arguments
    ///
    /// * `dev_id` - The device ID to open (0 for the first device)
    ///
    /// # Returns
    ///
    /// A new `HciSocket` instance or an error if the socket could not be opened
    pub fn open(dev_id: u16) -> Result<Self, HciError> {
        let socket = Self::unbound()?;

        // Bind to the specified device
        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW,
        };

        let result = unsafe {
            libc::bind(
                socket.fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::BindError(dev_id, io::Error::last_os_error()));
        }

        Ok(socket)
    }

    /// Lets every HCI event through the socket filter
    pub fn set_event_filter(&self) -> Result<(), HciError> {
        let filter = HciFilter {
            type_mask: 1 << HCI_EVENT_PKT,
            event_mask: [u32::MAX, u32::MAX],
            opcode: 0,
        };

        let result = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_HCI,
                HCI_FILTER,
                &filter as *const _ as *const libc::c_void,
                std::mem::size_of::<HciFilter>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::SocketError(io::Error::last_os_error()));
        }

        Ok(())
    }

    /// Lists the adapters registered with the kernel
    pub fn devices(&self) -> Result<Vec<HciDevice>, HciError> {
        let mut req = HciDevListReq {
            dev_num: HCI_MAX_DEV as u16,
            dev_req: [HciDevReq::default(); HCI_MAX_DEV],
        };

        let result = unsafe { libc::ioctl(self.fd, HCIGETDEVLIST as _, &mut req as *mut HciDevListReq) };
        if result < 0 {
            return Err(HciError::IoctlError("HCIGETDEVLIST", io::Error::last_os_error()));
        }

        let count = (req.dev_num as usize).min(HCI_MAX_DEV);
        Ok(req.dev_req[..count]
            .iter()
            .map(|dr| HciDevice {
                dev_id: dr.dev_id,
                up: dr.dev_opt & (1 << HCI_UP) != 0,
            })
            .collect())
    }

    /// Reads the public address of an adapter
    pub fn device_address(&self, dev_id: u16) -> Result<BdAddr, HciError> {
        let mut info = HciDevInfo {
            dev_id,
            ..Default::default()
        };

        let result = unsafe { libc::ioctl(self.fd, HCIGETDEVINFO as _, &mut info as *mut HciDevInfo) };
        if result < 0 {
            return Err(HciError::IoctlError("HCIGETDEVINFO", io::Error::last_os_error()));
        }

        Ok(BdAddr::new(info.bdaddr))
    }

    /// Looks up the baseband connection of the given link type to `peer`.
    ///
    /// Only meaningful on a socket bound to an adapter.
    pub fn conn_info(&self, peer: BdAddr, link_type: u8) -> Result<HciConnInfo, HciError> {
        let mut req = HciConnInfoReq {
            bdaddr: peer.bytes,
            link_type,
            conn_info: HciConnInfo::default(),
        };

        let result = unsafe { libc::ioctl(self.fd, HCIGETCONNINFO as _, &mut req as *mut HciConnInfoReq) };
        if result < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOENT) {
                return Err(HciError::NotConnected(peer));
            }
            return Err(HciError::IoctlError("HCIGETCONNINFO", err));
        }

        Ok(req.conn_info)
    }

    /// Read an HCI event from the socket
    pub fn read_event(&self) -> Result<HciEvent, HciError> {
        let mut buffer = [0u8; HCI_MAX_EVENT_SIZE];

        // Read packet type and header
        let bytes_read = unsafe {
            libc::read(
                self.fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
            )
        };

        if bytes_read < 0 {
            return Err(HciError::ReceiveError(io::Error::last_os_error()));
        }

        if bytes_read < 3 || buffer[0] != HCI_EVENT_PKT {
            return Err(HciError::InvalidPacketFormat);
        }

        // Parse event
        match HciEvent::parse(&buffer[1..bytes_read as usize]) {
            Some(event) => Ok(event),
            None => Err(HciError::InvalidPacketFormat),
        }
    }

    /// Read an HCI event from the socket with a timeout
    pub fn read_event_timeout(&self, timeout: Option<Duration>) -> Result<HciEvent, HciError> {
        if let Some(timeout) = timeout {
            // Set up the fd_set for select()
            let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
            unsafe {
                libc::FD_ZERO(&mut read_fds);
                libc::FD_SET(self.fd, &mut read_fds);
            }

            // Set up the timeout
            let mut timeout_val = libc::timeval {
                tv_sec: timeout.as_secs() as libc::time_t,
                tv_usec: timeout.subsec_micros() as libc::suseconds_t,
            };

            // Wait for data to be available
            let result = unsafe {
                libc::select(
                    self.fd + 1,
                    &mut read_fds,
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    &mut timeout_val,
                )
            };

            if result < 0 {
                return Err(HciError::ReceiveError(io::Error::last_os_error()));
            }

            if result == 0 {
                return Err(HciError::ReceiveError(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "Timed out waiting for HCI event",
                )));
            }
        }

        // Read the event
        self.read_event()
    }

    /// Sends an HCI command to the controller
    pub fn send_command(&self, command: &HciCommand) -> Result<(), HciError> {
        let packet = command.to_packet();
        match unsafe {
            libc::write(
                self.fd,
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
            )
        } {
            -1 => Err(HciError::SendError(io::Error::last_os_error())),
            _ => Ok(()),
        }
    }

    /// Sends a command and waits for the event that completes it.
    ///
    /// `completion` is the event code that ends the request: Command Complete
    /// for most host controller commands, or an asynchronous event such as
    /// Authentication Complete for link control commands. A failing Command
    /// Status ends the request early. Unrelated events are skipped.
    pub fn send_request(
        &self,
        command: &HciCommand,
        completion: u8,
        timeout: Duration,
    ) -> Result<HciEvent, HciError> {
        let opcode = command.opcode();
        self.send_command(command)?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HciError::Timeout(opcode));
            }

            let event = match self.read_event_timeout(Some(remaining)) {
                Ok(event) => event,
                Err(HciError::ReceiveError(err)) if err.kind() == io::ErrorKind::TimedOut => {
                    return Err(HciError::Timeout(opcode));
                }
                Err(HciError::ReceiveError(err)) if err.kind() == io::ErrorKind::Interrupted => {
                    continue;
                }
                Err(err) => return Err(err),
            };
            trace!("hci event 0x{:02x} for request 0x{:04x}", event.event_code, opcode);

            match event.event_code {
                EVT_CMD_STATUS if event.command_opcode() == Some(opcode) => {
                    let status = event.status().unwrap_or(0xff);
                    if status != 0 {
                        return Err(HciError::CommandFailed { opcode, status });
                    }
                    if completion == EVT_CMD_STATUS {
                        return Ok(event);
                    }
                }
                EVT_CMD_COMPLETE if event.command_opcode() == Some(opcode) => {
                    return Ok(event);
                }
                code if code == completion && code != EVT_CMD_COMPLETE && code != EVT_CMD_STATUS => {
                    return Ok(event);
                }
                _ => {}
            }
        }
    }

    /// Writes one packet assembled from several buffers
    pub fn write_vectored(&self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        // IoSlice is ABI compatible with struct iovec
        let written = unsafe {
            libc::writev(
                self.fd,
                bufs.as_ptr() as *const libc::iovec,
                bufs.len() as libc::c_int,
            )
        };

        if written < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(written as usize)
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for HciSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Picks the adapter to use for local operations.
///
/// With a `local` address, the adapter that owns it; otherwise the first
/// adapter that is up.
pub fn route(local: Option<BdAddr>) -> Result<u16, HciError> {
    let ctl = HciSocket::unbound()?;

    for dev in ctl.devices()?.into_iter().filter(|dev| dev.up) {
        match local {
            None => return Ok(dev.dev_id),
            Some(addr) if ctl.device_address(dev.dev_id)? == addr => return Ok(dev.dev_id),
            Some(_) => {}
        }
    }

    match local {
        Some(addr) => Err(HciError::AdapterNotFound(addr)),
        None => Err(HciError::NoAdapter),
    }
}

/// Finds the adapter holding an ACL link to `peer` and opens a socket on it.
///
/// Returns the bound socket and the link's connection handle.
pub fn open_connection(peer: BdAddr) -> Result<(HciSocket, u16), HciError> {
    let devices = HciSocket::unbound()?.devices()?;

    for dev in devices.into_iter().filter(|dev| dev.up) {
        let socket = HciSocket::open(dev.dev_id)?;
        match socket.conn_info(peer, ACL_LINK) {
            Ok(info) => return Ok((socket, info.handle)),
            Err(HciError::NotConnected(_)) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(HciError::NotConnected(peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_kernel_struct_layout() {
        // Sizes of the structs behind the HCI ioctls on Linux
        assert_eq!(size_of::<SockaddrHci>(), 6);
        assert_eq!(size_of::<HciFilter>(), 16);
        assert_eq!(size_of::<HciDevReq>(), 8);
        assert_eq!(size_of::<HciDevListReq>(), 4 + 8 * HCI_MAX_DEV);
        assert_eq!(size_of::<HciDevInfo>(), 92);
        assert_eq!(size_of::<HciConnInfo>(), 16);
        assert_eq!(align_of::<HciConnInfo>(), 4);
        // bdaddr (6) + type (1), then conn_info aligned to 4
        assert_eq!(size_of::<HciConnInfoReq>(), 24);
    }
}
