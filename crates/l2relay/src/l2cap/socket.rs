//! BlueZ L2CAP sockets
//!
//! Connection-oriented `SOCK_SEQPACKET` sockets: one listener per relayed
//! PSM, accepted streams from either peer, and non-blocking outgoing
//! connects whose completion is probed after the socket polls writable.

use super::constants::*;
use super::psm::PSM;
use super::types::{L2capError, L2capResult};
use crate::addr::BdAddr;
use crate::error::Result;
use crate::relay::{Accepted, Transport};
use log::{debug, info, warn};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

// Define the sockaddr_l2 structure
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct SockaddrL2 {
    l2_family: libc::sa_family_t,
    l2_psm: u16,
    l2_bdaddr: [u8; 6],
    l2_cid: u16,
    l2_bdaddr_type: u8,
}

impl SockaddrL2 {
    fn new(addr: BdAddr, psm: u16) -> Self {
        Self {
            l2_family: AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: psm.to_le(),
            l2_bdaddr: addr.bytes,
            ..Default::default()
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct L2capOptions {
    omtu: u16,
    imtu: u16,
    flush_to: u16,
    mode: u8,
    fcs: u8,
    max_tx: u8,
    txwin_size: u16,
}

#[repr(C)]
struct BtPower {
    force_active: u8,
}

fn open_socket(flags: i32) -> io::Result<RawFd> {
    let fd = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC | flags,
            BTPROTO_L2CAP,
        )
    };

    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(fd)
}

fn setsockopt<T>(fd: RawFd, level: i32, name: i32, value: &T) -> io::Result<()> {
    let result = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            value as *const T as *const libc::c_void,
            std::mem::size_of::<T>() as libc::socklen_t,
        )
    };

    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Link mode master, 1024-byte MTU both ways, no forced active mode.
///
/// None of these are required for relaying, so failures are only logged.
fn configure(fd: RawFd) {
    if let Err(err) = setsockopt(fd, SOL_L2CAP, L2CAP_LM, &L2CAP_LM_MASTER) {
        warn!("setsockopt L2CAP_LM: {}", err);
    }

    let mut opts = L2capOptions::default();
    let mut len = std::mem::size_of::<L2capOptions>() as libc::socklen_t;
    let result = unsafe {
        libc::getsockopt(
            fd,
            SOL_L2CAP,
            L2CAP_OPTIONS,
            &mut opts as *mut L2capOptions as *mut libc::c_void,
            &mut len,
        )
    };
    if result < 0 {
        warn!("getsockopt L2CAP_OPTIONS: {}", io::Error::last_os_error());
    } else {
        opts.omtu = L2CAP_MTU;
        opts.imtu = L2CAP_MTU;
        if let Err(err) = setsockopt(fd, SOL_L2CAP, L2CAP_OPTIONS, &opts) {
            warn!("setsockopt L2CAP_OPTIONS: {}", err);
        }
    }

    let power = BtPower {
        force_active: BT_POWER_FORCE_ACTIVE_OFF,
    };
    if let Err(err) = setsockopt(fd, SOL_BLUETOOTH, BT_POWER, &power) {
        warn!("setsockopt BT_POWER: {}", err);
    }
}

fn bind(fd: RawFd, addr: &SockaddrL2) -> io::Result<()> {
    let result = unsafe {
        libc::bind(
            fd,
            addr as *const SockaddrL2 as *const libc::sockaddr,
            std::mem::size_of::<SockaddrL2>() as libc::socklen_t,
        )
    };

    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// A listening L2CAP socket bound to one PSM on any local adapter
#[derive(Debug)]
pub struct L2capListener {
    fd: RawFd,
    psm: PSM,
}

impl L2capListener {
    pub fn bind(psm: PSM) -> L2capResult<Self> {
        let fd = open_socket(0).map_err(L2capError::Socket)?;
        // Closes the descriptor on every error path below
        let listener = Self { fd, psm };

        configure(fd);

        let listen_err = |source| L2capError::Listen { psm, source };

        bind(fd, &SockaddrL2::new(BdAddr::ANY, psm.value())).map_err(listen_err)?;

        if unsafe { libc::listen(fd, L2CAP_LISTEN_BACKLOG) } < 0 {
            return Err(listen_err(io::Error::last_os_error()));
        }

        info!("listening on psm: {}", psm);
        Ok(listener)
    }

    /// Accepts one pending connection
    pub fn accept(&self) -> L2capResult<Accepted<L2capStream>> {
        let mut addr = SockaddrL2::default();
        let mut len = std::mem::size_of::<SockaddrL2>() as libc::socklen_t;

        let fd = unsafe {
            libc::accept4(
                self.fd,
                &mut addr as *mut SockaddrL2 as *mut libc::sockaddr,
                &mut len,
                libc::SOCK_CLOEXEC,
            )
        };

        if fd < 0 {
            return Err(L2capError::Accept {
                psm: self.psm,
                source: io::Error::last_os_error(),
            });
        }

        let peer = BdAddr::new(addr.l2_bdaddr);
        let psm = u16::from_le(addr.l2_psm);
        debug!("accepted connection from {} (psm: 0x{:04x})", peer, psm);

        Ok(Accepted {
            stream: L2capStream { fd },
            peer,
            psm,
            cid: u16::from_le(addr.l2_cid),
        })
    }
}

impl AsRawFd for L2capListener {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for L2capListener {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// A connected (or connecting) L2CAP socket
#[derive(Debug)]
pub struct L2capStream {
    fd: RawFd,
}

impl L2capStream {
    /// Starts a non-blocking connect to `remote`.
    ///
    /// The socket is bound to `local` first when given. The returned stream
    /// polls writable once the connect resolves; use
    /// [`L2capStream::is_connected`] to find out how.
    pub fn connect(local: Option<BdAddr>, remote: BdAddr, psm: PSM) -> L2capResult<Self> {
        let fd = open_socket(libc::SOCK_NONBLOCK).map_err(L2capError::Socket)?;
        let stream = Self { fd };

        configure(fd);

        let connect_err = |source| L2capError::Connect {
            remote,
            psm,
            source,
        };

        if let Some(local) = local {
            bind(fd, &SockaddrL2::new(local, 0)).map_err(connect_err)?;
        }

        let addr = SockaddrL2::new(remote, psm.value());
        let result = unsafe {
            libc::connect(
                fd,
                &addr as *const SockaddrL2 as *const libc::sockaddr,
                std::mem::size_of::<SockaddrL2>() as libc::socklen_t,
            )
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINPROGRESS) {
                return Err(connect_err(err));
            }
        }

        Ok(stream)
    }

    /// Probes a non-blocking connect.
    ///
    /// `Ok(true)` once connected, `Ok(false)` while still in progress, and
    /// the socket error if the connect failed.
    pub fn is_connected(&self) -> io::Result<bool> {
        let mut error: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

        let result = unsafe {
            libc::getsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut error as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        match error {
            0 => {}
            libc::EINPROGRESS => return Ok(false),
            errno => return Err(io::Error::from_raw_os_error(errno)),
        }

        // No pending error yet; a peer name only exists once connected
        match self.peer_name() {
            Ok(_) => Ok(true),
            Err(err) if err.raw_os_error() == Some(libc::ENOTCONN) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Channel id the peer allocated for this channel (the destination cid
    /// of frames sent to it)
    pub fn channel_id(&self) -> io::Result<u16> {
        let addr = self.peer_name()?;
        Ok(u16::from_le(addr.l2_cid))
    }

    fn peer_name(&self) -> io::Result<SockaddrL2> {
        let mut addr = SockaddrL2::default();
        let mut len = std::mem::size_of::<SockaddrL2>() as libc::socklen_t;
        let result = unsafe {
            libc::getpeername(
                self.fd,
                &mut addr as *mut SockaddrL2 as *mut libc::sockaddr,
                &mut len,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(addr)
    }
}

impl Read for L2capStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };

        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(n as usize)
    }
}

impl Write for L2capStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };

        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRawFd for L2capStream {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for L2capStream {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// [`Transport`] over BlueZ L2CAP sockets, with oversized frames sent as
/// raw ACL fragments
#[derive(Debug, Default)]
pub struct L2capTransport;

impl L2capTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for L2capTransport {
    type Listener = L2capListener;
    type Stream = L2capStream;

    fn listen(&mut self, psm: PSM) -> Result<L2capListener> {
        Ok(L2capListener::bind(psm)?)
    }

    fn accept(&mut self, listener: &L2capListener) -> Result<Accepted<L2capStream>> {
        Ok(listener.accept()?)
    }

    fn connect(&mut self, local: Option<BdAddr>, remote: BdAddr, psm: PSM) -> Result<L2capStream> {
        Ok(L2capStream::connect(local, remote, psm)?)
    }

    fn is_connected(&mut self, stream: &L2capStream) -> io::Result<bool> {
        stream.is_connected()
    }

    fn channel_id(&mut self, stream: &L2capStream) -> io::Result<u16> {
        stream.channel_id()
    }

    fn send_acl(&mut self, dst: BdAddr, cid: u16, payload: &[u8]) -> Result<()> {
        crate::acl::send_data(dst, cid, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_kernel_struct_layout() {
        // Sizes of struct sockaddr_l2 and struct l2cap_options on Linux
        assert_eq!(size_of::<SockaddrL2>(), 14);
        assert_eq!(size_of::<L2capOptions>(), 12);
        assert_eq!(size_of::<BtPower>(), 1);
    }

    #[test]
    fn test_sockaddr_byte_order() {
        let addr = SockaddrL2::new("00:1B:DC:0F:AA:58".parse().unwrap(), PSM::HID_CONTROL.value());

        assert_eq!(addr.l2_family, AF_BLUETOOTH as libc::sa_family_t);
        assert_eq!(u16::from_le(addr.l2_psm), 0x0011);
        assert_eq!(addr.l2_bdaddr, [0x58, 0xAA, 0x0F, 0xDC, 0x1B, 0x00]);
        assert_eq!(addr.l2_cid, 0);
    }
}
