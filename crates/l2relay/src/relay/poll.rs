//! Readiness wait over every tracked descriptor

use super::table::Role;
use crate::l2cap::PSM;
use bitflags::bitflags;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

bitflags! {
    /// `poll(2)` event bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Readiness: libc::c_short {
        const READABLE = libc::POLLIN;
        const WRITABLE = libc::POLLOUT;
        const ERROR = libc::POLLERR;
        const HANGUP = libc::POLLHUP;
        const INVALID = libc::POLLNVAL;
    }
}

impl Readiness {
    /// Error conditions reported regardless of the requested events
    pub fn is_failure(&self) -> bool {
        self.intersects(Readiness::ERROR | Readiness::HANGUP | Readiness::INVALID)
    }
}

/// One descriptor the event loop waits on, and the slot it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub psm: PSM,
    pub role: Role,
    pub fd: RawFd,
    pub events: Readiness,
}

/// Blocks until at least one interest is ready or `timeout` elapses.
///
/// Returns `(index into interests, events)` for every ready descriptor, in
/// the order of `interests`. A wait interrupted by a signal returns nothing.
pub fn wait(interests: &[Interest], timeout: Option<Duration>) -> io::Result<Vec<(usize, Readiness)>> {
    let mut fds: Vec<libc::pollfd> = interests
        .iter()
        .map(|interest| libc::pollfd {
            fd: interest.fd,
            events: interest.events.bits(),
            revents: 0,
        })
        .collect();

    let timeout_ms = match timeout {
        Some(timeout) => timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        None => -1,
    };

    let result = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };

    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Vec::new());
        }
        return Err(err);
    }

    Ok(fds
        .iter()
        .enumerate()
        .filter(|(_, pfd)| pfd.revents != 0)
        .map(|(i, pfd)| (i, Readiness::from_bits_truncate(pfd.revents)))
        .collect())
}
