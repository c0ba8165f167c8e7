//! Manual ACL segmentation of L2CAP frames
//!
//! The kernel refuses to send an L2CAP frame larger than the socket's
//! outgoing MTU. Writing the frame as raw HCI ACL packets bypasses that
//! check: the first packet carries the ACL header, the L2CAP basic header and
//! the start of the payload; every following packet carries an ACL header
//! flagged as a continuation and the next chunk of payload.
//!
//! Fragment layout on the raw HCI socket:
//!
//! ```text
//! start:        | 0x02 | handle|START, dlen | len, cid | data... |
//! continuation: | 0x02 | handle|CONT,  dlen | data...            |
//! ```
//!
//! All multi-byte fields are little-endian.

use crate::addr::BdAddr;
use crate::error::{Error, Result};
use crate::hci::constants::*;
use crate::hci::packet::AclHeader;
use crate::hci::socket::{self, HciSocket};
use crate::l2cap::constants::L2CAP_BASIC_HEADER_SIZE;
use crate::l2cap::packet::L2capHeader;
use log::{debug, warn};
use std::io::{self, IoSlice};

#[cfg(test)]
mod tests;

/// Bytes in front of the payload in a start fragment
pub const START_OVERHEAD: usize = 1 + HCI_ACL_HDR_SIZE + L2CAP_BASIC_HEADER_SIZE;

/// Bytes in front of the payload in a continuation fragment
pub const CONTINUATION_OVERHEAD: usize = 1 + HCI_ACL_HDR_SIZE;

/// Payload bytes that fit in the start fragment
pub fn first_capacity(mtu: usize) -> usize {
    mtu.saturating_sub(START_OVERHEAD)
}

/// Payload bytes that fit in each continuation fragment
pub fn continuation_capacity(mtu: usize) -> usize {
    mtu.saturating_sub(CONTINUATION_OVERHEAD)
}

/// One ACL data packet ready for the raw HCI socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub acl: AclHeader,
    /// Present on the start fragment only
    pub l2cap: Option<L2capHeader>,
    pub data: &'a [u8],
}

impl<'a> Fragment<'a> {
    pub fn is_start(&self) -> bool {
        self.l2cap.is_some()
    }

    /// Packet type, ACL header and (start only) L2CAP header
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(START_OVERHEAD);
        header.push(HCI_ACL_PKT);
        header.extend_from_slice(&self.acl.to_bytes());
        if let Some(l2cap) = &self.l2cap {
            header.extend_from_slice(&l2cap.to_bytes());
        }
        header
    }

    /// Full packet as it goes on the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packet = self.header_bytes();
        packet.extend_from_slice(self.data);
        packet
    }
}

/// Splits one L2CAP payload into ACL fragments of at most `mtu` bytes
#[derive(Debug, Clone)]
pub struct Segmenter<'a> {
    handle: u16,
    cid: u16,
    payload: &'a [u8],
    mtu: usize,
    offset: usize,
    started: bool,
}

impl<'a> Segmenter<'a> {
    pub fn new(handle: u16, cid: u16, payload: &'a [u8], mtu: usize) -> Result<Self> {
        if payload.len() > u16::MAX as usize {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        // Every fragment must be able to carry at least one payload byte
        if mtu <= START_OVERHEAD {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("ACL MTU {} leaves no room for payload", mtu),
            )));
        }

        Ok(Self {
            handle,
            cid,
            payload,
            mtu,
            offset: 0,
            started: false,
        })
    }
}

impl<'a> Iterator for Segmenter<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Fragment<'a>> {
        let total = self.payload.len();

        if !self.started {
            self.started = true;

            let chunk = first_capacity(self.mtu).min(total);
            self.offset = chunk;

            return Some(Fragment {
                acl: AclHeader::new(
                    self.handle,
                    ACL_START,
                    (chunk + L2CAP_BASIC_HEADER_SIZE) as u16,
                ),
                l2cap: Some(L2capHeader::new(total as u16, self.cid)),
                data: &self.payload[..chunk],
            });
        }

        if self.offset >= total {
            return None;
        }

        let remaining = total - self.offset;
        let chunk = continuation_capacity(self.mtu).min(remaining);
        let data = &self.payload[self.offset..self.offset + chunk];
        self.offset += chunk;

        // dlen is the outstanding length before this chunk, not the chunk size
        Some(Fragment {
            acl: AclHeader::new(self.handle, ACL_CONT, remaining as u16),
            l2cap: None,
            data,
        })
    }
}

/// Destination for raw ACL fragments
pub trait FragmentSink {
    /// Writes one fragment as a single vectored write
    fn write_fragment(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;
}

impl FragmentSink for HciSocket {
    fn write_fragment(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.write_vectored(bufs)
    }
}

/// Writes `payload` to `sink` as ACL fragments on connection `handle`.
///
/// Would-block and interrupted writes are retried. Any other failure stops
/// the remaining fragments and fails the whole call. Returns the number of
/// fragments written.
pub fn send_segmented<S: FragmentSink>(
    sink: &mut S,
    handle: u16,
    cid: u16,
    payload: &[u8],
    mtu: usize,
) -> Result<usize> {
    let mut count = 0;

    for fragment in Segmenter::new(handle, cid, payload, mtu)? {
        let header = fragment.header_bytes();
        let mut bufs = vec![IoSlice::new(&header)];
        if !fragment.data.is_empty() {
            bufs.push(IoSlice::new(fragment.data));
        }
        let expected = header.len() + fragment.data.len();

        loop {
            match sink.write_fragment(&bufs) {
                Ok(n) if n == expected => break,
                Ok(n) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short ACL write: {} of {} bytes", n, expected),
                    )));
                }
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::Interrupted =>
                {
                    continue;
                }
                Err(err) => {
                    warn!("ACL write failed after {} fragments: {}", count, err);
                    return Err(err.into());
                }
            }
        }

        count += 1;
    }

    Ok(count)
}

/// Sends one L2CAP frame to `dst` on channel `cid` as raw ACL fragments.
///
/// Fails if there is no ACL connection to `dst`. The HCI socket is closed on
/// every path.
pub fn send_data(dst: BdAddr, cid: u16, payload: &[u8]) -> Result<()> {
    let (mut socket, handle) = socket::open_connection(dst)?;

    let fragments = send_segmented(&mut socket, handle, cid, payload, ACL_MTU)?;
    debug!(
        "sent {} bytes to {} (cid: 0x{:04x}) in {} ACL fragments",
        payload.len(),
        dst,
        cid,
        fragments
    );

    Ok(())
}
