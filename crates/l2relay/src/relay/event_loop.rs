use super::poll::{self, Interest, Readiness};
use super::session::Session;
use super::table::{ChannelState, ChannelTable, Side};
use super::{LinkControl, Transport, ZERO_LINK_KEY};
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::l2cap::constants::L2CAP_DEFAULT_MTU;
use crate::l2cap::PSM;
use log::{debug, error, info, trace, warn};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Single-threaded relay over one [`ChannelTable`]
pub struct Relay<T: Transport, K: LinkControl> {
    config: RelayConfig,
    session: Session,
    transport: T,
    link: K,
    table: ChannelTable<T::Listener, T::Stream>,
    buf: Vec<u8>,
}

impl<T: Transport, K: LinkControl> Relay<T, K> {
    pub fn new(config: RelayConfig, transport: T, link: K) -> Self {
        Self {
            session: Session::new(config.master, config.local),
            table: ChannelTable::new(&config.psms),
            buf: vec![0; config.buffer_size],
            config,
            transport,
            link,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn table(&self) -> &ChannelTable<T::Listener, T::Stream> {
        &self.table
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn link(&self) -> &K {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut K {
        &mut self.link
    }

    /// Opens a listener on every configured PSM.
    ///
    /// Any failure is fatal; listeners opened so far are closed again.
    pub fn start(&mut self) -> Result<()> {
        let psms: Vec<PSM> = self.table.psms().collect();

        for psm in psms {
            match self.transport.listen(psm) {
                Ok(listener) => self.table.set_listener(psm, listener),
                Err(err) => {
                    error!("can't listen on {}: {}", psm, err);
                    self.table.close_all();
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Relays until `stop` is set or a fatal error occurs, then closes every
    /// descriptor
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        let timeout = self.config.poll_timeout;

        let result = loop {
            if stop.load(Ordering::SeqCst) {
                info!("stop requested");
                break Ok(());
            }

            if let Err(err) = self.poll_once(timeout) {
                error!("relay stopped: {}", err);
                break Err(err);
            }
        };

        self.shutdown();
        result
    }

    /// Waits once for readiness and services every ready slot.
    ///
    /// Returns the number of ready descriptors.
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let interests = self.table.interests();
        let ready = poll::wait(&interests, timeout)?;

        for &(index, revents) in &ready {
            self.dispatch(&interests[index], revents)?;
        }

        Ok(ready.len())
    }

    /// Closes everything, last PSM first
    pub fn shutdown(&mut self) {
        let closed = self.table.close_all();
        if closed > 0 {
            info!("closed {} descriptors", closed);
        }
    }

    fn dispatch(&mut self, interest: &Interest, revents: Readiness) -> Result<()> {
        let psm = interest.psm;

        // Slot was closed or refilled earlier in this wake
        if self.table.occupant(psm, interest.role) != Some(interest.fd) {
            trace!("skipping stale {} slot ({})", interest.role, psm);
            return Ok(());
        }

        trace!("{} ready ({}): {:?}", interest.role, psm, revents);

        match interest.role.side() {
            None => {
                if revents.is_failure() {
                    warn!("poll error on listening socket ({})", psm);
                }
                if revents.contains(Readiness::READABLE) {
                    self.accept(psm)?;
                }
            }
            Some(side) if interest.role.is_connecting() => {
                if revents.contains(Readiness::WRITABLE) || revents.is_failure() {
                    self.probe(psm, side)?;
                }
            }
            Some(side) => {
                if revents.is_failure() {
                    warn!("poll error on {} side ({})", side, psm);
                    self.teardown(psm)?;
                } else if revents.contains(Readiness::READABLE) {
                    self.forward(psm, side)?;
                }
            }
        }

        Ok(())
    }

    fn accept(&mut self, psm: PSM) -> Result<()> {
        let Some(listener) = self.table.listener(psm) else {
            return Ok(());
        };

        let accepted = match self.transport.accept(listener) {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("accept failed ({}): {}", psm, err);
                return Ok(());
            }
        };

        let peer = accepted.peer;
        let side = self.session.classify(peer);
        info!(
            "accepted {} connection from {} ({}, cid: 0x{:04x})",
            side, peer, psm, accepted.cid
        );

        if !self.table.is_idle(psm) {
            warn!("{} already in use, rejecting {}", psm, peer);
            return Ok(());
        }

        let target = match side {
            Side::Slave => {
                if self.session.discover_slave(peer) {
                    info!("slave address is {}", peer);
                } else if let Some(known) = self.session.slave().filter(|known| *known != peer) {
                    warn!("connection from {} while the slave is {}", peer, known);
                }
                self.session.master()
            }
            Side::Master => {
                let Some(slave) = self.session.slave() else {
                    warn!("slave address unknown, rejecting master ({})", psm);
                    return Ok(());
                };

                if psm == PSM::HID_CONTROL {
                    self.secure_master_link();
                }
                slave
            }
        };

        let far = side.opposite();
        info!("connecting to {} {} ({})", far, target, psm);

        match self.transport.connect(self.session.local(), target, psm) {
            Ok(stream) => {
                self.table.set_cid(psm, side, accepted.cid);
                self.table
                    .set_side(psm, side, ChannelState::Connected(accepted.stream));
                self.table
                    .set_side(psm, far, ChannelState::connecting(stream));
            }
            Err(err) => {
                warn!("can't connect to {} ({}): {}", far, psm, err);
            }
        }

        Ok(())
    }

    /// Authenticates then encrypts the console link; failures only logged
    fn secure_master_link(&mut self) {
        let master = self.session.master();

        if let Err(err) = self.link.authenticate_link(master) {
            warn!("authentication of {} failed: {}", master, err);
        }
        if let Err(err) = self.link.encrypt_link(master) {
            warn!("encryption of {} failed: {}", master, err);
        }
    }

    fn probe(&mut self, psm: PSM, side: Side) -> Result<()> {
        let result = match self.table.side(psm, side) {
            Some(ChannelState::Connecting { stream, .. }) => self.transport.is_connected(stream),
            _ => return Ok(()),
        };

        match result {
            Ok(true) => {
                if let Some(elapsed) = self.table.promote(psm, side) {
                    info!("{} connected ({}) after {:?}", side, psm, elapsed);
                    self.learn_cid(psm, side);
                }
                Ok(())
            }
            Ok(false) => {
                trace!("connect to {} still pending ({})", side, psm);
                Ok(())
            }
            Err(err) => {
                warn!("connect to {} failed ({}): {}", side, psm, err);
                self.teardown(psm)
            }
        }
    }

    /// Records the remote cid of an outgoing channel; without it oversized
    /// frames fall back to the socket
    fn learn_cid(&mut self, psm: PSM, side: Side) {
        let cid = match self.table.side(psm, side) {
            Some(ChannelState::Connected(stream)) => self.transport.channel_id(stream),
            _ => return,
        };

        match cid {
            Ok(cid) => {
                debug!("{} cid: 0x{:04x} ({})", side, cid, psm);
                self.table.set_cid(psm, side, cid);
            }
            Err(err) => warn!("can't read {} cid ({}): {}", side, psm, err),
        }
    }

    fn forward(&mut self, psm: PSM, from: Side) -> Result<()> {
        let to = from.opposite();

        let read = match self.table.connected_mut(psm, from) {
            Some(stream) => stream.read(&mut self.buf),
            None => return Ok(()),
        };

        let len = match read {
            Ok(0) => {
                info!("{} closed the channel ({})", from, psm);
                return self.teardown(psm);
            }
            Ok(len) => len,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                debug!("read from {} interrupted ({})", from, psm);
                return Ok(());
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) => {
                warn!("read from {} failed ({}): {}", from, psm, err);
                return self.teardown(psm);
            }
        };

        let data = &self.buf[..len];

        if self.config.dump_payloads {
            debug!(
                "{} > {} ({}, {} bytes)\n{}",
                from,
                to,
                psm,
                len,
                hex_dump(data)
            );
        }

        // Oversized frames toward the console need hand-made ACL fragments
        let acl_cid = match to {
            Side::Master if len > L2CAP_DEFAULT_MTU => self.table.cid(psm, Side::Master),
            _ => None,
        };

        let Some(dst) = self.table.connected_mut(psm, to) else {
            debug!("{} not connected, dropping {} bytes ({})", to, len, psm);
            return Ok(());
        };

        let written = match acl_cid {
            Some(cid) => self.transport.send_acl(self.session.master(), cid, data),
            None => match dst.write(data) {
                Ok(n) if n == len => Ok(()),
                Ok(n) => Err(Error::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", n, len),
                ))),
                Err(err) => Err(err.into()),
            },
        };

        if let Err(err) = written {
            warn!("write to {} failed ({}): {}", to, psm, err);
        }

        Ok(())
    }

    /// Closes both sides of `psm`; an SDP pairing also resets the master's
    /// stored link key
    fn teardown(&mut self, psm: PSM) -> Result<()> {
        let closed = self.table.close_pair(psm);
        info!("closed {} descriptors ({})", closed, psm);

        if psm == PSM::SDP {
            self.reset_link_key()?;
        }

        Ok(())
    }

    fn reset_link_key(&mut self) -> Result<()> {
        let master = self.session.master();
        info!("resetting stored link key for {}", master);

        self.link
            .write_stored_link_key(self.session.local(), master, &ZERO_LINK_KEY)
            .map_err(|err| Error::LinkKeyReset {
                peer: master,
                source: Box::new(err),
            })
    }
}

impl<T: Transport, K: LinkControl> Drop for Relay<T, K> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Eight bytes per line
fn hex_dump(data: &[u8]) -> String {
    data.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .map(|byte| hex::encode([*byte]))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod dump_tests {
    use super::hex_dump;

    #[test]
    fn test_hex_dump_lines() {
        let data: Vec<u8> = (0..10).collect();

        assert_eq!(hex_dump(&data), "00 01 02 03 04 05 06 07\n08 09");
        assert_eq!(hex_dump(&[]), "");
    }
}
