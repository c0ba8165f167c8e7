//! Peer addresses for one relay run

use super::table::Side;
use crate::addr::BdAddr;

/// The configured master, the optional local adapter and the slave address
/// learned from the first non-master connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    master: BdAddr,
    local: Option<BdAddr>,
    slave: Option<BdAddr>,
}

impl Session {
    pub fn new(master: BdAddr, local: Option<BdAddr>) -> Self {
        Self {
            master,
            local,
            slave: None,
        }
    }

    pub fn master(&self) -> BdAddr {
        self.master
    }

    pub fn local(&self) -> Option<BdAddr> {
        self.local
    }

    pub fn slave(&self) -> Option<BdAddr> {
        self.slave
    }

    /// Any peer other than the master is treated as the slave
    pub fn classify(&self, peer: BdAddr) -> Side {
        if peer == self.master {
            Side::Master
        } else {
            Side::Slave
        }
    }

    /// Records the slave address the first time one is seen.
    ///
    /// Returns `true` only for that first call; later addresses are ignored.
    pub fn discover_slave(&mut self, peer: BdAddr) -> bool {
        if self.slave.is_some() {
            return false;
        }
        self.slave = Some(peer);
        true
    }
}
