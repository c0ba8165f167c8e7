//! Per-PSM channel slots
//!
//! Every relayed PSM owns a listener and two sides: the descriptor talking
//! to the slave and the descriptor talking to the master. A side is either
//! closed, waiting on a non-blocking connect, or connected. Together they
//! form the five roles the event loop polls:
//!
//! | role              | slot                         |
//! |-------------------|------------------------------|
//! | LISTEN            | listener                     |
//! | SLAVE             | slave side, connected        |
//! | MASTER            | master side, connected       |
//! | SLAVE-CONNECTING  | slave side, connect pending  |
//! | MASTER-CONNECTING | master side, connect pending |

use super::poll::{Interest, Readiness};
use crate::l2cap::PSM;
use std::fmt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Which peer a descriptor talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Slave,
    Master,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Slave => Side::Master,
            Side::Master => Side::Slave,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::Slave => 0,
            Side::Master => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Slave => write!(f, "slave"),
            Side::Master => write!(f, "master"),
        }
    }
}

/// Slot kinds, in the order the event loop services them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Listen,
    Slave,
    Master,
    SlaveConnecting,
    MasterConnecting,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Listen,
        Role::Slave,
        Role::Master,
        Role::SlaveConnecting,
        Role::MasterConnecting,
    ];

    /// Side the role belongs to; `None` for the listener
    pub fn side(self) -> Option<Side> {
        match self {
            Role::Listen => None,
            Role::Slave | Role::SlaveConnecting => Some(Side::Slave),
            Role::Master | Role::MasterConnecting => Some(Side::Master),
        }
    }

    pub fn is_connecting(self) -> bool {
        matches!(self, Role::SlaveConnecting | Role::MasterConnecting)
    }

    fn events(self) -> Readiness {
        if self.is_connecting() {
            Readiness::WRITABLE
        } else {
            Readiness::READABLE
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Listen => "LISTEN",
            Role::Slave => "SLAVE",
            Role::Master => "MASTER",
            Role::SlaveConnecting => "SLAVE-CONNECTING",
            Role::MasterConnecting => "MASTER-CONNECTING",
        };
        write!(f, "{}", name)
    }
}

/// One side of a relayed channel
#[derive(Debug)]
pub enum ChannelState<S> {
    Closed,
    Connecting {
        stream: S,
        started_at: Instant,
    },
    Connected(S),
}

impl<S> ChannelState<S> {
    pub fn connecting(stream: S) -> Self {
        ChannelState::Connecting {
            stream,
            started_at: Instant::now(),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ChannelState::Closed)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ChannelState::Connecting { .. })
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelState::Connected(_))
    }

    pub fn stream(&self) -> Option<&S> {
        match self {
            ChannelState::Closed => None,
            ChannelState::Connecting { stream, .. } | ChannelState::Connected(stream) => {
                Some(stream)
            }
        }
    }

    /// Role this state occupies on `side`
    pub fn role(&self, side: Side) -> Option<Role> {
        match (self, side) {
            (ChannelState::Closed, _) => None,
            (ChannelState::Connecting { .. }, Side::Slave) => Some(Role::SlaveConnecting),
            (ChannelState::Connecting { .. }, Side::Master) => Some(Role::MasterConnecting),
            (ChannelState::Connected(_), Side::Slave) => Some(Role::Slave),
            (ChannelState::Connected(_), Side::Master) => Some(Role::Master),
        }
    }
}

#[derive(Debug)]
struct PsmSlots<L, S> {
    psm: PSM,
    listener: Option<L>,
    sides: [ChannelState<S>; 2],
    cids: [Option<u16>; 2],
}

impl<L, S> PsmSlots<L, S> {
    fn new(psm: PSM) -> Self {
        Self {
            psm,
            listener: None,
            sides: [ChannelState::Closed, ChannelState::Closed],
            cids: [None, None],
        }
    }
}

/// Listener and channel slots for every relayed PSM, in [`PSM::ALL`] order
#[derive(Debug)]
pub struct ChannelTable<L, S> {
    slots: Vec<PsmSlots<L, S>>,
}

impl<L, S> ChannelTable<L, S>
where
    L: AsRawFd,
    S: AsRawFd,
{
    /// Empty table for `psms`; duplicates are ignored
    pub fn new(psms: &[PSM]) -> Self {
        let mut psms = psms.to_vec();
        psms.sort_by_key(|psm| psm.index());
        psms.dedup();

        Self {
            slots: psms.into_iter().map(PsmSlots::new).collect(),
        }
    }

    pub fn psms(&self) -> impl Iterator<Item = PSM> + '_ {
        self.slots.iter().map(|slot| slot.psm)
    }

    pub fn contains(&self, psm: PSM) -> bool {
        self.slot(psm).is_some()
    }

    fn slot(&self, psm: PSM) -> Option<&PsmSlots<L, S>> {
        self.slots.iter().find(|slot| slot.psm == psm)
    }

    fn slot_mut(&mut self, psm: PSM) -> Option<&mut PsmSlots<L, S>> {
        self.slots.iter_mut().find(|slot| slot.psm == psm)
    }

    pub fn set_listener(&mut self, psm: PSM, listener: L) {
        if let Some(slot) = self.slot_mut(psm) {
            slot.listener = Some(listener);
        }
    }

    pub fn listener(&self, psm: PSM) -> Option<&L> {
        self.slot(psm).and_then(|slot| slot.listener.as_ref())
    }

    pub fn side(&self, psm: PSM, side: Side) -> Option<&ChannelState<S>> {
        self.slot(psm).map(|slot| &slot.sides[side.index()])
    }

    /// Replaces one side, returning what was there
    pub fn set_side(&mut self, psm: PSM, side: Side, state: ChannelState<S>) -> ChannelState<S> {
        match self.slot_mut(psm) {
            Some(slot) => std::mem::replace(&mut slot.sides[side.index()], state),
            None => state,
        }
    }

    /// The stream on `side` if it is fully connected
    pub fn connected_mut(&mut self, psm: PSM, side: Side) -> Option<&mut S> {
        match self.slot_mut(psm).map(|slot| &mut slot.sides[side.index()]) {
            Some(ChannelState::Connected(stream)) => Some(stream),
            _ => None,
        }
    }

    /// Moves a pending connect into the connected role.
    ///
    /// Returns how long the connect took, or `None` if `side` was not
    /// connecting.
    pub fn promote(&mut self, psm: PSM, side: Side) -> Option<Duration> {
        let state = self.set_side(psm, side, ChannelState::Closed);
        match state {
            ChannelState::Connecting { stream, started_at } => {
                self.set_side(psm, side, ChannelState::Connected(stream));
                Some(started_at.elapsed())
            }
            other => {
                self.set_side(psm, side, other);
                None
            }
        }
    }

    /// Both sides closed
    pub fn is_idle(&self, psm: PSM) -> bool {
        self.slot(psm)
            .map(|slot| slot.sides.iter().all(ChannelState::is_closed))
            .unwrap_or(true)
    }

    pub fn set_cid(&mut self, psm: PSM, side: Side, cid: u16) {
        if let Some(slot) = self.slot_mut(psm) {
            slot.cids[side.index()] = Some(cid);
        }
    }

    /// Remote channel id recorded when `side` was accepted or connected
    pub fn cid(&self, psm: PSM, side: Side) -> Option<u16> {
        self.slot(psm).and_then(|slot| slot.cids[side.index()])
    }

    /// Descriptor currently held in `role` for `psm`
    pub fn occupant(&self, psm: PSM, role: Role) -> Option<RawFd> {
        let slot = self.slot(psm)?;
        match role.side() {
            None => slot.listener.as_ref().map(AsRawFd::as_raw_fd),
            Some(side) => {
                let state = &slot.sides[side.index()];
                if state.role(side) == Some(role) {
                    state.stream().map(AsRawFd::as_raw_fd)
                } else {
                    None
                }
            }
        }
    }

    /// Closes both sides of `psm` and forgets their channel ids.
    ///
    /// Returns the number of descriptors closed.
    pub fn close_pair(&mut self, psm: PSM) -> usize {
        let Some(slot) = self.slot_mut(psm) else {
            return 0;
        };

        let closed = slot.sides.iter().filter(|state| !state.is_closed()).count();
        slot.sides = [ChannelState::Closed, ChannelState::Closed];
        slot.cids = [None, None];
        closed
    }

    /// Everything to wait on: every listener first, then each connected and
    /// connecting role in [`Role::ALL`] order, PSMs in table order within a
    /// role
    pub fn interests(&self) -> Vec<Interest> {
        let mut interests = Vec::new();

        for role in Role::ALL {
            for slot in &self.slots {
                if let Some(fd) = self.occupant(slot.psm, role) {
                    interests.push(Interest {
                        psm: slot.psm,
                        role,
                        fd,
                        events: role.events(),
                    });
                }
            }
        }

        interests
    }

    /// Closes every descriptor, listeners included, last slot first.
    ///
    /// Returns the number of descriptors closed.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;

        for slot in self.slots.iter_mut().rev() {
            for state in slot.sides.iter_mut().rev() {
                if !state.is_closed() {
                    *state = ChannelState::Closed;
                    closed += 1;
                }
            }
            slot.cids = [None, None];
            if slot.listener.take().is_some() {
                closed += 1;
            }
        }

        closed
    }
}
