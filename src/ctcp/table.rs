//! Owned connection registry, replacing the source's intrusive `next`/`prev`
//! pointers on `struct ctcp_state` with a `Vec<Box<Connection>>` keyed by an
//! opaque id. Destruction during a tick walk collects targets into a side
//! list and removes them after the walk, rather than mutating the vector
//! mid-iteration.
use crate::config::Config;
use crate::time::Instant;

use super::connection::{Connection, TickOutcome};
use super::host::ConnectionHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

#[derive(Debug, Default)]
pub struct ConnectionTable {
    next_id: u64,
    entries: Vec<(ConnId, Box<Connection>)>,
}

impl ConnectionTable {
    pub fn new() -> ConnectionTable {
        ConnectionTable {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, cfg: Config, now: Instant) -> ConnId {
        let id = ConnId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(Connection::new(cfg, now))));
        id
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut Connection> {
        self.entries
            .iter_mut()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, conn)| conn.as_mut())
    }

    pub fn remove(&mut self, id: ConnId) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Drive `on_retransmit_tick` on every connection, removing whichever
    /// ones report `Destroyed`. Returns the ids that were destroyed this
    /// pass, paired with the reason, for the host to log or react to.
    pub fn on_retransmit_tick(
        &mut self,
        host: &mut impl ConnectionHost,
    ) -> Vec<(ConnId, super::error::ConnectionError)> {
        let mut destroyed = Vec::new();
        for (id, conn) in self.entries.iter_mut() {
            if let TickOutcome::Destroyed { cause } = conn.on_retransmit_tick(host) {
                destroyed.push((*id, cause));
            }
        }
        for (id, _) in &destroyed {
            self.remove(*id);
        }
        destroyed
    }

    pub fn on_pacing_tick(&mut self, host: &mut impl ConnectionHost) {
        for (_, conn) in self.entries.iter_mut() {
            conn.on_pacing_tick(host);
        }
    }
}
