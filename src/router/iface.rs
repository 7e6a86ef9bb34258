//! The router's interface table: a fixed set of (name, MAC, IP) triples
//! configured at startup, replacing the source's `sr_if` linked list
//! (`sr_if.c`'s `sr_add_interface`/`sr_get_interface`) with an owned `Vec`.
use crate::wire::{EthernetAddress, Ipv4Address};

#[derive(Debug, Clone)]
pub struct IfaceConfig {
    pub name: String,
    pub mac: EthernetAddress,
    pub ip: Ipv4Address,
}

#[derive(Debug, Default)]
pub struct IfaceTable {
    entries: Vec<IfaceConfig>,
}

impl IfaceTable {
    pub fn new(entries: Vec<IfaceConfig>) -> IfaceTable {
        IfaceTable { entries }
    }

    pub fn by_name(&self, name: &str) -> Option<&IfaceConfig> {
        self.entries.iter().find(|i| i.name == name)
    }

    /// Does `ip` belong to one of this router's own interfaces?
    pub fn by_ip(&self, ip: Ipv4Address) -> Option<&IfaceConfig> {
        self.entries.iter().find(|i| i.ip == ip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IfaceConfig> {
        self.entries.iter()
    }
}
