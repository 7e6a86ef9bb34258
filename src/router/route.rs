//! The router's static forwarding table, grounded on `iface/route.rs`'s
//! `Routes` type but generalized from "at most one default route" to an
//! arbitrary longest-prefix-match table, since a router (unlike a host
//! stack) needs to hold more than a default gateway.
use crate::wire::{Ipv4Address, Ipv4Cidr};

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub cidr: Ipv4Cidr,
    pub gateway: Ipv4Address,
    pub iface: String,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> RouteTable {
        RouteTable { entries }
    }

    /// Longest-prefix match: among entries where `(dst & mask) == prefix`,
    /// the entry with the numerically largest mask wins.
    pub fn lookup(&self, dst: Ipv4Address) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .filter(|route| route.cidr.contains_addr(&dst))
            .max_by_key(|route| route.cidr.prefix_len())
    }
}
