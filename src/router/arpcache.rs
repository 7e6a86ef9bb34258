//! ARP resolution cache + the pending-request queue, grounded on
//! `original_source/lab1/router/sr_arpcache.c`. The source guards
//! `cache->entries`/`cache->requests` with one `PTHREAD_MUTEX_RECURSIVE`
//! shared by the packet-receive path and the 1 Hz sweep thread; this crate
//! wraps an `ArpTable` in a plain `std::sync::Mutex` instead (see
//! `router::Router` for the call-convention rule that keeps the
//! non-reentrant lock safe).
use crate::time::{Duration, Instant};
use crate::wire::{EthernetAddress, Ipv4Address};

pub const CACHE_CAPACITY: usize = 16;
pub const ENTRY_TIMEOUT: Duration = Duration::from_secs(15);
pub const REQUEST_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_REQUEST_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct ArpEntry {
    pub ip: Ipv4Address,
    pub mac: EthernetAddress,
    pub added: Instant,
    pub valid: bool,
}

/// One frame queued against an unresolved next-hop. The egress interface
/// travels with the frame rather than being re-derived from the resolved
/// MAC once it arrives — a MAC alone doesn't say which of a multi-interface
/// router's ports the packet is supposed to leave from.
#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub frame: Vec<u8>,
    pub iface: String,
}

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub target_ip: Ipv4Address,
    pub times_sent: u32,
    pub last_sent: Instant,
    pub packets: Vec<PendingPacket>,
}

#[derive(Debug, Default)]
pub struct ArpTable {
    entries: Vec<ArpEntry>,
    requests: Vec<PendingRequest>,
}

impl ArpTable {
    pub fn new() -> ArpTable {
        ArpTable {
            entries: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub fn lookup(&self, ip: Ipv4Address) -> Option<ArpEntry> {
        self.entries.iter().find(|e| e.valid && e.ip == ip).copied()
    }

    /// Insert or refresh a resolved mapping. When the table is full and
    /// every slot is still valid, evicts the entry with the oldest `added`
    /// timestamp rather than refusing the insert — a fresh resolution
    /// always wins a spot.
    pub fn insert(&mut self, ip: Ipv4Address, mac: EthernetAddress, now: Instant) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.ip == ip) {
            existing.mac = mac;
            existing.added = now;
            existing.valid = true;
            return;
        }
        if self.entries.len() >= CACHE_CAPACITY {
            let victim = self
                .entries
                .iter()
                .position(|e| !e.valid)
                .or_else(|| {
                    self.entries
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, e)| e.added.total_micros())
                        .map(|(i, _)| i)
                });
            if let Some(pos) = victim {
                self.entries.remove(pos);
            }
        }
        self.entries.push(ArpEntry {
            ip,
            mac,
            added: now,
            valid: true,
        });
    }

    pub fn invalidate_expired(&mut self, now: Instant) {
        for entry in self.entries.iter_mut() {
            if entry.valid && now.saturating_duration_since(entry.added) > ENTRY_TIMEOUT {
                entry.valid = false;
            }
        }
    }

    /// Queue `frame` (bound for egress interface `iface`) against
    /// `target_ip`'s pending request, creating the request if none exists.
    pub fn queue_pending(&mut self, target_ip: Ipv4Address, iface: &str, frame: Vec<u8>, now: Instant) {
        if let Some(req) = self.requests.iter_mut().find(|r| r.target_ip == target_ip) {
            req.packets.push(PendingPacket {
                frame,
                iface: iface.to_string(),
            });
            return;
        }
        self.requests.push(PendingRequest {
            target_ip,
            times_sent: 0,
            last_sent: now,
            packets: vec![PendingPacket {
                frame,
                iface: iface.to_string(),
            }],
        });
    }

    /// Remove and return the pending request for `target_ip`, if any —
    /// called once a matching ARP reply resolves it.
    pub fn take_request(&mut self, target_ip: Ipv4Address) -> Option<PendingRequest> {
        let pos = self.requests.iter().position(|r| r.target_ip == target_ip)?;
        Some(self.requests.remove(pos))
    }

    /// Target IPs whose pending request is due for another look this sweep
    /// pass (at least `REQUEST_INTERVAL` since the last send).
    pub fn due_targets(&self, now: Instant) -> Vec<Ipv4Address> {
        self.requests
            .iter()
            .filter(|r| now.saturating_duration_since(r.last_sent) >= REQUEST_INTERVAL)
            .map(|r| r.target_ip)
            .collect()
    }

    pub fn request(&self, target_ip: Ipv4Address) -> Option<&PendingRequest> {
        self.requests.iter().find(|r| r.target_ip == target_ip)
    }

    pub fn mark_resent(&mut self, target_ip: Ipv4Address, now: Instant) {
        if let Some(req) = self.requests.iter_mut().find(|r| r.target_ip == target_ip) {
            req.times_sent += 1;
            req.last_sent = now;
        }
    }

    pub fn destroy_request(&mut self, target_ip: Ipv4Address) -> Option<PendingRequest> {
        self.take_request(target_ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(o: u8) -> Ipv4Address {
        Ipv4Address::new(10, 0, 0, o)
    }

    fn mac(o: u8) -> EthernetAddress {
        EthernetAddress::new([0, 0, 0, 0, 0, o])
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut table = ArpTable::new();
        table.insert(addr(1), mac(1), Instant::ZERO);
        assert_eq!(table.lookup(addr(1)).map(|e| e.mac), Some(mac(1)));
        assert!(table.lookup(addr(2)).is_none());
    }

    #[test]
    fn full_cache_evicts_oldest_added() {
        let mut table = ArpTable::new();
        let mut now = Instant::ZERO;
        for i in 0..CACHE_CAPACITY as u8 {
            table.insert(addr(i), mac(i), now);
            now = now + Duration::from_secs(1);
        }
        table.insert(addr(200), mac(200), now);
        assert!(table.lookup(addr(0)).is_none(), "oldest entry should be evicted");
        assert_eq!(table.lookup(addr(200)).map(|e| e.mac), Some(mac(200)));
    }

    #[test]
    fn expired_entries_are_invalidated_not_removed() {
        let mut table = ArpTable::new();
        table.insert(addr(1), mac(1), Instant::ZERO);
        table.invalidate_expired(Instant::ZERO + ENTRY_TIMEOUT + Duration::from_secs(1));
        assert!(table.lookup(addr(1)).is_none());
    }

    #[test]
    fn pending_request_accumulates_packets() {
        let mut table = ArpTable::new();
        table.queue_pending(addr(5), "eth0", vec![1, 2, 3], Instant::ZERO);
        table.queue_pending(addr(5), "eth0", vec![4, 5, 6], Instant::ZERO);
        let req = table.request(addr(5)).unwrap();
        assert_eq!(req.packets.len(), 2);
    }

    #[test]
    fn due_targets_respects_request_interval() {
        let mut table = ArpTable::new();
        table.queue_pending(addr(5), "eth0", vec![], Instant::ZERO);
        assert_eq!(table.due_targets(Instant::ZERO).len(), 1);
        assert!(table
            .due_targets(Instant::ZERO + Duration::from_millis(500))
            .is_empty());
        assert_eq!(
            table
                .due_targets(Instant::ZERO + REQUEST_INTERVAL)
                .len(),
            1
        );
    }
}
