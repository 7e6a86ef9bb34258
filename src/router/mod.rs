/*! The IPv4 forwarding plane: Ethernet/ARP/IP dispatch, longest-prefix-match
forwarding, ARP resolution with a pending-frame queue, and the ICMP errors a
router is expected to generate along the way.

Grounded on `original_source/lab1/router/sr_router.c`'s `sr_handlepacket`
(the dispatch shape) and `sr_arpcache.c`'s `sr_arpcache_sweepreqs` (the 1 Hz
resend/expire pass), reworked the way [`crate::ctcp::Connection`] reworks its
own reference C sources: a plain struct driven by explicit entrypoints
instead of a thread plus a global cache.
*/
mod arpcache;
mod error;
mod host;
mod iface;
mod icmp;
mod route;

use std::sync::{Arc, Mutex};

pub use arpcache::{ArpEntry, ArpTable, PendingPacket, PendingRequest, MAX_REQUEST_ATTEMPTS};
pub use error::RouterError;
pub use host::RouterHost;
pub use iface::{IfaceConfig, IfaceTable};
pub use route::{RouteEntry, RouteTable};

use crate::time::Instant;
use crate::wire::{
    ArpOperation, ArpPacket, ArpRepr, EthernetAddress, EthernetFrame, EthernetProtocol,
    EthernetRepr, Icmpv4DstUnreachable, IpProtocol, Ipv4Address, Ipv4Packet, Ipv4Repr,
    ETHERNET_HEADER_LEN,
};

/// A minimal IPv4 router: a fixed set of interfaces, a static routing table,
/// and an ARP cache shared with the 1 Hz sweep.
///
/// `arp` is an `Arc<Mutex<_>>` rather than a plain field because the sweep
/// and the frame-receive path are two separate entrypoints that both touch
/// it; see [`Router::on_arp_sweep_tick`] for the locking discipline that
/// keeps that mutex non-reentrant.
pub struct Router {
    ifaces: IfaceTable,
    routes: RouteTable,
    arp: Arc<Mutex<ArpTable>>,
}

impl Router {
    pub fn new(ifaces: Vec<IfaceConfig>, routes: Vec<RouteEntry>) -> Router {
        Router {
            ifaces: IfaceTable::new(ifaces),
            routes: RouteTable::new(routes),
            arp: Arc::new(Mutex::new(ArpTable::new())),
        }
    }

    /// Handle one Ethernet frame received on `ingress`. All failures are
    /// drop reasons: malformed input, a frame for a MAC we don't own, or an
    /// unsupported ethertype are logged and discarded, never propagated.
    pub fn on_frame(&mut self, host: &mut impl RouterHost, frame: &[u8], ingress: &str) {
        if let Err(err) = self.dispatch_frame(host, frame, ingress) {
            net_debug!("router: dropping frame on {ingress}: {err}");
        }
    }

    fn dispatch_frame(
        &mut self,
        host: &mut impl RouterHost,
        frame: &[u8],
        ingress: &str,
    ) -> Result<(), RouterError> {
        let ingress_iface = self
            .ifaces
            .by_name(ingress)
            .cloned()
            .ok_or(RouterError::UnknownIface)?;

        let eth_frame = EthernetFrame::new_checked(frame).map_err(|_| RouterError::FrameTooShort)?;
        let eth_repr = EthernetRepr::parse(&eth_frame).map_err(|_| RouterError::FrameTooShort)?;

        if eth_repr.dst_addr != ingress_iface.mac && !eth_repr.dst_addr.is_broadcast() {
            return Ok(());
        }

        match eth_repr.ethertype {
            EthernetProtocol::Arp => self.handle_arp(host, eth_frame.payload(), &ingress_iface),
            EthernetProtocol::Ipv4 => self.handle_ipv4(host, eth_frame.payload(), &ingress_iface),
            EthernetProtocol::Unknown(_) => Ok(()),
        }
    }

    fn handle_arp(
        &mut self,
        host: &mut impl RouterHost,
        payload: &[u8],
        ingress: &IfaceConfig,
    ) -> Result<(), RouterError> {
        let packet = ArpPacket::new_checked(payload).map_err(|_| RouterError::FrameTooShort)?;
        let repr = ArpRepr::parse(&packet).map_err(|_| RouterError::FrameTooShort)?;

        let ArpRepr::EthernetIpv4 {
            operation,
            source_hardware_addr,
            source_protocol_addr,
            target_protocol_addr,
            ..
        } = repr;

        let now = host.now();
        let resolved = {
            let mut table = self.arp.lock().unwrap();
            table.insert(source_protocol_addr, source_hardware_addr, now);
            table.take_request(source_protocol_addr)
        };

        if let Some(request) = resolved {
            for pkt in request.packets {
                self.transmit_resolved(host, &pkt.iface, source_hardware_addr, pkt.frame);
            }
        }

        if operation == ArpOperation::Request && target_protocol_addr == ingress.ip {
            let reply = ArpRepr::EthernetIpv4 {
                operation: ArpOperation::Reply,
                source_hardware_addr: ingress.mac,
                source_protocol_addr: ingress.ip,
                target_hardware_addr: source_hardware_addr,
                target_protocol_addr: source_protocol_addr,
            };
            let mut buf = vec![0u8; reply.buffer_len()];
            let mut packet = ArpPacket::new_unchecked(&mut buf);
            reply.emit(&mut packet);
            let frame = build_ethernet(ingress.mac, source_hardware_addr, EthernetProtocol::Arp, &buf);
            host.send_frame(&ingress.name, &frame);
        }

        Ok(())
    }

    fn handle_ipv4(
        &mut self,
        host: &mut impl RouterHost,
        payload: &[u8],
        ingress: &IfaceConfig,
    ) -> Result<(), RouterError> {
        let packet = Ipv4Packet::new_checked(payload).map_err(|_| RouterError::Ipv4TooShort)?;
        if !packet.verify_checksum() {
            return Err(RouterError::Ipv4BadChecksum);
        }
        let repr = Ipv4Repr::parse(&packet).map_err(|_| RouterError::Ipv4BadChecksum)?;
        let header_len = packet.header_len() as usize;

        if let Some(local) = self.ifaces.by_ip(repr.dst_addr).cloned() {
            self.handle_local_delivery(host, &local, &repr, payload, header_len, ingress);
        } else {
            self.forward(host, &repr, payload, ingress);
        }
        Ok(())
    }

    fn handle_local_delivery(
        &mut self,
        host: &mut impl RouterHost,
        local: &IfaceConfig,
        repr: &Ipv4Repr,
        ip_bytes: &[u8],
        header_len: usize,
        ingress: &IfaceConfig,
    ) {
        match repr.protocol {
            IpProtocol::Icmp => {
                let icmp_bytes = &ip_bytes[header_len..];
                let echo = crate::wire::Icmpv4Packet::new_checked(icmp_bytes)
                    .ok()
                    .and_then(|packet| crate::wire::Icmpv4Repr::parse(&packet).ok());
                if let Some(crate::wire::Icmpv4Repr::EchoRequest { ident, seq_no, data }) = echo {
                    let reply_bytes = icmp::echo_reply(local.ip, repr.src_addr, ident, seq_no, data);
                    let (egress, next_hop) = self.egress_toward(repr.src_addr, ingress);
                    self.send_via_arp(host, &egress, next_hop, reply_bytes);
                }
                // any other ICMP type addressed to one of our own IPs is
                // silently accepted and dropped, same as the source.
            }
            IpProtocol::Tcp | IpProtocol::Udp => {
                let reply = icmp::dst_unreachable(
                    Icmpv4DstUnreachable::PortUnreachable,
                    local.ip,
                    repr.src_addr,
                    ip_bytes,
                );
                self.send_via_arp(host, &ingress.name, repr.src_addr, reply);
            }
            IpProtocol::Unknown(_) => {}
        }
    }

    fn forward(
        &mut self,
        host: &mut impl RouterHost,
        repr: &Ipv4Repr,
        ip_bytes: &[u8],
        ingress: &IfaceConfig,
    ) {
        if repr.hop_limit <= 1 {
            let reply = icmp::time_exceeded(ingress.ip, repr.src_addr, ip_bytes);
            self.send_via_arp(host, &ingress.name, repr.src_addr, reply);
            return;
        }

        let route = match self.routes.lookup(repr.dst_addr) {
            Some(route) => route.clone(),
            None => {
                let reply = icmp::dst_unreachable(
                    Icmpv4DstUnreachable::NetUnreachable,
                    ingress.ip,
                    repr.src_addr,
                    ip_bytes,
                );
                self.send_via_arp(host, &ingress.name, repr.src_addr, reply);
                return;
            }
        };

        let mut forwarded = ip_bytes.to_vec();
        {
            let mut packet = Ipv4Packet::new_unchecked(&mut forwarded);
            let ttl = packet.hop_limit();
            packet.set_hop_limit(ttl - 1);
            packet.fill_checksum();
        }

        let next_hop = if route.gateway.is_unspecified() {
            repr.dst_addr
        } else {
            route.gateway
        };
        self.send_via_arp(host, &route.iface, next_hop, forwarded);
    }

    /// Pick an egress interface and next-hop IP for traffic this router
    /// originates toward `target` (an ICMP reply, not a forwarded packet).
    /// Falls back to sending straight back out the interface the triggering
    /// packet arrived on when no route covers `target` — the common case,
    /// since that packet is almost always on-link.
    fn egress_toward(&self, target: Ipv4Address, ingress: &IfaceConfig) -> (String, Ipv4Address) {
        match self.routes.lookup(target) {
            Some(route) => {
                let next_hop = if route.gateway.is_unspecified() {
                    target
                } else {
                    route.gateway
                };
                (route.iface.clone(), next_hop)
            }
            None => (ingress.name.clone(), target),
        }
    }

    /// Send an IP-level datagram (`ip_bytes`: header onward, no Ethernet)
    /// out `egress` toward `next_hop`, resolving the next hop's MAC first.
    /// A cache hit transmits immediately; a miss queues the frame and, if
    /// this is the first packet queued for that target, kicks off ARP
    /// resolution right away rather than waiting for the next sweep tick.
    fn send_via_arp(
        &mut self,
        host: &mut impl RouterHost,
        egress: &str,
        next_hop: Ipv4Address,
        ip_bytes: Vec<u8>,
    ) {
        let Some(iface) = self.ifaces.by_name(egress).cloned() else {
            net_debug!("router: send_via_arp: no such interface {egress}");
            return;
        };

        let now = host.now();
        let hit = self.arp.lock().unwrap().lookup(next_hop);
        if let Some(entry) = hit {
            self.transmit_resolved(host, egress, entry.mac, ip_bytes);
            return;
        }

        let is_first = {
            let mut table = self.arp.lock().unwrap();
            let was_pending = table.request(next_hop).is_some();
            table.queue_pending(next_hop, egress, ip_bytes, now);
            !was_pending
        };
        if is_first {
            self.broadcast_arp_request(host, &iface, next_hop);
            self.arp.lock().unwrap().mark_resent(next_hop, now);
        }
    }

    fn transmit_resolved(
        &self,
        host: &mut impl RouterHost,
        egress: &str,
        dst_mac: EthernetAddress,
        ip_bytes: Vec<u8>,
    ) {
        let Some(iface) = self.ifaces.by_name(egress) else {
            return;
        };
        let frame = build_ethernet(iface.mac, dst_mac, EthernetProtocol::Ipv4, &ip_bytes);
        host.send_frame(egress, &frame);
    }

    fn broadcast_arp_request(&self, host: &mut impl RouterHost, iface: &IfaceConfig, target: Ipv4Address) {
        let repr = ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Request,
            source_hardware_addr: iface.mac,
            source_protocol_addr: iface.ip,
            target_hardware_addr: EthernetAddress::new([0; 6]),
            target_protocol_addr: target,
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        let mut packet = ArpPacket::new_unchecked(&mut buf);
        repr.emit(&mut packet);
        let frame = build_ethernet(iface.mac, EthernetAddress::BROADCAST, EthernetProtocol::Arp, &buf);
        host.send_frame(&iface.name, &frame);
    }

    /// The 1 Hz sweep: resend or give up on each due ARP request. Locks the
    /// cache once for the whole pass and releases it before sending a
    /// single frame — `host.send_frame` must never be called while the
    /// guard is held, the same rule [`ArpTable`] documents for reentrancy.
    pub fn on_arp_sweep_tick(&mut self, host: &mut impl RouterHost) {
        let now = host.now();

        let (to_resend, to_destroy): (Vec<(Ipv4Address, String)>, Vec<PendingRequest>) = {
            let mut table = self.arp.lock().unwrap();
            table.invalidate_expired(now);
            let due = table.due_targets(now);

            let mut resend = Vec::new();
            let mut destroy = Vec::new();
            for target in due {
                let attempts = table.request(target).map(|r| r.times_sent).unwrap_or(0);
                if attempts >= MAX_REQUEST_ATTEMPTS {
                    if let Some(req) = table.destroy_request(target) {
                        destroy.push(req);
                    }
                } else if let Some(iface) = table
                    .request(target)
                    .and_then(|r| r.packets.first())
                    .map(|p| p.iface.clone())
                {
                    table.mark_resent(target, now);
                    resend.push((target, iface));
                }
            }
            (resend, destroy)
        };

        for (target, iface_name) in to_resend {
            if let Some(iface) = self.ifaces.by_name(&iface_name).cloned() {
                self.broadcast_arp_request(host, &iface, target);
            }
        }

        for request in to_destroy {
            self.send_host_unreachable(host, request);
        }
    }

    /// A pending request hit its resend limit: every packet queued against
    /// it gets a host-unreachable sent back to its own original source,
    /// matching `sr_arpcache_sweepreqs`'s inline ICMP builder.
    fn send_host_unreachable(&mut self, host: &mut impl RouterHost, request: PendingRequest) {
        for pkt in request.packets {
            let Some(iface) = self.ifaces.by_name(&pkt.iface).cloned() else {
                continue;
            };
            let Some(orig_src) = Ipv4Packet::new_checked(pkt.frame.as_slice())
                .ok()
                .map(|p| p.src_addr())
            else {
                continue;
            };
            let reply = icmp::dst_unreachable(
                Icmpv4DstUnreachable::HostUnreachable,
                iface.ip,
                orig_src,
                &pkt.frame,
            );
            self.send_via_arp(host, &iface.name, orig_src, reply);
        }
    }
}

fn build_ethernet(src: EthernetAddress, dst: EthernetAddress, ethertype: EthernetProtocol, payload: &[u8]) -> Vec<u8> {
    let repr = EthernetRepr {
        src_addr: src,
        dst_addr: dst,
        ethertype,
    };
    let mut buf = vec![0u8; ETHERNET_HEADER_LEN + payload.len()];
    {
        let mut frame = EthernetFrame::new_unchecked(&mut buf);
        repr.emit(&mut frame);
        frame.payload_mut().copy_from_slice(payload);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Duration;
    use crate::wire::Ipv4Cidr;
    use std::cell::RefCell;

    fn mac(o: u8) -> EthernetAddress {
        EthernetAddress::new([0, 0, 0, 0, 0, o])
    }

    fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Address {
        Ipv4Address::new(a, b, c, d)
    }

    struct TestHost {
        now: Instant,
        sent: RefCell<Vec<(String, Vec<u8>)>>,
    }

    impl TestHost {
        fn new() -> TestHost {
            TestHost {
                now: Instant::ZERO,
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl RouterHost for TestHost {
        fn send_frame(&mut self, iface: &str, frame: &[u8]) -> bool {
            self.sent.borrow_mut().push((iface.to_string(), frame.to_vec()));
            true
        }

        fn now(&self) -> Instant {
            self.now
        }
    }

    fn two_iface_router() -> Router {
        Router::new(
            vec![
                IfaceConfig {
                    name: "eth0".into(),
                    mac: mac(1),
                    ip: ip(192, 168, 0, 1),
                },
                IfaceConfig {
                    name: "eth1".into(),
                    mac: mac(2),
                    ip: ip(10, 0, 1, 1),
                },
            ],
            vec![RouteEntry {
                cidr: Ipv4Cidr::new(ip(10, 0, 1, 0), 24),
                gateway: ip(10, 0, 1, 1),
                iface: "eth1".into(),
            }],
        )
    }

    fn build_ip_packet(src: Ipv4Address, dst: Ipv4Address, protocol: IpProtocol, ttl: u8, payload: &[u8]) -> Vec<u8> {
        let repr = Ipv4Repr {
            src_addr: src,
            dst_addr: dst,
            protocol,
            payload_len: payload.len(),
            hop_limit: ttl,
        };
        let mut buf = vec![0u8; repr.buffer_len() + payload.len()];
        {
            let mut packet = Ipv4Packet::new_unchecked(&mut buf);
            repr.emit(&mut packet);
            packet.payload_mut().copy_from_slice(payload);
        }
        buf
    }

    fn wrap_eth(src: EthernetAddress, dst: EthernetAddress, ethertype: EthernetProtocol, payload: &[u8]) -> Vec<u8> {
        build_ethernet(src, dst, ethertype, payload)
    }

    #[test]
    fn arp_request_for_our_ip_gets_a_reply() {
        let mut router = two_iface_router();
        let mut host = TestHost::new();

        let arp = ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Request,
            source_hardware_addr: mac(9),
            source_protocol_addr: ip(192, 168, 0, 50),
            target_hardware_addr: EthernetAddress::new([0; 6]),
            target_protocol_addr: ip(192, 168, 0, 1),
        };
        let mut arp_buf = vec![0u8; arp.buffer_len()];
        ArpRepr::emit(&arp, &mut ArpPacket::new_unchecked(&mut arp_buf));
        let frame = wrap_eth(mac(9), EthernetAddress::BROADCAST, EthernetProtocol::Arp, &arp_buf);

        router.on_frame(&mut host, &frame, "eth0");

        let sent = host.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "eth0");
        let reply_frame = EthernetFrame::new_checked(sent[0].1.as_slice()).unwrap();
        assert_eq!(reply_frame.dst_addr(), mac(9));
        let reply_arp = ArpPacket::new_checked(reply_frame.payload()).unwrap();
        assert_eq!(reply_arp.operation(), ArpOperation::Reply);
    }

    #[test]
    fn echo_request_to_our_ip_gets_a_reply() {
        let mut router = two_iface_router();
        let mut host = TestHost::new();
        router
            .arp
            .lock()
            .unwrap()
            .insert(ip(192, 168, 0, 50), mac(9), Instant::ZERO);

        let echo_body = {
            use crate::wire::{Icmpv4Packet, Icmpv4Repr};
            let repr = Icmpv4Repr::EchoRequest {
                ident: 42,
                seq_no: 1,
                data: b"ping",
            };
            let mut buf = vec![0u8; repr.buffer_len()];
            let mut packet = Icmpv4Packet::new_unchecked(&mut buf);
            repr.emit(&mut packet);
            packet.fill_checksum();
            buf
        };
        let ip_packet = build_ip_packet(ip(192, 168, 0, 50), ip(192, 168, 0, 1), IpProtocol::Icmp, 64, &echo_body);
        let frame = wrap_eth(mac(9), mac(1), EthernetProtocol::Ipv4, &ip_packet);

        router.on_frame(&mut host, &frame, "eth0");

        let sent = host.sent.borrow();
        assert_eq!(sent.len(), 1);
        let eth = EthernetFrame::new_checked(sent[0].1.as_slice()).unwrap();
        let ip_pkt = Ipv4Packet::new_checked(eth.payload()).unwrap();
        assert!(ip_pkt.verify_checksum());
        use crate::wire::{Icmpv4Packet, Icmpv4Repr};
        let icmp_pkt = Icmpv4Packet::new_checked(ip_pkt.payload()).unwrap();
        match Icmpv4Repr::parse(&icmp_pkt).unwrap() {
            Icmpv4Repr::EchoReply { ident, seq_no, data } => {
                assert_eq!(ident, 42);
                assert_eq!(seq_no, 1);
                assert_eq!(data, b"ping");
            }
            other => panic!("expected EchoReply, got {other:?}"),
        }
    }

    #[test]
    fn forwarded_packet_with_no_arp_entry_is_queued_and_request_broadcast() {
        let mut router = two_iface_router();
        let mut host = TestHost::new();

        let payload = build_ip_packet(ip(192, 168, 0, 50), ip(10, 0, 1, 5), IpProtocol::Tcp, 10, &[1, 2, 3]);
        let frame = wrap_eth(mac(9), mac(1), EthernetProtocol::Ipv4, &payload);

        router.on_frame(&mut host, &frame, "eth0");

        let sent = host.sent.borrow();
        assert_eq!(sent.len(), 1, "expected a single ARP request broadcast");
        let eth = EthernetFrame::new_checked(sent[0].1.as_slice()).unwrap();
        assert_eq!(eth.ethertype(), EthernetProtocol::Arp);
        assert_eq!(eth.dst_addr(), EthernetAddress::BROADCAST);
        assert_eq!(sent[0].0, "eth1");

        drop(sent);
        assert!(router.arp.lock().unwrap().request(ip(10, 0, 1, 1)).is_some());
    }

    #[test]
    fn arp_reply_flushes_queued_frame_with_rewritten_mac() {
        let mut router = two_iface_router();
        let mut host = TestHost::new();

        let payload = build_ip_packet(ip(192, 168, 0, 50), ip(10, 0, 1, 5), IpProtocol::Tcp, 10, &[1, 2, 3]);
        let frame = wrap_eth(mac(9), mac(1), EthernetProtocol::Ipv4, &payload);
        router.on_frame(&mut host, &frame, "eth0");
        host.sent.borrow_mut().clear();

        let arp_reply = ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Reply,
            source_hardware_addr: mac(77),
            source_protocol_addr: ip(10, 0, 1, 1),
            target_hardware_addr: mac(2),
            target_protocol_addr: ip(10, 0, 1, 1),
        };
        let mut arp_buf = vec![0u8; arp_reply.buffer_len()];
        ArpRepr::emit(&arp_reply, &mut ArpPacket::new_unchecked(&mut arp_buf));
        let reply_frame = wrap_eth(mac(77), mac(2), EthernetProtocol::Arp, &arp_buf);

        router.on_frame(&mut host, &reply_frame, "eth1");

        let sent = host.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "eth1");
        let eth = EthernetFrame::new_checked(sent[0].1.as_slice()).unwrap();
        assert_eq!(eth.dst_addr(), mac(77));
        assert!(router.arp.lock().unwrap().request(ip(10, 0, 1, 1)).is_none());
    }

    #[test]
    fn expired_ttl_produces_time_exceeded_instead_of_forwarding() {
        let mut router = two_iface_router();
        let mut host = TestHost::new();
        router.arp.lock().unwrap().insert(ip(192, 168, 0, 50), mac(9), Instant::ZERO);

        let payload = build_ip_packet(ip(192, 168, 0, 50), ip(10, 0, 1, 5), IpProtocol::Tcp, 1, &[9, 9]);
        let frame = wrap_eth(mac(9), mac(1), EthernetProtocol::Ipv4, &payload);

        router.on_frame(&mut host, &frame, "eth0");

        let sent = host.sent.borrow();
        assert_eq!(sent.len(), 1);
        let eth = EthernetFrame::new_checked(sent[0].1.as_slice()).unwrap();
        let ip_pkt = Ipv4Packet::new_checked(eth.payload()).unwrap();
        assert_eq!(ip_pkt.dst_addr(), ip(192, 168, 0, 50));
        use crate::wire::Icmpv4Packet;
        let icmp_pkt = Icmpv4Packet::new_checked(ip_pkt.payload()).unwrap();
        assert_eq!(icmp_pkt.msg_type(), crate::wire::Icmpv4Message::TimeExceeded);
    }

    #[test]
    fn no_route_produces_net_unreachable() {
        let mut router = two_iface_router();
        let mut host = TestHost::new();
        router.arp.lock().unwrap().insert(ip(192, 168, 0, 50), mac(9), Instant::ZERO);

        let payload = build_ip_packet(ip(192, 168, 0, 50), ip(172, 16, 0, 5), IpProtocol::Tcp, 10, &[1]);
        let frame = wrap_eth(mac(9), mac(1), EthernetProtocol::Ipv4, &payload);

        router.on_frame(&mut host, &frame, "eth0");

        let sent = host.sent.borrow();
        assert_eq!(sent.len(), 1);
        let eth = EthernetFrame::new_checked(sent[0].1.as_slice()).unwrap();
        let ip_pkt = Ipv4Packet::new_checked(eth.payload()).unwrap();
        use crate::wire::{Icmpv4Packet, Icmpv4DstUnreachable as DstUnreach};
        let icmp_pkt = Icmpv4Packet::new_checked(ip_pkt.payload()).unwrap();
        assert_eq!(icmp_pkt.msg_code(), u8::from(DstUnreach::NetUnreachable));
    }

    #[test]
    fn sweep_gives_up_after_max_attempts_and_sends_host_unreachable() {
        let mut router = two_iface_router();
        let mut host = TestHost::new();
        router.arp.lock().unwrap().insert(ip(192, 168, 0, 50), mac(9), Instant::ZERO);

        let payload = build_ip_packet(ip(192, 168, 0, 50), ip(10, 0, 1, 5), IpProtocol::Tcp, 10, &[1]);
        let frame = wrap_eth(mac(9), mac(1), EthernetProtocol::Ipv4, &payload);
        router.on_frame(&mut host, &frame, "eth0");
        host.sent.borrow_mut().clear();

        for i in 1..MAX_REQUEST_ATTEMPTS {
            host.now = host.now + Duration::from_secs(1);
            router.on_arp_sweep_tick(&mut host);
            assert_eq!(host.sent.borrow().len() as u32, i, "expected one ARP rebroadcast per tick");
        }

        host.now = host.now + Duration::from_secs(1);
        router.on_arp_sweep_tick(&mut host);

        let sent = host.sent.borrow();
        let last = &sent[sent.len() - 1];
        let eth = EthernetFrame::new_checked(last.1.as_slice()).unwrap();
        let ip_pkt = Ipv4Packet::new_checked(eth.payload()).unwrap();
        assert_eq!(ip_pkt.dst_addr(), ip(192, 168, 0, 50));
        use crate::wire::{Icmpv4Packet, Icmpv4DstUnreachable as DstUnreach};
        let icmp_pkt = Icmpv4Packet::new_checked(ip_pkt.payload()).unwrap();
        assert_eq!(icmp_pkt.msg_code(), u8::from(DstUnreach::HostUnreachable));
        assert!(router.arp.lock().unwrap().request(ip(10, 0, 1, 1)).is_none());
    }
}
