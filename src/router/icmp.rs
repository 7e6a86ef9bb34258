//! ICMP reply/error construction. Grounded on the inline "Destination host
//! unreachable" builder in
//! `original_source/lab1/router/sr_arpcache.c`'s `sr_arpcache_sweepreqs`
//! (the only place the source actually assembles a full ICMP message
//! byte-by-byte), generalized into one helper per message kind instead of
//! one-off field pokes. Returns IP-level bytes only (header + ICMP body) —
//! the Ethernet header is added later, once the next hop's MAC is known
//! (see `router::Router::send_via_arp`).
use crate::wire::{
    Icmpv4DstUnreachable, Icmpv4Message, Icmpv4Packet, Icmpv4Repr, Icmpv4TimeExceeded, IpProtocol,
    Ipv4Address, Ipv4Packet, Ipv4Repr, IPV4_HEADER_LEN,
};

/// The "internet header plus first 8 bytes of payload" an ICMP error
/// carries about the packet that triggered it.
fn error_data(ip_packet: &[u8]) -> Vec<u8> {
    let header_len = if !ip_packet.is_empty() {
        ((ip_packet[0] & 0x0f) as usize * 4).max(IPV4_HEADER_LEN)
    } else {
        IPV4_HEADER_LEN
    };
    let take = (header_len + 8).min(ip_packet.len());
    ip_packet[..take].to_vec()
}

fn wrap_in_ip(ip_src: Ipv4Address, ip_dst: Ipv4Address, icmp_bytes: &[u8]) -> Vec<u8> {
    let ip_repr = Ipv4Repr {
        src_addr: ip_src,
        dst_addr: ip_dst,
        protocol: IpProtocol::Icmp,
        payload_len: icmp_bytes.len(),
        hop_limit: 64,
    };
    let mut buf = vec![0u8; ip_repr.buffer_len() + icmp_bytes.len()];
    {
        let mut ip_packet = Ipv4Packet::new_unchecked(&mut buf[..ip_repr.buffer_len()]);
        ip_repr.emit(&mut ip_packet);
    }
    buf[ip_repr.buffer_len()..].copy_from_slice(icmp_bytes);
    buf
}

fn echo_reply_bytes(ident: u16, seq_no: u16, data: &[u8]) -> Vec<u8> {
    let repr = Icmpv4Repr::EchoReply { ident, seq_no, data };
    let mut body = vec![0u8; repr.buffer_len()];
    let mut packet = Icmpv4Packet::new_unchecked(&mut body);
    repr.emit(&mut packet);
    packet.fill_checksum();
    body
}

fn dst_unreachable_bytes(code: u8, data: &[u8]) -> Vec<u8> {
    let mut body = vec![0u8; 8 + data.len()];
    let mut packet = Icmpv4Packet::new_unchecked(&mut body);
    packet.set_msg_type(Icmpv4Message::DstUnreachable);
    packet.set_msg_code(code);
    packet.clear_unused();
    packet.data_mut().copy_from_slice(data);
    packet.fill_checksum();
    body
}

fn time_exceeded_bytes(code: u8, data: &[u8]) -> Vec<u8> {
    let mut body = vec![0u8; 8 + data.len()];
    let mut packet = Icmpv4Packet::new_unchecked(&mut body);
    packet.set_msg_type(Icmpv4Message::TimeExceeded);
    packet.set_msg_code(code);
    packet.clear_unused();
    packet.data_mut().copy_from_slice(data);
    packet.fill_checksum();
    body
}

/// An ICMP echo reply, as IPv4-over-nothing bytes addressed back to the
/// original requester.
pub fn echo_reply(ip_src: Ipv4Address, ip_dst: Ipv4Address, ident: u16, seq_no: u16, data: &[u8]) -> Vec<u8> {
    wrap_in_ip(ip_src, ip_dst, &echo_reply_bytes(ident, seq_no, data))
}

/// Type-3 destination-unreachable: port/net/host unreachable, distinguished
/// by `reason`. `orig_ip_packet` is the triggering packet's IP header
/// onward (no Ethernet header).
pub fn dst_unreachable(
    reason: Icmpv4DstUnreachable,
    ip_src: Ipv4Address,
    ip_dst: Ipv4Address,
    orig_ip_packet: &[u8],
) -> Vec<u8> {
    let data = error_data(orig_ip_packet);
    wrap_in_ip(ip_src, ip_dst, &dst_unreachable_bytes(reason.into(), &data))
}

/// Type-11 time-exceeded (TTL expired in transit).
pub fn time_exceeded(ip_src: Ipv4Address, ip_dst: Ipv4Address, orig_ip_packet: &[u8]) -> Vec<u8> {
    let data = error_data(orig_ip_packet);
    wrap_in_ip(
        ip_src,
        ip_dst,
        &time_exceeded_bytes(Icmpv4TimeExceeded::TtlExpired.into(), &data),
    )
}
