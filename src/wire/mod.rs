/*! Low-level packet access and construction.

`wire` deals with packet *representation* at two levels. First, `Packet<T>`
wrappers give checked accessor/setter methods over a raw octet buffer
(`field::Field` ranges index into it). Second, `Repr` structs/enums give a
parsed, owned, high-level view that can be built up in memory and `emit`ted
into a buffer without ever touching bytes that aren't there.

`Packet::new_checked` must be used on untrusted input; so long as the buffer
is not modified afterwards, no accessor will panic. `Repr::parse` never
panics once `check_len` has succeeded, and `Repr::emit` never panics as long
as the underlying buffer is exactly `Repr::buffer_len()` octets long.

This crate only ever speaks Ethernet/IPv4/ARP/ICMPv4 and its own cTCP
segment format, so unlike a general-purpose stack there is no `IpAddress`
enum spanning multiple address families — `Ipv4Address` is the address type
throughout.
*/

mod field {
    pub type Field = ::core::ops::Range<usize>;
    pub type Rest = ::core::ops::RangeFrom<usize>;
}

use core::fmt;

pub mod checksum;

mod ethernet;
pub use self::ethernet::{
    Address as EthernetAddress, EtherType as EthernetProtocol, Frame as EthernetFrame,
    Repr as EthernetRepr, HEADER_LEN as ETHERNET_HEADER_LEN,
};

mod arp;
pub use self::arp::{
    Hardware as ArpHardware, Operation as ArpOperation, Packet as ArpPacket, Repr as ArpRepr,
    HEADER_LEN as ARP_HEADER_LEN,
};

mod ipv4;
pub use self::ipv4::{
    Address as Ipv4Address, AddressExt as Ipv4AddressExt, Cidr as Ipv4Cidr, Packet as Ipv4Packet,
    Protocol as IpProtocol, Repr as Ipv4Repr, HEADER_LEN as IPV4_HEADER_LEN,
};

mod icmpv4;
pub use self::icmpv4::{
    DstUnreachable as Icmpv4DstUnreachable, Message as Icmpv4Message, Packet as Icmpv4Packet,
    Repr as Icmpv4Repr, TimeExceeded as Icmpv4TimeExceeded,
};

mod segment;
pub use self::segment::{Flags as SegmentFlags, Packet as SegmentPacket, Repr as SegmentRepr,
    HEADER_LEN as SEGMENT_HEADER_LEN, MAX_SEGMENT_SIZE};

/// Parsing a packet failed: it is either malformed, or shorter than its own
/// header claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error;

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed or truncated packet")
    }
}

pub type Result<T> = core::result::Result<T, Error>;
