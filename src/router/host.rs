use crate::time::Instant;

/// I/O and clock services a [`super::Router`] needs from its embedder,
/// playing the same role here that [`crate::ctcp::ConnectionHost`] plays
/// for a connection: the router core never opens a socket, it asks the
/// host to send a frame on a named interface.
pub trait RouterHost {
    /// Transmit `frame` out the interface named `iface`. Treated as
    /// non-blocking, matching the source's `sr_send_packet`.
    fn send_frame(&mut self, iface: &str, frame: &[u8]) -> bool;

    /// Monotonic clock, used for ARP entry/request aging.
    fn now(&self) -> Instant;
}
