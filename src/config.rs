/*! Configuration knobs for the cTCP engine.

Mirrors the shape of [`crate::router::IfaceConfig`]: a small plain struct with
a `Default` impl, constructed once by the host and handed to
[`crate::ctcp::Connection::new`].
*/
use crate::time::Duration;

/// Maximum cTCP segment payload size, in bytes.
pub const MSS: usize = 1440;

/// Maximum segment lifetime.
pub const MSL: Duration = Duration::from_secs(60);

/// A transmission record is abandoned, and the connection destroyed, once a
/// segment has been sent this many times without being acknowledged.
pub const MAX_TRANSMISSIONS: u32 = 6;

/// Per-connection configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Bytes this side is willing to buffer for the application before it's read.
    pub recv_window: u16,
    /// Bytes this side is willing to have in flight, unacknowledged.
    pub send_window: u16,
    /// Retransmit-tick period.
    pub timer: Duration,
    /// Time without an ACK before a segment is considered lost and resent.
    pub rt_timeout: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            recv_window: 3 * MSS as u16,
            send_window: 3 * MSS as u16,
            timer: Duration::from_millis(40),
            rt_timeout: Duration::from_millis(200),
        }
    }
}
