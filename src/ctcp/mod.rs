/*! The cTCP connection engine: sequence tracking, flow control, the
termination handshake, and BBR-driven pacing.

No handshake — a [`Connection`] starts `ESTABLISHED`; nothing in this crate
decides when two peers agree to talk, only what happens once they do. Five
entrypoints, one per [`ConnectionHost`]-driven event, are meant to be called
from a single-threaded event loop: nothing here blocks or spawns a thread.
*/
mod connection;
mod error;
mod host;
mod table;

pub use connection::{Connection, State, TickOutcome};
pub use error::ConnectionError;
pub use host::ConnectionHost;
pub use table::{ConnId, ConnectionTable};
