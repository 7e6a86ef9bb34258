use thiserror::Error;

/// Why a connection was torn down, surfaced to the host via
/// [`super::TickOutcome::Destroyed`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("peer unresponsive: segment reached max_transmissions without ack")]
    PeerUnresponsive,
    #[error("connection closed normally")]
    ClosedNormally,
}
