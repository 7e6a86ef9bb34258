use thiserror::Error;

/// Failures internal to a single `Router::on_frame` call. None of these
/// ever reach a caller — they're drop reasons, logged and discarded, same
/// as the source's `fprintf(stderr, ...); return;` early-outs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterError {
    #[error("frame shorter than an Ethernet header")]
    FrameTooShort,
    #[error("IPv4 packet shorter than its own header claims")]
    Ipv4TooShort,
    #[error("IPv4 header checksum does not match")]
    Ipv4BadChecksum,
    #[error("unknown ingress interface")]
    UnknownIface,
}
