//! RFC 1071 one's-complement checksum helpers, shared by the IPv4, ICMPv4 and
//! cTCP segment headers.
use byteorder::{ByteOrder, NetworkEndian};

const fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Compute an RFC 1071 checksum over `data`, without the final complement.
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum: u32 = 0;

    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }
        data = &data[CHUNK_SIZE..];
    }

    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 partial checksums.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// Complete a checksum: one's complement of the running sum, with `0x0000`
/// folded to `0xffff` so that "no checksum" is never confused with "valid,
/// sums to zero".
pub fn complete(accum: u16) -> u16 {
    let sum = !accum;
    if sum == 0 {
        0xffff
    } else {
        sum
    }
}
