//! The cTCP segment wire header: 18 bytes, network byte order, one's
//! complement internet checksum over the whole segment with the checksum
//! field zeroed.
use byteorder::{ByteOrder, NetworkEndian};
use core::fmt;

use super::{checksum, Error, Result};

/// Maximum segment payload size.
pub const MAX_SEGMENT_SIZE: usize = 1440;

#[allow(unused)]
mod field {
    use crate::wire::field::*;

    pub const SEQNO: Field = 0..4;
    pub const ACKNO: Field = 4..8;
    pub const LEN: Field = 8..10;
    pub const FLAGS: Field = 10..14;
    pub const WINDOW: Field = 14..16;
    pub const CKSUM: Field = 16..18;
    pub const PAYLOAD: Rest = 18..;
}

pub const HEADER_LEN: usize = field::PAYLOAD.start;

/// Segment control flags. Only the low three bits defined below are ever
/// set; the rest of the (wire-4-byte) field is reserved and always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(pub u32);

impl Flags {
    pub const FIN: Flags = Flags(0x01);
    pub const SYN: Flags = Flags(0x02);
    pub const ACK: Flags = Flags(0x10);
    pub const NONE: Flags = Flags(0x00);

    pub const fn contains(&self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub const fn union(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (bit, name) in [(Self::SYN, "SYN"), (Self::ACK, "ACK"), (Self::FIN, "FIN")] {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "-")?;
        }
        Ok(())
    }
}

/// A read/write wrapper around a cTCP segment buffer.
#[derive(Debug, Clone)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    pub const fn new_unchecked(buffer: T) -> Packet<T> {
        Packet { buffer }
    }

    pub fn new_checked(buffer: T) -> Result<Packet<T>> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    pub fn check_len(&self) -> Result<()> {
        let data = self.buffer.as_ref();
        if data.len() < HEADER_LEN {
            return Err(Error);
        }
        if (self.len() as usize) < HEADER_LEN || (self.len() as usize) != data.len() {
            return Err(Error);
        }
        Ok(())
    }

    pub fn into_inner(self) -> T {
        self.buffer
    }

    pub fn seqno(&self) -> u32 {
        NetworkEndian::read_u32(&self.buffer.as_ref()[field::SEQNO])
    }

    pub fn ackno(&self) -> u32 {
        NetworkEndian::read_u32(&self.buffer.as_ref()[field::ACKNO])
    }

    pub fn len(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[field::LEN])
    }

    pub fn is_empty(&self) -> bool {
        self.len() as usize == HEADER_LEN
    }

    pub fn flags(&self) -> Flags {
        Flags(NetworkEndian::read_u32(&self.buffer.as_ref()[field::FLAGS]))
    }

    pub fn window(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[field::WINDOW])
    }

    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[field::CKSUM])
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[field::PAYLOAD.start..self.len() as usize]
    }

    /// Verify the one's-complement checksum over the whole segment.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(&self.buffer.as_ref()[..self.len() as usize]) == 0
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    pub fn set_seqno(&mut self, value: u32) {
        NetworkEndian::write_u32(&mut self.buffer.as_mut()[field::SEQNO], value);
    }

    pub fn set_ackno(&mut self, value: u32) {
        NetworkEndian::write_u32(&mut self.buffer.as_mut()[field::ACKNO], value);
    }

    pub fn set_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[field::LEN], value);
    }

    pub fn set_flags(&mut self, value: Flags) {
        NetworkEndian::write_u32(&mut self.buffer.as_mut()[field::FLAGS], value.0);
    }

    pub fn set_window(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[field::WINDOW], value);
    }

    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[field::CKSUM], value);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let len = self.len() as usize;
        &mut self.buffer.as_mut()[field::PAYLOAD.start..len]
    }

    /// Recompute and store the checksum, with the checksum field itself
    /// zeroed for the computation as required by the one's-complement
    /// algorithm.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let len = self.len() as usize;
        let sum = checksum::data(&self.buffer.as_ref()[..len]);
        self.set_checksum(checksum::complete(sum));
    }
}

/// A high-level representation of a cTCP segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repr {
    pub seqno: u32,
    pub ackno: u32,
    pub flags: Flags,
    pub window: u16,
    pub payload: Vec<u8>,
}

impl Repr {
    /// Parse and checksum-validate a segment.
    pub fn parse<T: AsRef<[u8]>>(packet: &Packet<T>) -> Result<Repr> {
        packet.check_len()?;
        if !packet.verify_checksum() {
            return Err(Error);
        }
        Ok(Repr {
            seqno: packet.seqno(),
            ackno: packet.ackno(),
            flags: packet.flags(),
            window: packet.window(),
            payload: packet.payload().to_vec(),
        })
    }

    pub fn buffer_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, packet: &mut Packet<T>) {
        packet.set_seqno(self.seqno);
        packet.set_ackno(self.ackno);
        packet.set_len(self.buffer_len() as u16);
        packet.set_flags(self.flags);
        packet.set_window(self.window);
        packet.payload_mut().copy_from_slice(&self.payload);
        packet.fill_checksum();
    }
}
