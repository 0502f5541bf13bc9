use bytes::{Buf, BufMut, BytesMut};

use super::{PacketKey, ProtocolType, MAX_PACKET_SIZE};
use crate::error::Error;

/// Width of a header on the wire.
pub const HEADER_SIZE: usize = 1 + 4 + 1;

/// `<protocol u8><length u32 LE><type u8>`
///
/// `size` is the declared length as found on the wire, it includes the
/// type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    protocol: u8,
    size: u32,
    packet_type: u8,
    defined: bool,
}

impl PacketHeader {
    /// A defined header for a payload of `payload_len` bytes.
    pub fn new(key: PacketKey, payload_len: usize) -> Self {
        Self {
            protocol: key.protocol,
            size: payload_len as u32 + 1,
            packet_type: key.packet_type,
            defined: true,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.defined
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn key(&self) -> Result<PacketKey, Error> {
        if !self.defined {
            return Err(Error::HeaderUndefined);
        }
        Ok(PacketKey { protocol: self.protocol, packet_type: self.packet_type })
    }

    /// Bytes that follow the header, the type byte excluded.
    pub fn payload_len(&self) -> Result<usize, Error> {
        if !self.defined {
            return Err(Error::HeaderUndefined);
        }
        Ok(self.size as usize - 1)
    }

    /// Parse a header from the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched when it holds less than
    /// [`HEADER_SIZE`] bytes. A malformed header is not consumed either.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, Error> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&buf[..HEADER_SIZE]);

        let header = Self::parse(raw)?;
        buf.advance(HEADER_SIZE);
        Ok(Some(header))
    }

    fn parse(raw: [u8; HEADER_SIZE]) -> Result<Self, Error> {
        let protocol = raw[0];
        let size = u32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]);
        let packet_type = raw[5];

        if ProtocolType::try_from(protocol).is_err()
            || size == 0
            || size > MAX_PACKET_SIZE
        {
            return Err(Error::MalformedHeader);
        }

        Ok(Self { protocol, size, packet_type, defined: true })
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<(), Error> {
        if !self.defined {
            return Err(Error::HeaderUndefined);
        }
        buf.put_u8(self.protocol);
        buf.put_u32_le(self.size);
        buf.put_u8(self.packet_type);
        Ok(())
    }
}

impl std::fmt::Display for PacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.defined {
            return f.write_str("header(undefined)");
        }
        write!(
            f,
            "header(protocol: {:#04x}, type: {:#04x}, size: {})",
            self.protocol, self.packet_type, self.size
        )
    }
}
