//! Encoding and decoding of the payload of messages.
use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::{Buf, BufMut, Bytes};

use crate::{error::Error, hash::Hash};

/// A value that knows its own encoded size and how to read and write itself.
///
/// Payloads are handed to [`Serial::decode`] already cut to the size
/// declared in the header, so a decoder can never read into the next packet.
pub trait Serial: Sized {
    /// Exact encoded length of the current value.
    fn bytes_count(&self) -> usize;
    fn decode(buf: &mut Bytes) -> Result<Self, Error>;
    fn encode(&self, buf: &mut impl BufMut);

    /// Every length prefixed field fits its prefix. [`Serial::encode`]
    /// truncates lengths that don't.
    fn check(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// A message whose layout depends on how many bytes the sender put on the
/// wire, older and newer peers/servers send more or fewer fields.
pub trait SoftSerial: Serial {
    /// Decode consuming exactly `size` bytes of `buf`.
    fn decode_limited(buf: &mut Bytes, size: usize) -> Result<Self, Error>;
}

/// Bounds checked reads, `bytes` panics on underflow.
pub trait BufExt: Buf {
    fn need(&self, n: usize) -> Result<(), Error> {
        if self.remaining() < n {
            return Err(Error::UnexpectedEof);
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        self.need(1)?;
        Ok(self.get_u8())
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        self.need(2)?;
        Ok(self.get_u16_le())
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        self.need(4)?;
        Ok(self.get_u32_le())
    }

    fn read_u64(&mut self) -> Result<u64, Error> {
        self.need(8)?;
        Ok(self.get_u64_le())
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        self.need(4)?;
        Ok(self.get_f32_le())
    }

    fn read_bytes(&mut self, n: usize) -> Result<Bytes, Error> {
        self.need(n)?;
        Ok(self.copy_to_bytes(n))
    }

    /// `<len 2><utf-8 bytes len>`
    fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_u16()? as usize;
        self.read_str(len)
    }

    fn read_str(&mut self, len: usize) -> Result<String, Error> {
        let raw = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

impl<B: Buf + ?Sized> BufExt for B {}

pub fn put_string(buf: &mut impl BufMut, s: &str) {
    debug_assert!(s.len() <= u16::MAX as usize, "string of {} bytes", s.len());
    buf.put_u16_le(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

pub fn string_bytes_count(s: &str) -> usize {
    2 + s.len()
}

/// `len` items of `field` must fit a prefix that counts up to `max`.
pub fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), Error> {
    if len > max {
        return Err(Error::FieldTooLong { field, len, max });
    }
    Ok(())
}

impl Serial for Hash {
    fn bytes_count(&self) -> usize {
        crate::hash::HASH_SIZE
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Hash::decode(buf)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        Hash::encode(self, buf)
    }
}

/// Width of the offsets of a transfer message, the classic messages use
/// 32 bits and the eMule extension 64 bits for files larger than 4 GiB.
pub trait Offset: Copy + Default + PartialEq + std::fmt::Debug + Into<u64> {
    const SIZE: usize;
    fn read(buf: &mut Bytes) -> Result<Self, Error>;
    fn put(self, buf: &mut impl BufMut);

    fn to_u64(self) -> u64 {
        self.into()
    }
}

impl Offset for u32 {
    const SIZE: usize = 4;

    fn read(buf: &mut Bytes) -> Result<Self, Error> {
        buf.read_u32()
    }

    fn put(self, buf: &mut impl BufMut) {
        buf.put_u32_le(self)
    }
}

impl Offset for u64 {
    const SIZE: usize = 8;

    fn read(buf: &mut Bytes) -> Result<Self, Error> {
        buf.read_u64()
    }

    fn put(self, buf: &mut impl BufMut) {
        buf.put_u64_le(self)
    }
}

/// An IPv4 address (or a client ID) and a port.
///
/// The address is stored as it appears on the wire: the octets in network
/// order read as a little endian u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Endpoint {
    pub ip: u32,
    pub port: u16,
}

impl Endpoint {
    pub const SIZE: usize = 4 + 2;

    /// Client IDs below this value are "low IDs": the client is firewalled
    /// and the value is not an address.
    pub const LOW_ID_LIMIT: u32 = 0x0100_0000;

    pub fn is_low_id(&self) -> bool {
        self.ip < Self::LOW_ID_LIMIT
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(value: SocketAddrV4) -> Self {
        Self { ip: u32::from_le_bytes(value.ip().octets()), port: value.port() }
    }
}

impl From<Endpoint> for SocketAddrV4 {
    fn from(value: Endpoint) -> Self {
        SocketAddrV4::new(Ipv4Addr::from(value.ip.to_le_bytes()), value.port)
    }
}

impl Serial for Endpoint {
    fn bytes_count(&self) -> usize {
        Self::SIZE
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self { ip: buf.read_u32()?, port: buf.read_u16()? })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.ip);
        buf.put_u16_le(self.port);
    }
}
