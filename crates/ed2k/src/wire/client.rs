//! Messages exchanged between two clients.
use bitvec::{order::Lsb0, vec::BitVec};
use bytes::{BufMut, Bytes};

use super::{
    serial::{
        check_len, put_string, string_bytes_count, BufExt, Endpoint, Offset, Serial,
        SoftSerial,
    },
    tag::TagList,
};
use crate::{error::Error, hash::Hash};

/// Who a client is: body of [`Hello`] and of the hello answer.
///
/// `<HASH 16><ID 4><PORT 2><1 Tag_set><SERVER_IP 4><SERVER_PORT 2>`
#[derive(Debug, Clone, PartialEq)]
pub struct PeerInfo {
    pub hash: Hash,
    /// Client id (or address) and TCP port.
    pub endpoint: Endpoint,
    pub tags: TagList,
    /// The server this client is connected to, zeroes when none.
    pub server: Endpoint,
}

impl Serial for PeerInfo {
    fn bytes_count(&self) -> usize {
        16 + Endpoint::SIZE + self.tags.bytes_count() + Endpoint::SIZE
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self {
            hash: Hash::decode(buf)?,
            endpoint: Endpoint::decode(buf)?,
            tags: TagList::decode(buf)?,
            server: Endpoint::decode(buf)?,
        })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        self.endpoint.encode(buf);
        self.tags.encode(buf);
        self.server.encode(buf);
    }

    fn check(&self) -> Result<(), Error> {
        self.tags.check()
    }
}

/// The first message on a client connection. Same as [`PeerInfo`] with a
/// leading hash length byte, always 16.
#[derive(Debug, Clone, PartialEq)]
pub struct Hello(pub PeerInfo);

impl Serial for Hello {
    fn bytes_count(&self) -> usize {
        1 + self.0.bytes_count()
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let _hash_len = buf.read_u8()?;
        Ok(Self(PeerInfo::decode(buf)?))
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(crate::hash::HASH_SIZE as u8);
        self.0.encode(buf);
    }

    fn check(&self) -> Result<(), Error> {
        self.0.check()
    }
}

/// eMule info exchanged right after the hello on eMule connections.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtHello {
    pub version: u8,
    pub protocol_version: u8,
    pub tags: TagList,
}

impl Serial for ExtHello {
    fn bytes_count(&self) -> usize {
        2 + self.tags.bytes_count()
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self {
            version: buf.read_u8()?,
            protocol_version: buf.read_u8()?,
            tags: TagList::decode(buf)?,
        })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.protocol_version);
        self.tags.encode(buf);
    }

    fn check(&self) -> Result<(), Error> {
        self.tags.check()
    }
}

/// A chunk of file data: `<HASH 16><begin O><end O><data end-begin>`.
///
/// `O` is `u32` for the classic message and `u64` for the eMule 64 bits
/// variant. `data` is a view on the received payload, no copy is made.
#[derive(Debug, Clone, PartialEq)]
pub struct SendingPart<O> {
    pub hash: Hash,
    pub begin: O,
    pub end: O,
    pub data: Bytes,
}

impl<O: Offset> SendingPart<O> {
    pub fn range(&self) -> std::ops::Range<u64> {
        self.begin.to_u64()..self.end.to_u64()
    }
}

impl<O: Offset> Serial for SendingPart<O> {
    fn bytes_count(&self) -> usize {
        16 + 2 * O::SIZE + self.data.len()
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let hash = Hash::decode(buf)?;
        let begin = O::read(buf)?;
        let end = O::read(buf)?;

        // an inverted range can't describe the bytes that follow
        let len = end.to_u64().checked_sub(begin.to_u64()).ok_or(Error::UnexpectedEof)?;
        let data = buf.read_bytes(len as usize)?;

        Ok(Self { hash, begin, end, data })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        self.begin.put(buf);
        self.end.put(buf);
        buf.put_slice(&self.data);
    }
}

/// Ask for up to three ranges of a file, unused slots are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestParts<O> {
    pub hash: Hash,
    pub begins: [O; 3],
    pub ends: [O; 3],
}

impl<O: Offset> RequestParts<O> {
    pub fn new(hash: Hash) -> Self {
        Self { hash, begins: [O::default(); 3], ends: [O::default(); 3] }
    }

    /// Ranges actually requested.
    pub fn ranges(&self) -> impl Iterator<Item = std::ops::Range<u64>> + '_ {
        self.begins
            .iter()
            .zip(self.ends.iter())
            .map(|(b, e)| b.to_u64()..e.to_u64())
            .filter(|r| !r.is_empty())
    }
}

impl<O: Offset> Serial for RequestParts<O> {
    fn bytes_count(&self) -> usize {
        16 + 6 * O::SIZE
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let mut parts = Self::new(Hash::decode(buf)?);
        for begin in parts.begins.iter_mut() {
            *begin = O::read(buf)?;
        }
        for end in parts.ends.iter_mut() {
            *end = O::read(buf)?;
        }
        Ok(parts)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        for begin in self.begins {
            begin.put(buf);
        }
        for end in self.ends {
            end.put(buf);
        }
    }
}

/// Pieces a peer has. An empty bitfield means the peer has the whole file.
///
/// `<HASH 16><count 2><bits (count+7)/8>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub hash: Hash,
    pub parts: BitVec<u8, Lsb0>,
}

impl Serial for FileStatus {
    fn bytes_count(&self) -> usize {
        16 + 2 + self.parts.len().div_ceil(8)
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let hash = Hash::decode(buf)?;
        let count = buf.read_u16()? as usize;
        let raw = buf.read_bytes(count.div_ceil(8))?;

        let mut parts = BitVec::<u8, Lsb0>::from_slice(&raw[..]);
        parts.truncate(count);

        Ok(Self { hash, parts })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        buf.put_u16_le(self.parts.len() as u16);
        let mut parts = self.parts.clone();
        parts.set_uninitialized(false);
        buf.put_slice(parts.as_raw_slice());
    }

    fn check(&self) -> Result<(), Error> {
        check_len("parts", self.parts.len(), u16::MAX as usize)
    }
}

/// Hashes of every piece of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSetAnswer {
    pub hash: Hash,
    pub parts: Vec<Hash>,
}

impl Serial for HashSetAnswer {
    fn bytes_count(&self) -> usize {
        16 + 2 + 16 * self.parts.len()
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let hash = Hash::decode(buf)?;
        let count = buf.read_u16()? as usize;
        buf.need(count * 16)?;
        let parts = (0..count).map(|_| Hash::decode(buf)).collect::<Result<_, _>>()?;
        Ok(Self { hash, parts })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        buf.put_u16_le(self.parts.len() as u16);
        for part in &self.parts {
            part.encode(buf);
        }
    }

    fn check(&self) -> Result<(), Error> {
        check_len("parts", self.parts.len(), u16::MAX as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAnswer {
    pub hash: Hash,
    pub name: String,
}

impl Serial for FileAnswer {
    fn bytes_count(&self) -> usize {
        16 + string_bytes_count(&self.name)
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self { hash: Hash::decode(buf)?, name: buf.read_string()? })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        put_string(buf, &self.name);
    }

    fn check(&self) -> Result<(), Error> {
        check_len("name", self.name.len(), u16::MAX as usize)
    }
}

/// Our position in the upload queue of the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRanking {
    pub rank: u16,
}

impl QueueRanking {
    const PADDING: usize = 10;
}

impl Serial for QueueRanking {
    fn bytes_count(&self) -> usize {
        2 + Self::PADDING
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let size = buf.len();
        Self::decode_limited(buf, size)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.rank);
        buf.put_bytes(0, Self::PADDING);
    }
}

impl SoftSerial for QueueRanking {
    fn decode_limited(buf: &mut Bytes, size: usize) -> Result<Self, Error> {
        let rank = buf.read_u16()?;
        // some clients send less padding than they should
        let padding = size.saturating_sub(2).min(buf.len());
        buf.read_bytes(padding)?;
        Ok(Self { rank })
    }
}
