//! Messages exchanged between a client and a server.
use bytes::{BufMut, Bytes};

use super::{
    serial::{
        check_len, put_string, string_bytes_count, BufExt, Endpoint, Serial, SoftSerial,
    },
    tag::TagList,
};
use crate::{error::Error, hash::Hash};

/// First message a client sends to a server.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginRequest {
    pub hash: Hash,
    pub client_id: u32,
    pub port: u16,
    pub tags: TagList,
}

impl Serial for LoginRequest {
    fn bytes_count(&self) -> usize {
        16 + 4 + 2 + self.tags.bytes_count()
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self {
            hash: Hash::decode(buf)?,
            client_id: buf.read_u32()?,
            port: buf.read_u16()?,
            tags: TagList::decode(buf)?,
        })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        buf.put_u32_le(self.client_id);
        buf.put_u16_le(self.port);
        self.tags.encode(buf);
    }

    fn check(&self) -> Result<(), Error> {
        self.tags.check()
    }
}

/// Ask the server for the sources of a file.
///
/// Sizes that fit in 32 bits are sent as is, larger ones as a zero
/// followed by the 64 bits size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetFileSources {
    pub hash: Hash,
    pub size: u64,
}

impl GetFileSources {
    fn is_large(&self) -> bool {
        self.size > u32::MAX as u64
    }
}

impl Serial for GetFileSources {
    fn bytes_count(&self) -> usize {
        if self.is_large() {
            16 + 4 + 8
        } else {
            16 + 4
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let size = buf.len();
        Self::decode_limited(buf, size)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        if self.is_large() {
            buf.put_u32_le(0);
            buf.put_u64_le(self.size);
        } else {
            buf.put_u32_le(self.size as u32);
        }
    }
}

impl SoftSerial for GetFileSources {
    fn decode_limited(buf: &mut Bytes, size: usize) -> Result<Self, Error> {
        let hash = Hash::decode(buf)?;
        let size = match size {
            0..=16 => 0,
            17..=27 => buf.read_u32()? as u64,
            _ => {
                let low = buf.read_u32()?;
                if low != 0 {
                    low as u64
                } else {
                    buf.read_u64()?
                }
            }
        };
        Ok(Self { hash, size })
    }
}

/// Ask the server to have a low id client call us back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackRequest {
    pub client_id: u32,
}

impl Serial for CallbackRequest {
    fn bytes_count(&self) -> usize {
        4
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self { client_id: buf.read_u32()? })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_id);
    }
}

/// `<count 1>(<IP 4><PORT 2>)[count]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerList {
    pub servers: Vec<Endpoint>,
}

impl Serial for ServerList {
    fn bytes_count(&self) -> usize {
        1 + self.servers.len() * Endpoint::SIZE
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self { servers: decode_endpoints(buf)? })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        encode_endpoints(&self.servers, buf);
    }

    fn check(&self) -> Result<(), Error> {
        check_len("servers", self.servers.len(), u8::MAX as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStatus {
    pub users: u32,
    pub files: u32,
}

impl Serial for ServerStatus {
    fn bytes_count(&self) -> usize {
        8
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self { users: buf.read_u32()?, files: buf.read_u32()? })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.users);
        buf.put_u32_le(self.files);
    }
}

/// A client asked for a callback, connect to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackRequested {
    pub endpoint: Endpoint,
}

impl Serial for CallbackRequested {
    fn bytes_count(&self) -> usize {
        Endpoint::SIZE
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self { endpoint: Endpoint::decode(buf)? })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.endpoint.encode(buf);
    }
}

/// Free text from the server, usually the MOTD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    pub message: String,
}

impl Serial for ServerMessage {
    fn bytes_count(&self) -> usize {
        string_bytes_count(&self.message)
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self { message: buf.read_string()? })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.message);
    }

    fn check(&self) -> Result<(), Error> {
        check_len("message", self.message.len(), u16::MAX as usize)
    }
}

/// The id the server assigned to us after login. Newer servers append
/// their TCP flags and an auxiliary port.
///
/// The port comes after the flags on the wire: with a port and no flags,
/// the flags are sent as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdChange {
    pub client_id: u32,
    pub tcp_flags: Option<u32>,
    pub aux_port: Option<u32>,
}

impl Serial for IdChange {
    fn bytes_count(&self) -> usize {
        match (self.tcp_flags, self.aux_port) {
            (None, None) => 4,
            (Some(_), None) => 8,
            (_, Some(_)) => 12,
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let size = buf.len();
        Self::decode_limited(buf, size)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.client_id);
        if self.tcp_flags.is_some() || self.aux_port.is_some() {
            buf.put_u32_le(self.tcp_flags.unwrap_or(0));
        }
        if let Some(port) = self.aux_port {
            buf.put_u32_le(port);
        }
    }
}

impl SoftSerial for IdChange {
    fn decode_limited(buf: &mut Bytes, size: usize) -> Result<Self, Error> {
        let client_id = buf.read_u32()?;
        let tcp_flags = if size >= 8 { Some(buf.read_u32()?) } else { None };
        let aux_port = if size >= 12 { Some(buf.read_u32()?) } else { None };
        Ok(Self { client_id, tcp_flags, aux_port })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerIdent {
    pub hash: Hash,
    pub endpoint: Endpoint,
    pub tags: TagList,
}

impl Serial for ServerIdent {
    fn bytes_count(&self) -> usize {
        16 + Endpoint::SIZE + self.tags.bytes_count()
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self {
            hash: Hash::decode(buf)?,
            endpoint: Endpoint::decode(buf)?,
            tags: TagList::decode(buf)?,
        })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        self.endpoint.encode(buf);
        self.tags.encode(buf);
    }

    fn check(&self) -> Result<(), Error> {
        self.tags.check()
    }
}

/// Sources of a file, in answer to [`GetFileSources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFileSources {
    pub hash: Hash,
    pub sources: Vec<Endpoint>,
}

impl Serial for FoundFileSources {
    fn bytes_count(&self) -> usize {
        16 + 1 + self.sources.len() * Endpoint::SIZE
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        Ok(Self { hash: Hash::decode(buf)?, sources: decode_endpoints(buf)? })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.hash.encode(buf);
        encode_endpoints(&self.sources, buf);
    }

    fn check(&self) -> Result<(), Error> {
        check_len("sources", self.sources.len(), u8::MAX as usize)
    }
}

fn decode_endpoints(buf: &mut Bytes) -> Result<Vec<Endpoint>, Error> {
    let count = buf.read_u8()? as usize;
    buf.need(count * Endpoint::SIZE)?;
    (0..count).map(|_| Endpoint::decode(buf)).collect()
}

fn encode_endpoints(endpoints: &[Endpoint], buf: &mut impl BufMut) {
    buf.put_u8(endpoints.len() as u8);
    for endpoint in endpoints {
        endpoint.encode(buf);
    }
}
