//! The 16 bytes MD4 digest that identifies files, pieces and users.
use std::{fmt::Display, ops::Deref, str::FromStr};

use bytes::{Buf, BufMut};
use md4::{Digest, Md4};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

pub const HASH_SIZE: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl Hash {
    /// MD4 of the empty input, it closes the hash set of files whose size is
    /// a multiple of the piece size.
    pub const TERMINAL: Hash = Hash([
        0x31, 0xD6, 0xCF, 0xE0, 0xD1, 0x6A, 0xE9, 0x31, 0xB7, 0x3C, 0x59, 0xD7,
        0xE0, 0xC0, 0x89, 0xC0,
    ]);

    /// User hash marker of this client.
    pub const LIBED2K: Hash = Hash([
        0x31, 0xD6, 0xCF, 0xE0, 0xD1, 0x4C, 0xE9, 0x31, 0xB7, 0x3C, 0x59, 0xD7,
        0xE0, 0xC0, 0x4B, 0xC0,
    ]);

    /// User hash marker of a generic eMule peer.
    pub const EMULE: Hash = Hash([
        0x31, 0xD6, 0xCF, 0xE0, 0xD1, 0x0E, 0xE9, 0x31, 0xB7, 0x3C, 0x59, 0xD7,
        0xE0, 0xC0, 0x6F, 0xC0,
    ]);

    /// Placeholder for "no hash". Distinct from the all-zero hash, which is a
    /// legal value on the wire.
    pub const INVALID: Hash = Hash([0xFF; HASH_SIZE]);

    /// MD4 digest of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Md4::digest(bytes).into()
    }

    /// The identifier of a file given the hashes of its pieces.
    ///
    /// A file made of a single piece is identified by that piece hash,
    /// otherwise by the MD4 of all the piece hashes concatenated.
    pub fn from_pieces(pieces: &[Hash]) -> Self {
        match pieces {
            [] => Hash::TERMINAL,
            [single] => *single,
            many => {
                let mut hasher = Md4::new();
                for piece in many {
                    hasher.update(piece.0);
                }
                hasher.finalize().into()
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < HASH_SIZE {
            return Err(Error::UnexpectedEof);
        }
        let mut hash = [0u8; HASH_SIZE];
        buf.copy_to_slice(&mut hash);
        Ok(Self(hash))
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.0);
    }
}

impl From<md4::digest::Output<Md4>> for Hash {
    fn from(value: md4::digest::Output<Md4>) -> Self {
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&value);
        Self(hash)
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string())
    }
}

impl Deref for Hash {
    type Target = [u8; HASH_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_SIZE * 2 {
            return Err(Error::HashLength);
        }
        let buff = hex::decode(s)?;
        Hash::try_from(buff.as_slice())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let hash: [u8; HASH_SIZE] =
            value.try_into().map_err(|_| Error::HashLength)?;
        Ok(Self(hash))
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(value: [u8; HASH_SIZE]) -> Self {
        Self(value)
    }
}

impl From<Hash> for [u8; HASH_SIZE] {
    fn from(value: Hash) -> Self {
        value.0
    }
}
