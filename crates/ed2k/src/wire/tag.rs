//! Tags are typed key/value pairs used to extend messages without changing
//! their layout, clients describe themselves in hellos with them and servers
//! describe files and themselves with them.
use bytes::{BufMut, Bytes};

use super::serial::{check_len, put_string, BufExt, Serial};
use crate::{error::Error, hash::Hash};

pub const TAGTYPE_HASH16: u8 = 0x01;
pub const TAGTYPE_STRING: u8 = 0x02;
pub const TAGTYPE_UINT32: u8 = 0x03;
pub const TAGTYPE_FLOAT32: u8 = 0x04;
pub const TAGTYPE_BOOL: u8 = 0x05;
pub const TAGTYPE_BLOB: u8 = 0x07;
pub const TAGTYPE_UINT16: u8 = 0x08;
pub const TAGTYPE_UINT8: u8 = 0x09;
pub const TAGTYPE_BSOB: u8 = 0x0A;
pub const TAGTYPE_UINT64: u8 = 0x0B;
/// Strings of 1 to 16 bytes encode their length in the type.
pub const TAGTYPE_STR1: u8 = 0x11;
pub const TAGTYPE_STR16: u8 = 0x20;

/// Set on the type byte when the name is a single byte id.
const ID_FLAG: u8 = 0x80;

// client tag ids
pub const CT_NAME: u8 = 0x01;
pub const CT_PORT: u8 = 0x0F;
pub const CT_VERSION: u8 = 0x11;
pub const CT_SERVER_FLAGS: u8 = 0x20;
pub const CT_MOD_VERSION: u8 = 0x55;
pub const CT_EMULE_VERSION: u8 = 0xFB;

// file tag ids
pub const FT_FILENAME: u8 = 0x01;
pub const FT_FILESIZE: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagName {
    Id(u8),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Hash16(Hash),
    String(String),
    Uint32(u32),
    Float32(f32),
    Bool(bool),
    Blob(Bytes),
    Uint16(u16),
    Uint8(u8),
    Bsob(Bytes),
    Uint64(u64),
}

impl TagValue {
    fn tag_type(&self) -> u8 {
        match self {
            Self::Hash16(_) => TAGTYPE_HASH16,
            Self::String(_) => TAGTYPE_STRING,
            Self::Uint32(_) => TAGTYPE_UINT32,
            Self::Float32(_) => TAGTYPE_FLOAT32,
            Self::Bool(_) => TAGTYPE_BOOL,
            Self::Blob(_) => TAGTYPE_BLOB,
            Self::Uint16(_) => TAGTYPE_UINT16,
            Self::Uint8(_) => TAGTYPE_UINT8,
            Self::Bsob(_) => TAGTYPE_BSOB,
            Self::Uint64(_) => TAGTYPE_UINT64,
        }
    }

    fn check(&self) -> Result<(), Error> {
        match self {
            Self::String(s) => check_len("string", s.len(), u16::MAX as usize),
            Self::Blob(b) => check_len("blob", b.len(), u32::MAX as usize),
            Self::Bsob(b) => check_len("bsob", b.len(), u8::MAX as usize),
            _ => Ok(()),
        }
    }

    fn bytes_count(&self) -> usize {
        match self {
            Self::Hash16(_) => 16,
            Self::String(s) => 2 + s.len(),
            Self::Uint32(_) | Self::Float32(_) => 4,
            Self::Bool(_) | Self::Uint8(_) => 1,
            Self::Blob(b) => 4 + b.len(),
            Self::Uint16(_) => 2,
            Self::Bsob(b) => 1 + b.len(),
            Self::Uint64(_) => 8,
        }
    }

    fn decode(tag_type: u8, buf: &mut Bytes) -> Result<Self, Error> {
        let value = match tag_type {
            TAGTYPE_HASH16 => Self::Hash16(Hash::decode(buf)?),
            TAGTYPE_STRING => Self::String(buf.read_string()?),
            TAGTYPE_UINT32 => Self::Uint32(buf.read_u32()?),
            TAGTYPE_FLOAT32 => Self::Float32(buf.read_f32()?),
            TAGTYPE_BOOL => Self::Bool(buf.read_u8()? != 0),
            TAGTYPE_BLOB => {
                let len = buf.read_u32()? as usize;
                Self::Blob(buf.read_bytes(len)?)
            }
            TAGTYPE_UINT16 => Self::Uint16(buf.read_u16()?),
            TAGTYPE_UINT8 => Self::Uint8(buf.read_u8()?),
            TAGTYPE_BSOB => {
                let len = buf.read_u8()? as usize;
                Self::Bsob(buf.read_bytes(len)?)
            }
            TAGTYPE_UINT64 => Self::Uint64(buf.read_u64()?),
            TAGTYPE_STR1..=TAGTYPE_STR16 => {
                let len = (tag_type - TAGTYPE_STR1 + 1) as usize;
                Self::String(buf.read_str(len)?)
            }
            t => return Err(Error::UnsupportedTag(t)),
        };
        Ok(value)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::Hash16(h) => h.encode(buf),
            Self::String(s) => put_string(buf, s),
            Self::Uint32(v) => buf.put_u32_le(*v),
            Self::Float32(v) => buf.put_f32_le(*v),
            Self::Bool(v) => buf.put_u8(*v as u8),
            Self::Blob(b) => {
                buf.put_u32_le(b.len() as u32);
                buf.put_slice(b);
            }
            Self::Uint16(v) => buf.put_u16_le(*v),
            Self::Uint8(v) => buf.put_u8(*v),
            Self::Bsob(b) => {
                buf.put_u8(b.len() as u8);
                buf.put_slice(b);
            }
            Self::Uint64(v) => buf.put_u64_le(*v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: TagName,
    pub value: TagValue,
}

impl Tag {
    pub fn with_id(id: u8, value: TagValue) -> Self {
        Self { name: TagName::Id(id), value }
    }

    pub fn with_name(name: impl Into<String>, value: TagValue) -> Self {
        Self { name: TagName::Name(name.into()), value }
    }
}

impl Serial for Tag {
    fn bytes_count(&self) -> usize {
        let name = match &self.name {
            TagName::Id(_) => 1,
            TagName::Name(n) => 2 + n.len(),
        };
        1 + name + self.value.bytes_count()
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let tag_type = buf.read_u8()?;

        let (tag_type, name) = if tag_type & ID_FLAG != 0 {
            (tag_type & !ID_FLAG, TagName::Id(buf.read_u8()?))
        } else {
            (tag_type, TagName::Name(buf.read_string()?))
        };

        let value = TagValue::decode(tag_type, buf)?;
        Ok(Self { name, value })
    }

    fn encode(&self, buf: &mut impl BufMut) {
        let tag_type = self.value.tag_type();
        match &self.name {
            TagName::Id(id) => {
                buf.put_u8(tag_type | ID_FLAG);
                buf.put_u8(*id);
            }
            TagName::Name(name) => {
                buf.put_u8(tag_type);
                put_string(buf, name);
            }
        }
        self.value.encode(buf);
    }

    fn check(&self) -> Result<(), Error> {
        if let TagName::Name(name) = &self.name {
            check_len("tag name", name.len(), u16::MAX as usize)?;
        }
        self.value.check()
    }
}

/// `<count 4>(<tag>)[count]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagList(pub Vec<Tag>);

impl TagList {
    pub fn get(&self, id: u8) -> Option<&TagValue> {
        self.0.iter().find(|t| t.name == TagName::Id(id)).map(|t| &t.value)
    }

    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }
}

impl Serial for TagList {
    fn bytes_count(&self) -> usize {
        4 + self.0.iter().map(Tag::bytes_count).sum::<usize>()
    }

    fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let count = buf.read_u32()? as usize;
        // every tag takes at least 3 bytes, don't trust the count blindly
        let mut tags = Vec::with_capacity(count.min(buf.len() / 3));
        for _ in 0..count {
            tags.push(Tag::decode(buf)?);
        }
        Ok(Self(tags))
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.0.len() as u32);
        for tag in &self.0 {
            tag.encode(buf);
        }
    }

    fn check(&self) -> Result<(), Error> {
        self.0.iter().try_for_each(Tag::check)
    }
}

impl FromIterator<Tag> for TagList {
    fn from_iter<T: IntoIterator<Item = Tag>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
