//! Which message a [`PacketKey`] means, and the other way around.
//!
//! A connection with a server and a connection with a client don't speak
//! the same language: `0xE3 0x01` is a login request for the former and a
//! hello for the latter. Each kind of connection gets its own [`Registry`].
use std::{collections::BTreeMap, sync::LazyLock};

use bytes::Bytes;
use hashbrown::HashMap;

use super::{
    packet::{Packet, PacketKind},
    serial::{Serial, SoftSerial},
    ClientServerTcp as Cs, ExtendedClientTcp as Ext, PacketKey, ProtocolType,
    StandardClientTcp as Std,
};
use crate::error::Error;

/// Decode a payload already cut to its declared size. The size is passed
/// along for messages whose layout depends on it.
pub type DecodeFn = fn(&mut Bytes, usize) -> Result<Packet, Error>;

macro_rules! serial {
    ($variant:ident) => {
        |buf, _| Ok(Packet::$variant(Serial::decode(buf)?))
    };
}

macro_rules! soft {
    ($variant:ident) => {
        |buf, size| Ok(Packet::$variant(SoftSerial::decode_limited(buf, size)?))
    };
}

static SERVER: LazyLock<Registry> = LazyLock::new(|| {
    let key = |t: Cs| PacketKey::new(ProtocolType::EDonkey, t as u8);

    let mut r = Registry::new("server");
    r.register(key(Cs::LoginRequest), PacketKind::LoginRequest, serial!(LoginRequest));
    r.register(key(Cs::GetServerList), PacketKind::GetServerList, |_, _| {
        Ok(Packet::GetServerList)
    });
    r.register(key(Cs::GetSources), PacketKind::GetFileSources, soft!(GetFileSources));
    r.register(key(Cs::CallbackRequest), PacketKind::CallbackRequest, serial!(CallbackRequest));
    r.register(key(Cs::ServerList), PacketKind::ServerList, serial!(ServerList));
    r.register(key(Cs::ServerStatus), PacketKind::ServerStatus, serial!(ServerStatus));
    r.register(
        key(Cs::CallbackRequested),
        PacketKind::CallbackRequested,
        serial!(CallbackRequested),
    );
    r.register(key(Cs::CallbackFail), PacketKind::CallbackFailed, |_, _| {
        Ok(Packet::CallbackFailed)
    });
    r.register(key(Cs::ServerMessage), PacketKind::ServerMessage, serial!(ServerMessage));
    r.register(key(Cs::IdChange), PacketKind::IdChange, soft!(IdChange));
    r.register(key(Cs::ServerIdent), PacketKind::ServerIdent, serial!(ServerIdent));
    r.register(key(Cs::FoundSources), PacketKind::FoundFileSources, serial!(FoundFileSources));
    r
});

static CLIENT: LazyLock<Registry> = LazyLock::new(|| {
    let peer = |t: Std| PacketKey::new(ProtocolType::EDonkey, t as u8);
    let emule = |t: Ext| PacketKey::new(ProtocolType::EMule, t as u8);

    let mut r = Registry::new("client");
    r.register(peer(Std::Hello), PacketKind::Hello, serial!(Hello));
    r.register(peer(Std::SendingPart), PacketKind::SendingPart, serial!(SendingPart));
    r.register(peer(Std::RequestParts), PacketKind::RequestParts, serial!(RequestParts));
    r.register(peer(Std::FileReqAnsNoFile), PacketKind::NoFile, serial!(NoFile));
    r.register(peer(Std::EndOfDownload), PacketKind::EndOfDownload, serial!(EndOfDownload));
    r.register(peer(Std::HelloAnswer), PacketKind::HelloAnswer, serial!(HelloAnswer));
    r.register(peer(Std::SetReqFileId), PacketKind::SetRequestFileId, serial!(SetRequestFileId));
    r.register(peer(Std::FileStatus), PacketKind::FileStatus, serial!(FileStatus));
    r.register(peer(Std::HashSetRequest), PacketKind::HashSetRequest, serial!(HashSetRequest));
    r.register(peer(Std::HashSetAnswer), PacketKind::HashSetAnswer, serial!(HashSetAnswer));
    r.register(peer(Std::StartUploadReq), PacketKind::StartUpload, serial!(StartUpload));
    r.register(peer(Std::AcceptUploadReq), PacketKind::AcceptUpload, |_, _| {
        Ok(Packet::AcceptUpload)
    });
    r.register(peer(Std::CancelTransfer), PacketKind::CancelTransfer, |_, _| {
        Ok(Packet::CancelTransfer)
    });
    r.register(peer(Std::OutOfPartReqs), PacketKind::OutOfParts, |_, _| {
        Ok(Packet::OutOfParts)
    });
    r.register(peer(Std::RequestFilename), PacketKind::FileRequest, serial!(FileRequest));
    r.register(peer(Std::ReqFilenameAnswer), PacketKind::FileAnswer, serial!(FileAnswer));

    r.register(emule(Ext::EmuleInfo), PacketKind::ExtHello, serial!(ExtHello));
    r.register(emule(Ext::EmuleInfoAnswer), PacketKind::ExtHelloAnswer, serial!(ExtHelloAnswer));
    r.register(emule(Ext::QueueRanking), PacketKind::QueueRanking, soft!(QueueRanking));
    r.register(emule(Ext::SendingPartI64), PacketKind::SendingPart64, serial!(SendingPart64));
    r.register(emule(Ext::RequestPartsI64), PacketKind::RequestParts64, serial!(RequestParts64));
    r
});

/// Immutable once built, shared by every connection of the same kind.
pub struct Registry {
    name: &'static str,
    decoders: BTreeMap<PacketKey, (PacketKind, DecodeFn)>,
    keys: HashMap<PacketKind, PacketKey>,
}

impl Registry {
    /// Messages of a client to server connection.
    pub fn server() -> &'static Registry {
        &SERVER
    }

    /// Messages of a client to client connection.
    pub fn client() -> &'static Registry {
        &CLIENT
    }

    fn new(name: &'static str) -> Self {
        Self { name, decoders: BTreeMap::new(), keys: HashMap::new() }
    }

    /// # Panics
    ///
    /// When `key` or `kind` is already registered.
    fn register(&mut self, key: PacketKey, kind: PacketKind, decode: DecodeFn) {
        if self.decoders.insert(key, (kind, decode)).is_some() {
            panic!("{} registry: key {key:?} registered twice", self.name);
        }
        if self.keys.insert(kind, key).is_some() {
            panic!("{} registry: {kind:?} registered twice", self.name);
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn decoder(&self, key: &PacketKey) -> Option<(PacketKind, DecodeFn)> {
        self.decoders.get(key).copied()
    }

    pub fn key_of(&self, kind: PacketKind) -> Option<PacketKey> {
        self.keys.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("keys", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registries_are_complete() {
        assert_eq!(Registry::server().len(), 12);
        assert_eq!(Registry::client().len(), 21);
    }

    #[test]
    fn same_key_different_meaning() {
        let key = PacketKey::new(ProtocolType::EDonkey, 0x01);
        let (kind, _) = Registry::server().decoder(&key).unwrap();
        assert_eq!(kind, PacketKind::LoginRequest);
        let (kind, _) = Registry::client().decoder(&key).unwrap();
        assert_eq!(kind, PacketKind::Hello);

        let ext = PacketKey::new(ProtocolType::EMule, 0x01);
        let (kind, _) = Registry::client().decoder(&ext).unwrap();
        assert_eq!(kind, PacketKind::ExtHello);
    }

    #[test]
    fn keys_of_kinds() {
        assert_eq!(
            Registry::client().key_of(PacketKind::SendingPart64),
            Some(PacketKey::new(ProtocolType::EMule, 0xA2))
        );
        assert_eq!(Registry::client().key_of(PacketKind::LoginRequest), None);
        assert_eq!(Registry::server().key_of(PacketKind::Skipped), None);
    }

    #[test]
    fn search_is_not_registered() {
        for t in [Cs::SearchRequest, Cs::QueryMoreResult, Cs::SearchResult] {
            let key = PacketKey::new(ProtocolType::EDonkey, t as u8);
            assert!(Registry::server().decoder(&key).is_none());
        }
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_key_panics() {
        let key = PacketKey::new(ProtocolType::EDonkey, 0x55);
        let mut r = Registry::new("test");
        r.register(key, PacketKind::AcceptUpload, |_, _| Ok(Packet::AcceptUpload));
        r.register(key, PacketKind::CancelTransfer, |_, _| Ok(Packet::CancelTransfer));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_kind_panics() {
        let mut r = Registry::new("test");
        r.register(
            PacketKey::new(ProtocolType::EDonkey, 0x55),
            PacketKind::AcceptUpload,
            |_, _| Ok(Packet::AcceptUpload),
        );
        r.register(
            PacketKey::new(ProtocolType::EMule, 0x55),
            PacketKind::AcceptUpload,
            |_, _| Ok(Packet::AcceptUpload),
        );
    }
}
