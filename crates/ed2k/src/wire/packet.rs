use bytes::BufMut;

use super::{
    client::{
        ExtHello, FileAnswer, FileStatus, HashSetAnswer, Hello, PeerInfo,
        QueueRanking, RequestParts, SendingPart,
    },
    serial::Serial,
    server::{
        CallbackRequest, CallbackRequested, FoundFileSources, GetFileSources,
        IdChange, LoginRequest, ServerIdent, ServerList, ServerMessage,
        ServerStatus,
    },
    PacketKey,
};
use crate::{error::Error, hash::Hash};

/// A message the combiner did not know how to decode. Its payload has
/// already been consumed from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytesSkipper {
    pub key: PacketKey,
    pub len: usize,
}

/// Every message of the protocol, server and client families.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    LoginRequest(LoginRequest),
    GetServerList,
    GetFileSources(GetFileSources),
    CallbackRequest(CallbackRequest),
    ServerList(ServerList),
    ServerStatus(ServerStatus),
    CallbackRequested(CallbackRequested),
    CallbackFailed,
    ServerMessage(ServerMessage),
    IdChange(IdChange),
    ServerIdent(ServerIdent),
    FoundFileSources(FoundFileSources),

    Hello(Hello),
    HelloAnswer(PeerInfo),
    SendingPart(SendingPart<u32>),
    RequestParts(RequestParts<u32>),
    NoFile(Hash),
    EndOfDownload(Hash),
    SetRequestFileId(Hash),
    FileStatus(FileStatus),
    HashSetRequest(Hash),
    HashSetAnswer(HashSetAnswer),
    StartUpload(Hash),
    AcceptUpload,
    CancelTransfer,
    OutOfParts,
    FileRequest(Hash),
    FileAnswer(FileAnswer),

    ExtHello(ExtHello),
    ExtHelloAnswer(ExtHello),
    QueueRanking(QueueRanking),
    SendingPart64(SendingPart<u64>),
    RequestParts64(RequestParts<u64>),

    Skipped(BytesSkipper),
}

/// The variant of a [`Packet`] without its data, used to find the key
/// to encode a packet with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    LoginRequest,
    GetServerList,
    GetFileSources,
    CallbackRequest,
    ServerList,
    ServerStatus,
    CallbackRequested,
    CallbackFailed,
    ServerMessage,
    IdChange,
    ServerIdent,
    FoundFileSources,
    Hello,
    HelloAnswer,
    SendingPart,
    RequestParts,
    NoFile,
    EndOfDownload,
    SetRequestFileId,
    FileStatus,
    HashSetRequest,
    HashSetAnswer,
    StartUpload,
    AcceptUpload,
    CancelTransfer,
    OutOfParts,
    FileRequest,
    FileAnswer,
    ExtHello,
    ExtHelloAnswer,
    QueueRanking,
    SendingPart64,
    RequestParts64,
    Skipped,
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::LoginRequest(_) => PacketKind::LoginRequest,
            Self::GetServerList => PacketKind::GetServerList,
            Self::GetFileSources(_) => PacketKind::GetFileSources,
            Self::CallbackRequest(_) => PacketKind::CallbackRequest,
            Self::ServerList(_) => PacketKind::ServerList,
            Self::ServerStatus(_) => PacketKind::ServerStatus,
            Self::CallbackRequested(_) => PacketKind::CallbackRequested,
            Self::CallbackFailed => PacketKind::CallbackFailed,
            Self::ServerMessage(_) => PacketKind::ServerMessage,
            Self::IdChange(_) => PacketKind::IdChange,
            Self::ServerIdent(_) => PacketKind::ServerIdent,
            Self::FoundFileSources(_) => PacketKind::FoundFileSources,
            Self::Hello(_) => PacketKind::Hello,
            Self::HelloAnswer(_) => PacketKind::HelloAnswer,
            Self::SendingPart(_) => PacketKind::SendingPart,
            Self::RequestParts(_) => PacketKind::RequestParts,
            Self::NoFile(_) => PacketKind::NoFile,
            Self::EndOfDownload(_) => PacketKind::EndOfDownload,
            Self::SetRequestFileId(_) => PacketKind::SetRequestFileId,
            Self::FileStatus(_) => PacketKind::FileStatus,
            Self::HashSetRequest(_) => PacketKind::HashSetRequest,
            Self::HashSetAnswer(_) => PacketKind::HashSetAnswer,
            Self::StartUpload(_) => PacketKind::StartUpload,
            Self::AcceptUpload => PacketKind::AcceptUpload,
            Self::CancelTransfer => PacketKind::CancelTransfer,
            Self::OutOfParts => PacketKind::OutOfParts,
            Self::FileRequest(_) => PacketKind::FileRequest,
            Self::FileAnswer(_) => PacketKind::FileAnswer,
            Self::ExtHello(_) => PacketKind::ExtHello,
            Self::ExtHelloAnswer(_) => PacketKind::ExtHelloAnswer,
            Self::QueueRanking(_) => PacketKind::QueueRanking,
            Self::SendingPart64(_) => PacketKind::SendingPart64,
            Self::RequestParts64(_) => PacketKind::RequestParts64,
            Self::Skipped(_) => PacketKind::Skipped,
        }
    }

    /// Size of the payload, header excluded.
    pub fn bytes_count(&self) -> usize {
        match self {
            Self::LoginRequest(p) => p.bytes_count(),
            Self::GetFileSources(p) => p.bytes_count(),
            Self::CallbackRequest(p) => p.bytes_count(),
            Self::ServerList(p) => p.bytes_count(),
            Self::ServerStatus(p) => p.bytes_count(),
            Self::CallbackRequested(p) => p.bytes_count(),
            Self::ServerMessage(p) => p.bytes_count(),
            Self::IdChange(p) => p.bytes_count(),
            Self::ServerIdent(p) => p.bytes_count(),
            Self::FoundFileSources(p) => p.bytes_count(),
            Self::Hello(p) => p.bytes_count(),
            Self::HelloAnswer(p) => p.bytes_count(),
            Self::SendingPart(p) => p.bytes_count(),
            Self::RequestParts(p) => p.bytes_count(),
            Self::NoFile(h)
            | Self::EndOfDownload(h)
            | Self::SetRequestFileId(h)
            | Self::HashSetRequest(h)
            | Self::StartUpload(h)
            | Self::FileRequest(h) => Serial::bytes_count(h),
            Self::FileStatus(p) => p.bytes_count(),
            Self::HashSetAnswer(p) => p.bytes_count(),
            Self::FileAnswer(p) => p.bytes_count(),
            Self::ExtHello(p) | Self::ExtHelloAnswer(p) => p.bytes_count(),
            Self::QueueRanking(p) => p.bytes_count(),
            Self::SendingPart64(p) => p.bytes_count(),
            Self::RequestParts64(p) => p.bytes_count(),
            Self::Skipped(s) => s.len,
            Self::GetServerList
            | Self::CallbackFailed
            | Self::AcceptUpload
            | Self::CancelTransfer
            | Self::OutOfParts => 0,
        }
    }

    /// Length prefixes of the payload hold their fields, see [`Serial::check`].
    pub fn check(&self) -> Result<(), Error> {
        match self {
            Self::LoginRequest(p) => p.check(),
            Self::ServerList(p) => p.check(),
            Self::ServerMessage(p) => p.check(),
            Self::ServerIdent(p) => p.check(),
            Self::FoundFileSources(p) => p.check(),
            Self::Hello(p) => p.check(),
            Self::HelloAnswer(p) => p.check(),
            Self::FileStatus(p) => p.check(),
            Self::HashSetAnswer(p) => p.check(),
            Self::FileAnswer(p) => p.check(),
            Self::ExtHello(p) | Self::ExtHelloAnswer(p) => p.check(),
            _ => Ok(()),
        }
    }

    /// Write the payload. A skipped packet has nothing left to write.
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::LoginRequest(p) => p.encode(buf),
            Self::GetFileSources(p) => p.encode(buf),
            Self::CallbackRequest(p) => p.encode(buf),
            Self::ServerList(p) => p.encode(buf),
            Self::ServerStatus(p) => p.encode(buf),
            Self::CallbackRequested(p) => p.encode(buf),
            Self::ServerMessage(p) => p.encode(buf),
            Self::IdChange(p) => p.encode(buf),
            Self::ServerIdent(p) => p.encode(buf),
            Self::FoundFileSources(p) => p.encode(buf),
            Self::Hello(p) => p.encode(buf),
            Self::HelloAnswer(p) => p.encode(buf),
            Self::SendingPart(p) => p.encode(buf),
            Self::RequestParts(p) => p.encode(buf),
            Self::NoFile(h)
            | Self::EndOfDownload(h)
            | Self::SetRequestFileId(h)
            | Self::HashSetRequest(h)
            | Self::StartUpload(h)
            | Self::FileRequest(h) => h.encode(buf),
            Self::FileStatus(p) => p.encode(buf),
            Self::HashSetAnswer(p) => p.encode(buf),
            Self::FileAnswer(p) => p.encode(buf),
            Self::ExtHello(p) | Self::ExtHelloAnswer(p) => p.encode(buf),
            Self::QueueRanking(p) => p.encode(buf),
            Self::SendingPart64(p) => p.encode(buf),
            Self::RequestParts64(p) => p.encode(buf),
            Self::Skipped(_)
            | Self::GetServerList
            | Self::CallbackFailed
            | Self::AcceptUpload
            | Self::CancelTransfer
            | Self::OutOfParts => {}
        }
    }
}
