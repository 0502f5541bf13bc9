//! The eDonkey2000 TCP wire protocol.
//!
//! Every message on a connection, be it with a server or with another
//! client, is framed the same way:
//!
//! `<protocol u8><length u32 LE><type u8><payload length - 1>`
//!
//! The `length` counts the type byte too. The meaning of the type byte
//! depends on the protocol byte and on who is on the other side of the
//! connection, so messages are identified by a [`PacketKey`] and resolved
//! by a [`Registry`].
pub mod client;
pub mod combiner;
pub mod header;
pub mod packet;
pub mod registry;
pub mod serial;
pub mod server;
pub mod tag;

pub use client::*;
pub use combiner::*;
pub use header::*;
pub use packet::*;
pub use registry::*;
pub use serial::*;
pub use server::*;
pub use tag::*;

/// Largest declared length we accept from a peer. Anything above this is
/// considered garbage on the stream.
pub const MAX_PACKET_SIZE: u32 = 2 * 1024 * 1024;

/// The first byte of every packet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolType {
    /// Standard protocol, used both with servers and with clients.
    EDonkey = 0xE3,
    /// zlib compressed payload.
    Packed = 0xD4,
    /// eMule extended protocol, clients only.
    EMule = 0xC5,
}

impl TryFrom<u8> for ProtocolType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xE3 => Ok(Self::EDonkey),
            0xD4 => Ok(Self::Packed),
            0xC5 => Ok(Self::EMule),
            v => Err(v),
        }
    }
}

/// Identifies a message: the protocol byte plus the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketKey {
    pub protocol: u8,
    pub packet_type: u8,
}

impl PacketKey {
    pub const fn new(protocol: ProtocolType, packet_type: u8) -> Self {
        Self { protocol: protocol as u8, packet_type }
    }
}

/// Client <-> server opcodes, protocol [`ProtocolType::EDonkey`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientServerTcp {
    /// <HASH 16><ID 4><PORT 2><1 Tag_set>
    LoginRequest = 0x01,
    Reject = 0x05,
    GetServerList = 0x14,
    /// <count 4>(<HASH 16><ID 4><PORT 2><1 Tag_set>)[count]
    OfferFiles = 0x15,
    /// <Query_Tree>
    SearchRequest = 0x16,
    Disconnect = 0x18,
    /// <HASH 16><SIZE 4> or <HASH 16><0 4><SIZE 8>
    GetSources = 0x19,
    SearchUser = 0x1A,
    /// <ID 4>
    CallbackRequest = 0x1C,
    QueryMoreResult = 0x21,
    GetSourcesObfu = 0x23,
    /// <count 1>(<IP 4><PORT 2>)[count]
    ServerList = 0x32,
    SearchResult = 0x33,
    /// <USER 4><FILES 4>
    ServerStatus = 0x34,
    /// <IP 4><PORT 2>
    CallbackRequested = 0x35,
    CallbackFail = 0x36,
    /// <len 2><Message len>
    ServerMessage = 0x38,
    /// <NEW_ID 4>[<FLAGS 4>[<AUX_PORT 4>]]
    IdChange = 0x40,
    /// <HASH 16><IP 4><PORT 2><1 Tag_set>
    ServerIdent = 0x41,
    /// <HASH 16><count 1>(<ID 4><PORT 2>)[count]
    FoundSources = 0x42,
    UsersList = 0x43,
    FoundSourcesObfu = 0x44,
}

/// Client <-> client opcodes, protocol [`ProtocolType::EDonkey`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardClientTcp {
    /// <hash len 1><HASH 16><ID 4><PORT 2><1 Tag_set><SERVER_IP 4><SERVER_PORT 2>
    Hello = 0x01,
    /// <HASH 16><begin 4><end 4><Data len:(end-begin)>
    SendingPart = 0x46,
    /// <HASH 16><begin[3] 4*3><end[3] 4*3>
    RequestParts = 0x47,
    /// <HASH 16>
    FileReqAnsNoFile = 0x48,
    /// <HASH 16>
    EndOfDownload = 0x49,
    AskSharedFiles = 0x4A,
    AskSharedFilesAnswer = 0x4B,
    /// <HASH 16><ID 4><PORT 2><1 Tag_set><SERVER_IP 4><SERVER_PORT 2>
    HelloAnswer = 0x4C,
    ChangeClientId = 0x4D,
    Message = 0x4E,
    /// <HASH 16>
    SetReqFileId = 0x4F,
    /// <HASH 16><count 2><status(bit array) len:((count+7)/8)>
    FileStatus = 0x50,
    /// <HASH 16>
    HashSetRequest = 0x51,
    /// <HASH 16><count 2><HASH[count] 16*count>
    HashSetAnswer = 0x52,
    /// <HASH 16>
    StartUploadReq = 0x54,
    AcceptUploadReq = 0x55,
    CancelTransfer = 0x56,
    OutOfPartReqs = 0x57,
    /// <HASH 16>
    RequestFilename = 0x58,
    /// <HASH 16><len 2><NAME len>
    ReqFilenameAnswer = 0x59,
    ChangeSlot = 0x5B,
    QueueRank = 0x5C,
    AskSharedDirs = 0x5D,
    AskSharedFilesDir = 0x5E,
    AskSharedDirsAns = 0x5F,
    AskSharedFilesDirAns = 0x60,
    AskSharedDeniedAns = 0x61,
}

/// Client <-> client opcodes, protocol [`ProtocolType::EMule`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedClientTcp {
    EmuleInfo = 0x01,
    EmuleInfoAnswer = 0x02,
    CompressedPart = 0x40,
    /// <RANK 2><padding 10>
    QueueRanking = 0x60,
    FileDesc = 0x61,
    RequestSources = 0x81,
    AnswerSources = 0x82,
    RequestSources2 = 0x83,
    AnswerSources2 = 0x84,
    PublicKey = 0x85,
    Signature = 0x86,
    SecIdentState = 0x87,
    RequestPreview = 0x90,
    PreviewAnswer = 0x91,
    MultiPacket = 0x92,
    MultiPacketAnswer = 0x93,
    PublicIpReq = 0x97,
    PublicIpAnswer = 0x98,
    Callback = 0x99,
    ReaskCallbackTcp = 0x9A,
    AichRequest = 0x9B,
    AichAnswer = 0x9C,
    AichFileHashAns = 0x9D,
    AichFileHashReq = 0x9E,
    BuddyPing = 0x9F,
    BuddyPong = 0xA0,
    CompressedPartI64 = 0xA1,
    /// <HASH 16><begin 8><end 8><Data len:(end-begin)>
    SendingPartI64 = 0xA2,
    /// <HASH 16><begin[3] 8*3><end[3] 8*3>
    RequestPartsI64 = 0xA3,
    MultiPacketExt = 0xA4,
    ChatCaptchaReq = 0xA5,
    ChatCaptchaRes = 0xA6,
}
