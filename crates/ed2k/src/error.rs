use std::io;

use bytes::BytesMut;
use thiserror::Error;

use crate::wire::{PacketKey, PacketKind};

/// Category of a failed read or write against the backing file of a
/// transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskFault {
    /// The read or write itself failed.
    Io,
    /// The file was opened without write access, or the OS refused it.
    NonWritable,
    /// Anything else that surfaced while doing I/O.
    Unclassified,
}

impl DiskFault {
    pub fn classify(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => Self::NonWritable,
            io::ErrorKind::Other => Self::Unclassified,
            _ => Self::Io,
        }
    }
}

impl std::fmt::Display for DiskFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Io => "i/o error",
            Self::NonWritable => "non writable file",
            Self::Unclassified => "unclassified error",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error")]
    IO(#[from] io::Error),

    /// A disk operation failed. The buffers that were handed to the
    /// operation travel back with the error, they must be returned to the
    /// pool by the caller.
    #[error("Disk operation failed: {fault}")]
    Disk { fault: DiskFault, buffers: Vec<BytesMut> },

    #[error("Tried to read the fields of a packet header before it was parsed")]
    HeaderUndefined,

    #[error("The packet header is malformed")]
    MalformedHeader,

    #[error("The payload of packet {0:?} is malformed")]
    Malformed(PacketKey),

    #[error("Unexpected end of payload while decoding")]
    UnexpectedEof,

    #[error("Field `{field}` holds {len} items but its prefix counts up to {max}")]
    FieldTooLong { field: &'static str, len: usize, max: usize },

    #[error("A payload of {0} bytes is over the packet size limit")]
    PacketTooLarge(usize),

    #[error("Packet {0:?} is not registered in this combiner")]
    UnregisteredPacket(PacketKind),

    #[error("Tag type `{0:#04x}` is not supported")]
    UnsupportedTag(u8),

    #[error("A hash must have exactly 16 bytes")]
    HashLength,

    #[error("Invalid hex string: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("The piece {0} is not being downloaded")]
    PieceInactive(u32),

    /// The buffer handed with the block travels back with the error.
    #[error("The block {block} is outside of the file")]
    BlockOutOfRange { block: crate::disk::PieceBlock, buffers: Vec<BytesMut> },

    #[error(
        "Could not open the file `{0}`. Please make sure the program has \
         permission to access it"
    )]
    FileOpenError(String),

    #[error(
        "Could not open the folder `{0}`. Please make sure the program has \
         permission to open it and that the folder exist"
    )]
    FolderOpenError(String),

    #[error(
        "Tried to load $HOME but could not find it. Please make sure you have \
         a $HOME env and that this program has the permission to create dirs."
    )]
    HomeInvalid,

    #[error(
        "Error while trying to read the configuration file, please make sure \
         it has the correct format"
    )]
    ConfigDeserializeError(#[from] toml::de::Error),

    #[error("Error while trying to write the configuration file")]
    ConfigSerializeError(#[from] toml::ser::Error),
}

impl Error {
    /// Take back the buffers carried by a failed disk operation, if any.
    pub fn into_buffers(self) -> Vec<BytesMut> {
        match self {
            Self::Disk { buffers, .. } | Self::BlockOutOfRange { buffers, .. } => buffers,
            _ => Vec::new(),
        }
    }

    pub fn fault(&self) -> Option<DiskFault> {
        match self {
            Self::Disk { fault, .. } => Some(*fault),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_io_errors() {
        let e = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(DiskFault::classify(&e), DiskFault::NonWritable);

        let e = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(DiskFault::classify(&e), DiskFault::Unclassified);

        let e = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert_eq!(DiskFault::classify(&e), DiskFault::Io);
    }

    #[test]
    fn disk_error_gives_buffers_back() {
        let e = Error::Disk {
            fault: DiskFault::Io,
            buffers: vec![BytesMut::from(&b"abc"[..])],
        };
        assert_eq!(e.fault(), Some(DiskFault::Io));
        assert_eq!(e.into_buffers().len(), 1);
        assert!(Error::HeaderUndefined.into_buffers().is_empty());
    }
}
