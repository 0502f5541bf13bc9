//! Turns a byte stream into packets and packets into bytes.
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use super::{
    header::{PacketHeader, HEADER_SIZE},
    packet::{BytesSkipper, Packet},
    registry::Registry,
    PacketKey, MAX_PACKET_SIZE,
};
use crate::error::Error;

/// Codec of one connection.
///
/// The combiner is either waiting for a header or, once a header was
/// parsed, waiting for the whole payload it announced. Partial reads never
/// consume bytes of an incomplete packet.
#[derive(Debug, Clone)]
pub struct PacketCombiner {
    registry: &'static Registry,
    /// Defined while waiting for the payload.
    header: PacketHeader,
}

impl PacketCombiner {
    pub fn new(registry: &'static Registry) -> Self {
        Self { registry, header: PacketHeader::default() }
    }

    /// Combiner for a connection with a server.
    pub fn server() -> Self {
        Self::new(Registry::server())
    }

    /// Combiner for a connection with another client.
    pub fn client() -> Self {
        Self::new(Registry::client())
    }

    pub fn registry(&self) -> &'static Registry {
        self.registry
    }

    /// A header was read and its payload is still incomplete.
    pub fn is_awaiting_body(&self) -> bool {
        self.header.is_defined()
    }

    /// Write `packet` with its header into `buf`.
    ///
    /// Returns `Ok(false)` and writes nothing when `buf` can't hold the
    /// whole packet. A packet the other side would refuse, too large or with
    /// a field its length prefix can't count, is an error.
    pub fn pack(&self, packet: &Packet, buf: &mut impl BufMut) -> Result<bool, Error> {
        let kind = packet.kind();
        let key = self.registry.key_of(kind).ok_or(Error::UnregisteredPacket(kind))?;
        let size = packet.bytes_count();

        // the declared length counts the type byte
        if size >= MAX_PACKET_SIZE as usize {
            return Err(Error::PacketTooLarge(size));
        }
        packet.check()?;

        if buf.remaining_mut() < HEADER_SIZE + size {
            return Ok(false);
        }

        PacketHeader::new(key, size).encode(buf)?;
        packet.encode(buf);
        trace!("> {kind:?} size: {size}");

        Ok(true)
    }

    fn unpack(&self, key: PacketKey, mut payload: Bytes) -> Result<Packet, Error> {
        let len = payload.len();

        let Some((kind, decode)) = self.registry.decoder(&key) else {
            debug!(
                "skipping unknown packet protocol: {:#04x} type: {:#04x} len: {len}",
                key.protocol, key.packet_type
            );
            return Ok(Packet::Skipped(BytesSkipper { key, len }));
        };

        let packet = decode(&mut payload, len).map_err(|e| match e {
            Error::UnexpectedEof | Error::UnsupportedTag(_) => Error::Malformed(key),
            e => e,
        })?;

        if !payload.is_empty() {
            trace!("{kind:?} left {} bytes unread", payload.len());
        }
        trace!("< {kind:?} len: {len}");

        Ok(packet)
    }
}

impl Encoder<Packet> for PacketCombiner {
    type Error = Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Error> {
        dst.reserve(HEADER_SIZE + item.bytes_count().min(MAX_PACKET_SIZE as usize));
        self.pack(&item, dst)?;
        Ok(())
    }
}

impl Decoder for PacketCombiner {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !self.header.is_defined() {
            let Some(header) = PacketHeader::decode(buf)? else {
                return Ok(None);
            };
            self.header = header;
        }

        let len = self.header.payload_len()?;

        // incomplete payload, keep the header and wait for more bytes
        if buf.len() < len {
            buf.reserve(len - buf.len());
            return Ok(None);
        }

        let key = self.header.key()?;
        self.header.reset();

        let payload = buf.split_to(len).freeze();
        self.unpack(key, payload).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use bitvec::{bitvec, order::Lsb0};
    use futures::{SinkExt, StreamExt};
    use hashbrown::HashSet;
    use tokio_util::codec::Framed;

    use super::*;
    use crate::{
        hash::Hash,
        wire::{
            client::{
                ExtHello, FileAnswer, FileStatus, HashSetAnswer, Hello, PeerInfo,
                QueueRanking, RequestParts, SendingPart,
            },
            server::{
                CallbackRequest, CallbackRequested, FoundFileSources, GetFileSources,
                IdChange, LoginRequest, ServerIdent, ServerList, ServerMessage,
                ServerStatus,
            },
            packet::PacketKind,
            serial::Endpoint,
            tag::{Tag, TagList, TagValue, CT_NAME, CT_VERSION},
            ProtocolType,
        },
    };

    fn tags() -> TagList {
        [
            Tag::with_id(CT_NAME, TagValue::String("jed2k".into())),
            Tag::with_id(CT_VERSION, TagValue::Uint32(0x3c)),
            Tag::with_name("blob", TagValue::Blob(Bytes::from_static(b"\x01\x02"))),
        ]
        .into_iter()
        .collect()
    }

    fn endpoint(n: u8) -> Endpoint {
        Endpoint { ip: u32::from_le_bytes([127, 0, 0, n]), port: 4660 + n as u16 }
    }

    fn peer() -> PeerInfo {
        PeerInfo { hash: Hash::EMULE, endpoint: endpoint(1), tags: tags(), server: endpoint(2) }
    }

    /// One value of every message a server connection carries.
    fn server_packets() -> Vec<Packet> {
        vec![
            Packet::LoginRequest(LoginRequest {
                hash: Hash::LIBED2K,
                client_id: 0,
                port: 4661,
                tags: tags(),
            }),
            Packet::GetServerList,
            Packet::GetFileSources(GetFileSources { hash: Hash::EMULE, size: 5 << 32 }),
            Packet::CallbackRequest(CallbackRequest { client_id: 42 }),
            Packet::ServerList(ServerList { servers: vec![endpoint(1), endpoint(2)] }),
            Packet::ServerStatus(ServerStatus { users: 10, files: 20 }),
            Packet::CallbackRequested(CallbackRequested { endpoint: endpoint(3) }),
            Packet::CallbackFailed,
            Packet::ServerMessage(ServerMessage { message: "welcome".into() }),
            Packet::IdChange(IdChange {
                client_id: 0x0403_0201,
                tcp_flags: Some(0x19),
                aux_port: Some(4661),
            }),
            Packet::ServerIdent(ServerIdent {
                hash: Hash::TERMINAL,
                endpoint: endpoint(4),
                tags: tags(),
            }),
            Packet::FoundFileSources(FoundFileSources {
                hash: Hash::EMULE,
                sources: vec![endpoint(5), endpoint(6), endpoint(7)],
            }),
        ]
    }

    /// One value of every message a client connection carries.
    fn client_packets() -> Vec<Packet> {
        let hash = Hash::EMULE;
        let data = Bytes::from_static(b"abcd");
        let ext = ExtHello { version: 0x3c, protocol_version: 1, tags: tags() };

        vec![
            Packet::Hello(Hello(peer())),
            Packet::HelloAnswer(peer()),
            Packet::SendingPart(SendingPart { hash, begin: 10, end: 14, data: data.clone() }),
            Packet::RequestParts(RequestParts {
                hash,
                begins: [0, 100, 0],
                ends: [50, 200, 0],
            }),
            Packet::NoFile(hash),
            Packet::EndOfDownload(hash),
            Packet::SetRequestFileId(hash),
            Packet::FileStatus(FileStatus {
                hash,
                parts: bitvec![u8, Lsb0; 1, 0, 1, 1, 0, 0, 0, 0, 1],
            }),
            Packet::HashSetRequest(hash),
            Packet::HashSetAnswer(HashSetAnswer {
                hash,
                parts: vec![Hash::LIBED2K, Hash::TERMINAL],
            }),
            Packet::StartUpload(hash),
            Packet::AcceptUpload,
            Packet::CancelTransfer,
            Packet::OutOfParts,
            Packet::FileRequest(hash),
            Packet::FileAnswer(FileAnswer { hash, name: "file.iso".into() }),
            Packet::ExtHello(ext.clone()),
            Packet::ExtHelloAnswer(ext),
            Packet::QueueRanking(QueueRanking { rank: 7 }),
            Packet::SendingPart64(SendingPart {
                hash,
                begin: 5 << 32,
                end: (5 << 32) + 4,
                data,
            }),
            Packet::RequestParts64(RequestParts {
                hash,
                begins: [5 << 32, 0, 0],
                ends: [(5 << 32) + 100, 0, 0],
            }),
        ]
    }

    fn server_message() -> Vec<u8> {
        vec![0xE3, 8, 0, 0, 0, 0x38, 5, 0, b'h', b'e', b'l', b'l', b'o']
    }

    fn stream() -> Vec<u8> {
        let mut raw = server_message();
        // IdChange with the flags only
        raw.extend_from_slice(&[0xE3, 9, 0, 0, 0, 0x40, 1, 2, 3, 4, 0x19, 0, 0, 0]);
        // ServerStatus
        raw.extend_from_slice(&[0xE3, 9, 0, 0, 0, 0x34, 10, 0, 0, 0, 20, 0, 0, 0]);
        raw
    }

    fn expected() -> Vec<Packet> {
        vec![
            Packet::ServerMessage(ServerMessage { message: "hello".into() }),
            Packet::IdChange(IdChange {
                client_id: 0x0403_0201,
                tcp_flags: Some(0x19),
                aux_port: None,
            }),
            Packet::ServerStatus(ServerStatus { users: 10, files: 20 }),
        ]
    }

    fn decode_all(combiner: &mut PacketCombiner, buf: &mut BytesMut) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Some(packet) = combiner.decode(buf).unwrap() {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn decode_server_message() {
        let mut buf = BytesMut::from(&server_message()[..]);
        let packet = PacketCombiner::server().decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet, Packet::ServerMessage(ServerMessage { message: "hello".into() }));
        assert!(buf.is_empty());
    }

    #[test]
    fn split_at_every_position() {
        let raw = stream();

        for split in 0..=raw.len() {
            let mut combiner = PacketCombiner::server();
            let mut buf = BytesMut::from(&raw[..split]);
            let mut packets = decode_all(&mut combiner, &mut buf);

            buf.extend_from_slice(&raw[split..]);
            packets.extend(decode_all(&mut combiner, &mut buf));

            assert_eq!(packets, expected(), "split at {split}");
            assert!(buf.is_empty());
            assert!(!combiner.is_awaiting_body());
        }
    }

    #[test]
    fn byte_by_byte() {
        let mut combiner = PacketCombiner::server();
        let mut buf = BytesMut::new();
        let mut packets = Vec::new();

        for byte in stream() {
            buf.put_u8(byte);
            packets.extend(decode_all(&mut combiner, &mut buf));
        }

        assert_eq!(packets, expected());
    }

    #[test]
    fn unknown_packets_are_skipped() {
        // search result, not registered
        let mut raw = vec![0xE3, 4, 0, 0, 0, 0x33, 0xAA, 0xBB, 0xCC];
        // packed payloads are not inflated
        raw.extend_from_slice(&[0xD4, 3, 0, 0, 0, 0x01, 0x78, 0x9C]);
        raw.extend(server_message());

        let mut combiner = PacketCombiner::server();
        let mut buf = BytesMut::from(&raw[..]);
        let packets = decode_all(&mut combiner, &mut buf);

        assert_eq!(
            packets[0],
            Packet::Skipped(BytesSkipper {
                key: PacketKey::new(ProtocolType::EDonkey, 0x33),
                len: 3
            })
        );
        assert_eq!(
            packets[1],
            Packet::Skipped(BytesSkipper {
                key: PacketKey::new(ProtocolType::Packed, 0x01),
                len: 2
            })
        );
        assert_eq!(packets[2], expected()[0]);
    }

    #[test]
    fn malformed_payload_keeps_framing() {
        // ServerStatus declaring only 4 bytes of payload
        let mut raw = vec![0xE3, 5, 0, 0, 0, 0x34, 1, 0, 0, 0];
        raw.extend(server_message());

        let mut combiner = PacketCombiner::server();
        let mut buf = BytesMut::from(&raw[..]);
        let key = PacketKey::new(ProtocolType::EDonkey, 0x34);
        assert!(matches!(combiner.decode(&mut buf), Err(Error::Malformed(k)) if k == key));

        let packet = combiner.decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet, expected()[0]);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        // ServerStatus with 2 extra bytes
        let mut raw = vec![0xE3, 11, 0, 0, 0, 0x34, 1, 0, 0, 0, 2, 0, 0, 0, 0xFF, 0xFF];
        raw.extend(server_message());

        let mut combiner = PacketCombiner::server();
        let mut buf = BytesMut::from(&raw[..]);
        let packets = decode_all(&mut combiner, &mut buf);
        assert_eq!(packets[0], Packet::ServerStatus(ServerStatus { users: 1, files: 2 }));
        assert_eq!(packets[1], expected()[0]);
    }

    #[test]
    fn malformed_header_is_an_error() {
        let mut buf = BytesMut::from(&[0x00, 1, 0, 0, 0, 0x01][..]);
        assert!(matches!(
            PacketCombiner::client().decode(&mut buf),
            Err(Error::MalformedHeader)
        ));
    }

    #[test]
    fn pack_needs_room_for_the_whole_packet() {
        let combiner = PacketCombiner::client();
        let packet = Packet::FileRequest(Hash::EMULE);

        let mut storage = [0u8; 8];
        let mut slice = &mut storage[..];
        assert!(!combiner.pack(&packet, &mut slice).unwrap());
        assert_eq!(slice.len(), 8);
        assert_eq!(storage, [0u8; 8]);

        let mut storage = [0u8; 6 + 16];
        let mut slice = &mut storage[..];
        assert!(combiner.pack(&packet, &mut slice).unwrap());
        assert!(slice.is_empty());
        assert_eq!(&storage[..6], &[0xE3, 17, 0, 0, 0, 0x58]);
        assert_eq!(&storage[6..], &Hash::EMULE.0);
    }

    #[test]
    fn pack_unregistered_packet() {
        let mut buf = BytesMut::new();
        let packet = Packet::GetServerList;
        assert!(matches!(
            PacketCombiner::client().pack(&packet, &mut buf),
            Err(Error::UnregisteredPacket(_))
        ));
        assert!(PacketCombiner::server().pack(&packet, &mut buf).unwrap());
        assert_eq!(&buf[..], &[0xE3, 1, 0, 0, 0, 0x14]);
    }

    #[test]
    fn every_registered_packet_round_trips() {
        for (combiner, packets) in [
            (PacketCombiner::server(), server_packets()),
            (PacketCombiner::client(), client_packets()),
        ] {
            let name = combiner.registry().name();
            let kinds: HashSet<PacketKind> = packets.iter().map(Packet::kind).collect();
            assert_eq!(kinds.len(), combiner.registry().len(), "{name}");

            for packet in packets {
                let mut raw = BytesMut::new();
                assert!(combiner.pack(&packet, &mut raw).unwrap());
                assert_eq!(raw.len(), HEADER_SIZE + packet.bytes_count());

                for split in 0..raw.len() {
                    let mut buf = BytesMut::from(&raw[..split]);
                    let mut combiner = combiner.clone();
                    assert!(combiner.decode(&mut buf).unwrap().is_none(), "{name} {split}");
                }

                let mut combiner = combiner.clone();
                let decoded = combiner.decode(&mut raw).unwrap();
                assert_eq!(decoded, Some(packet), "{name}");
                assert!(raw.is_empty());
            }
        }
    }

    #[test]
    fn pack_refuses_what_the_peer_would_reject() {
        let combiner = PacketCombiner::client();
        let mut buf = BytesMut::new();

        let part = SendingPart::<u64> {
            hash: Hash::EMULE,
            begin: 0,
            end: MAX_PACKET_SIZE as u64,
            data: Bytes::from(vec![0u8; MAX_PACKET_SIZE as usize]),
        };
        assert!(matches!(
            combiner.pack(&Packet::SendingPart64(part), &mut buf),
            Err(Error::PacketTooLarge(_))
        ));

        let answer = FileAnswer { hash: Hash::EMULE, name: "x".repeat(70_000) };
        assert!(matches!(
            combiner.pack(&Packet::FileAnswer(answer), &mut buf),
            Err(Error::FieldTooLong { field: "name", len: 70_000, .. })
        ));

        let message = ServerMessage { message: "x".repeat(70_000) };
        assert!(matches!(
            PacketCombiner::server().pack(&Packet::ServerMessage(message), &mut buf),
            Err(Error::FieldTooLong { field: "message", .. })
        ));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn framed_round_trip() {
        let (a, b) = tokio::io::duplex(64);
        let mut tx = Framed::new(a, PacketCombiner::client());
        let mut rx = Framed::new(b, PacketCombiner::client());

        let part = SendingPart::<u64> {
            hash: Hash::EMULE,
            begin: 0,
            end: 200,
            data: Bytes::from(vec![7u8; 200]),
        };
        let packets = vec![
            Packet::SendingPart64(part),
            Packet::AcceptUpload,
            Packet::HashSetRequest(Hash::LIBED2K),
        ];

        let sent = packets.clone();
        let writer = tokio::spawn(async move {
            for packet in sent {
                tx.send(packet).await.unwrap();
            }
        });

        for packet in packets {
            assert_eq!(rx.next().await.unwrap().unwrap(), packet);
        }
        writer.await.unwrap();
    }
}
