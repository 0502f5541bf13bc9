//! One task per connected peer.
use std::net::SocketAddr;

use ed2k::{
    config::Config,
    error::Error,
    wire::{
        Endpoint, Hello, Packet, PacketCombiner, PeerInfo, Tag, TagList, TagValue,
        CT_EMULE_VERSION, CT_MOD_VERSION, CT_NAME, CT_VERSION,
    },
};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, time::timeout};
use tokio_util::codec::Framed;
use tracing::{debug, info};

/// What we tell peers about ourselves.
pub fn peer_info(config: &Config, local: SocketAddr) -> PeerInfo {
    let ip = match local {
        SocketAddr::V4(addr) => Endpoint::from(addr).ip,
        SocketAddr::V6(_) => 0,
    };

    let emule_version =
        (config.mod_major << 17) | (config.mod_minor << 10) | (config.mod_build << 7);

    let tags: TagList = [
        Tag::with_id(CT_NAME, TagValue::String(config.client_name.clone())),
        Tag::with_id(CT_VERSION, TagValue::Uint32(config.version)),
        Tag::with_id(CT_MOD_VERSION, TagValue::String(config.mod_name.clone())),
        Tag::with_id(CT_EMULE_VERSION, TagValue::Uint32(emule_version)),
    ]
    .into_iter()
    .collect();

    PeerInfo {
        hash: config.user_agent,
        endpoint: Endpoint { ip, port: config.listen_port },
        tags,
        server: Endpoint::default(),
    }
}

/// Read packets until the peer goes away or stays silent for longer than
/// the peer connection timeout.
#[tracing::instrument(skip(socket, config))]
pub async fn handle(socket: TcpStream, addr: SocketAddr, config: &Config) -> Result<(), Error> {
    let me = peer_info(config, socket.local_addr()?);
    let mut framed = Framed::new(socket, PacketCombiner::client());
    let idle = config.peer_connection_timeout();

    loop {
        let packet = match timeout(idle, framed.next()).await {
            Err(_) => {
                debug!("idle for {idle:?}, closing");
                return Ok(());
            }
            Ok(None) => {
                debug!("disconnected");
                return Ok(());
            }
            Ok(Some(packet)) => packet?,
        };

        match packet {
            Packet::Hello(Hello(peer)) => {
                info!("< hello {} port {}", peer.hash, peer.endpoint.port);
                framed.send(Packet::HelloAnswer(me.clone())).await?;
            }
            Packet::Skipped(skipped) => {
                debug!(
                    "< skipped protocol: {:#04x} type: {:#04x} len: {}",
                    skipped.key.protocol, skipped.key.packet_type, skipped.len
                );
            }
            packet => {
                info!("< {:?}", packet.kind());
            }
        }
    }
}
