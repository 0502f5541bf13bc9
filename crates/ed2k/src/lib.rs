//! A library for the eDonkey2000 / eMule protocol.
//!
//! It has the two halves a client is built on:
//!
//! * [wire]: framing of the TCP stream into typed packets, for both server
//!   and client connections, usable as a `tokio_util` codec.
//! * [disk]: reconstruction of a file from blocks received in any order,
//!   with the hash of every piece computed as the blocks arrive.
//!
//! [region] has the byte range algebra used to track which parts of a file
//! are known.
//!
//! # Example
//!
//! Reading packets from a peer:
//!
//! ```no_run
//! use ed2k::wire::{Packet, PacketCombiner};
//! use futures::StreamExt;
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//!
//! # async fn run() -> Result<(), ed2k::error::Error> {
//! let stream = TcpStream::connect("127.0.0.1:4662").await?;
//! let mut framed = Framed::new(stream, PacketCombiner::client());
//!
//! while let Some(packet) = framed.next().await {
//!     if let Packet::SendingPart(part) = packet? {
//!         println!("got bytes {:?}", part.range());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod disk;
pub mod error;
pub mod hash;
pub mod region;
pub mod wire;
