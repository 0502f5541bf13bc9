use std::{collections::HashMap, path::PathBuf};

use bytes::{Bytes, BytesMut};
use ed2k::{
    disk::{BufferPool, FileHandler, Geometry, PieceBlock, PieceManager},
    error::Error,
    hash::Hash,
    wire::{Packet, PacketCombiner, SendingPart},
};
use futures::{SinkExt, StreamExt};
use rand::{distributions::Alphanumeric, seq::SliceRandom, Rng, RngCore};
use tokio::{io::duplex, spawn};
use tokio_util::codec::Framed;

fn tmp_dir() -> PathBuf {
    let name: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect();
    PathBuf::from(format!("/tmp/{name}"))
}

/// Every block is sent in two parts, blocks in random order, some twice.
fn parts(file: &Bytes, geometry: &Geometry, wide: bool) -> Vec<Packet> {
    let hash = Hash::of(file);
    let mut blocks = Vec::new();
    for piece in 0..geometry.pieces() {
        for block in 0..geometry.blocks_in_piece(piece) {
            blocks.push(PieceBlock::new(piece, block));
        }
    }
    blocks.shuffle(&mut rand::thread_rng());
    blocks.push(blocks[0]);

    let mut packets = Vec::new();
    for block in blocks {
        let begin = block.offset(geometry);
        let end = begin + block.size(geometry);
        let middle = begin + (end - begin) / 2;

        for (b, e) in [(begin, middle), (middle, end)] {
            let data = file.slice(b as usize..e as usize);
            let packet = if wide {
                Packet::SendingPart64(SendingPart { hash, begin: b, end: e, data })
            } else {
                Packet::SendingPart(SendingPart { hash, begin: b as u32, end: e as u32, data })
            };
            packets.push(packet);
        }
    }
    packets
}

async fn download(wide: bool) -> Result<(), Error> {
    let dir = tmp_dir();
    let d = dir.clone();
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = std::fs::remove_dir_all(&d);
        original_hook(panic);
    }));
    std::fs::create_dir_all(&dir)?;

    let geometry = Geometry::with_sizes(50, 16, 4);
    let mut file = vec![0u8; geometry.file_size as usize];
    rand::thread_rng().fill_bytes(&mut file);
    let file = Bytes::from(file);

    let expected: Vec<Hash> = (0..geometry.pieces() as usize)
        .map(|p| {
            let start = p * geometry.piece_size as usize;
            let end = (start + geometry.piece_size as usize).min(file.len());
            Hash::of(&file[start..end])
        })
        .collect();

    let (a, b) = duplex(64);
    let mut tx = Framed::new(a, PacketCombiner::client());
    let mut rx = Framed::new(b, PacketCombiner::client());

    let packets = parts(&file, &geometry, wide);
    let sender = spawn(async move {
        for packet in packets {
            tx.send(packet).await?;
        }
        Ok::<_, Error>(())
    });

    let pool = BufferPool::new(16, geometry.block_size as usize);
    let path = dir.join("file.part");
    let mut pm = PieceManager::new(FileHandler::new(&path), geometry);

    // blocks being assembled from their parts
    let mut pending: HashMap<PieceBlock, BytesMut> = HashMap::new();
    let mut hashes: HashMap<u32, Hash> = HashMap::new();

    while let Some(packet) = rx.next().await {
        let (range, data) = match packet? {
            Packet::SendingPart(part) => (part.range(), part.data),
            Packet::SendingPart64(part) => (part.range(), part.data),
            other => panic!("unexpected {other:?}"),
        };

        let block = geometry.piece_block_at(range.start);
        let mut buffer = match pending.remove(&block) {
            Some(buffer) => buffer,
            None => pool.acquire().expect("pool exhausted"),
        };
        buffer.extend_from_slice(&data);

        if (buffer.len() as u64) < block.size(&geometry) {
            pending.insert(block, buffer);
            continue;
        }

        // resent after the piece was verified
        if hashes.contains_key(&block.piece_index) {
            pool.release(buffer);
            continue;
        }

        pool.release_all(pm.write_block(block, buffer).await?);

        if pm.is_piece_complete(block.piece_index) {
            hashes.insert(block.piece_index, pm.hash_piece(block.piece_index)?);
        }
    }
    sender.await.unwrap()?;
    assert!(pm.active_pieces().is_empty());

    let mut got: Vec<(u32, Hash)> = hashes.into_iter().collect();
    got.sort();
    let got: Vec<Hash> = got.into_iter().map(|(_, h)| h).collect();
    assert_eq!(got, expected);
    assert_eq!(Hash::from_pieces(&got), Hash::from_pieces(&expected));

    pool.release_all(pm.release_file(false).await);
    assert_eq!(pool.in_use(), 0);
    assert_eq!(std::fs::read(&path)?, file.to_vec());

    std::fs::remove_dir_all(dir)?;
    Ok(())
}

#[tokio::test]
async fn download_with_32_bits_offsets() -> Result<(), Error> {
    download(false).await
}

#[tokio::test]
async fn download_with_64_bits_offsets() -> Result<(), Error> {
    download(true).await
}
