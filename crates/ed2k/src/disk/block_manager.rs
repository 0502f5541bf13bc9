use std::collections::BTreeMap;

use bitvec::{bitvec, order::Lsb0, vec::BitVec};
use bytes::BytesMut;
use md4::{Digest, Md4};
use tracing::trace;

use super::PieceBlock;
use crate::hash::Hash;

/// Reconstruction state of one piece.
///
/// Blocks are hashed in order as soon as they are contiguous with what was
/// already hashed. A block received ahead of its turn keeps its buffer
/// until the blocks before it arrive, then the buffer is handed back.
pub struct BlockManager {
    piece_index: u32,
    /// Blocks received at least once.
    received: BitVec<u8, Lsb0>,
    /// Buffers of blocks received but not hashed yet.
    held: BTreeMap<u32, BytesMut>,
    /// Index of the next block to feed the hasher.
    next: u32,
    hasher: Md4,
}

impl BlockManager {
    pub fn new(piece_index: u32, blocks: u32) -> Self {
        Self {
            piece_index,
            received: bitvec![u8, Lsb0; 0; blocks as usize],
            held: BTreeMap::new(),
            next: 0,
            hasher: Md4::new(),
        }
    }

    pub fn piece_index(&self) -> u32 {
        self.piece_index
    }

    /// Record the data of `block`, returns the buffers the manager no
    /// longer needs.
    ///
    /// A block received twice changes nothing, its buffer is returned
    /// right away.
    ///
    /// # Panics
    ///
    /// If `block` belongs to another piece or is past the end of the piece.
    pub fn register_block(&mut self, block: PieceBlock, buffer: BytesMut) -> Vec<BytesMut> {
        assert_eq!(block.piece_index, self.piece_index, "block {block} of another piece");
        let index = block.block_index;
        assert!((index as usize) < self.received.len(), "block {block} out of the piece");

        if self.received[index as usize] {
            trace!("stale block {block}");
            return vec![buffer];
        }

        self.received.set(index as usize, true);
        self.held.insert(index, buffer);

        let mut free = Vec::new();
        while let Some(buffer) = self.held.remove(&self.next) {
            self.hasher.update(&buffer[..]);
            self.next += 1;
            free.push(buffer);
        }
        free
    }

    /// Every block was received.
    pub fn is_complete(&self) -> bool {
        self.received.all()
    }

    pub fn buffers_count(&self) -> usize {
        self.held.len()
    }

    /// Give back every buffer held, the piece can't be completed after this.
    pub fn drain_buffers(&mut self) -> Vec<BytesMut> {
        std::mem::take(&mut self.held).into_values().collect()
    }

    /// # Panics
    ///
    /// Unless every block was received and hashed.
    pub fn piece_hash(self) -> Hash {
        assert!(self.is_complete(), "piece {} is incomplete", self.piece_index);
        assert!(
            self.held.is_empty() && self.next as usize == self.received.len(),
            "piece {} still holds {} buffers",
            self.piece_index,
            self.held.len()
        );
        self.hasher.finalize().into()
    }
}

impl std::fmt::Debug for BlockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockManager")
            .field("piece_index", &self.piece_index)
            .field("received", &self.received.count_ones())
            .field("blocks", &self.received.len())
            .field("held", &self.held.len())
            .finish()
    }
}
