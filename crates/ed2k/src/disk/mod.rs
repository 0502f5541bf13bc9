//! Reconstruction of downloaded files on disk.
//!
//! A file is cut in pieces of [`PIECE_SIZE`] bytes, each one verified by its
//! own hash, and pieces are cut in blocks of [`BLOCK_SIZE`] bytes, the unit
//! of a request to a peer. Blocks arrive in any order, get written where
//! they belong and fed to the hash of their piece.
pub mod block_manager;
pub mod buffer_pool;
pub mod file_handler;
pub mod piece_manager;

pub use block_manager::*;
pub use buffer_pool::*;
pub use file_handler::*;
pub use piece_manager::*;

pub const PIECE_SIZE: u64 = 9_728_000;
/// 190 KiB.
pub const BLOCK_SIZE: u64 = 194_560;
pub const BLOCKS_PER_PIECE: u32 = (PIECE_SIZE / BLOCK_SIZE) as u32;

/// Sizes of a file and of its subdivisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub file_size: u64,
    pub piece_size: u64,
    pub block_size: u64,
}

impl Geometry {
    /// Geometry of a file with the ed2k piece and block sizes.
    pub fn new(file_size: u64) -> Self {
        Self::with_sizes(file_size, PIECE_SIZE, BLOCK_SIZE)
    }

    /// # Panics
    ///
    /// If a block is empty or larger than a piece.
    pub fn with_sizes(file_size: u64, piece_size: u64, block_size: u64) -> Self {
        assert!(block_size > 0 && block_size <= piece_size, "invalid block size {block_size}");
        Self { file_size, piece_size, block_size }
    }

    pub fn pieces(&self) -> u32 {
        self.file_size.div_ceil(self.piece_size) as u32
    }

    /// Blocks of a full piece.
    pub fn blocks_per_piece(&self) -> u32 {
        self.piece_size.div_ceil(self.block_size) as u32
    }

    /// Length of a piece, the last one can be shorter.
    pub fn piece_len(&self, piece_index: u32) -> u64 {
        let start = piece_index as u64 * self.piece_size;
        self.file_size.saturating_sub(start).min(self.piece_size)
    }

    pub fn blocks_in_piece(&self, piece_index: u32) -> u32 {
        self.piece_len(piece_index).div_ceil(self.block_size) as u32
    }

    /// Length of a block, the last block of the file can be shorter.
    pub fn block_size_of(&self, block: PieceBlock) -> u64 {
        let piece_len = self.piece_len(block.piece_index);
        let start = block.block_index as u64 * self.block_size;
        piece_len.saturating_sub(start).min(self.block_size)
    }

    /// The block that holds the byte at `offset`.
    pub fn piece_block_at(&self, offset: u64) -> PieceBlock {
        let piece_index = offset / self.piece_size;
        let block_index = (offset % self.piece_size) / self.block_size;
        PieceBlock::new(piece_index as u32, block_index as u32)
    }

    /// Whether `block` lies inside the file.
    pub fn contains(&self, block: PieceBlock) -> bool {
        block.piece_index < self.pieces()
            && block.block_index < self.blocks_in_piece(block.piece_index)
    }

    /// How many piece hashes a peer advertises for this file. A file whose
    /// size is a multiple of the piece size gets an extra
    /// [`Hash::TERMINAL`](crate::hash::Hash::TERMINAL) entry.
    pub fn piece_hashes_count(&self) -> u32 {
        (self.file_size / self.piece_size + 1) as u32
    }
}

/// Coordinates of a block inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PieceBlock {
    pub piece_index: u32,
    pub block_index: u32,
}

impl PieceBlock {
    pub fn new(piece_index: u32, block_index: u32) -> Self {
        Self { piece_index, block_index }
    }

    /// Absolute offset of the first byte of the block.
    pub fn offset(&self, geometry: &Geometry) -> u64 {
        self.piece_index as u64 * geometry.piece_size
            + self.block_index as u64 * geometry.block_size
    }

    pub fn size(&self, geometry: &Geometry) -> u64 {
        geometry.block_size_of(*self)
    }
}

impl std::fmt::Display for PieceBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.piece_index, self.block_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed2k_constants() {
        assert_eq!(BLOCKS_PER_PIECE, 50);
        assert_eq!(BLOCK_SIZE, 190 * 1024);
        assert_eq!(Geometry::new(PIECE_SIZE).blocks_per_piece(), 50);
    }

    #[test]
    fn last_block_is_shorter() {
        let geometry = Geometry::new(PIECE_SIZE + BLOCK_SIZE + 100);
        assert_eq!(geometry.pieces(), 2);
        assert_eq!(geometry.blocks_in_piece(0), 50);
        assert_eq!(geometry.blocks_in_piece(1), 2);

        let last = PieceBlock::new(1, 1);
        assert_eq!(last.offset(&geometry), PIECE_SIZE + BLOCK_SIZE);
        assert_eq!(last.size(&geometry), 100);
        assert_eq!(PieceBlock::new(1, 0).size(&geometry), BLOCK_SIZE);
        assert!(geometry.contains(last));
        assert!(!geometry.contains(PieceBlock::new(1, 2)));
        assert!(!geometry.contains(PieceBlock::new(2, 0)));
    }

    #[test]
    fn offsets_to_blocks() {
        let geometry = Geometry::new(3 * PIECE_SIZE);
        assert_eq!(geometry.piece_block_at(0), PieceBlock::new(0, 0));
        assert_eq!(geometry.piece_block_at(BLOCK_SIZE - 1), PieceBlock::new(0, 0));
        assert_eq!(geometry.piece_block_at(BLOCK_SIZE), PieceBlock::new(0, 1));
        assert_eq!(geometry.piece_block_at(PIECE_SIZE + 1), PieceBlock::new(1, 0));

        let block = PieceBlock::new(2, 49);
        assert_eq!(geometry.piece_block_at(block.offset(&geometry)), block);
    }

    #[test]
    fn piece_hashes_count() {
        assert_eq!(Geometry::new(100).piece_hashes_count(), 1);
        assert_eq!(Geometry::new(PIECE_SIZE).piece_hashes_count(), 2);
        assert_eq!(Geometry::new(PIECE_SIZE + 1).piece_hashes_count(), 2);
        assert_eq!(Geometry::new(2 * PIECE_SIZE).piece_hashes_count(), 3);
    }

    #[test]
    fn small_geometry() {
        let geometry = Geometry::with_sizes(8, 8, 4);
        assert_eq!(geometry.pieces(), 1);
        assert_eq!(geometry.blocks_in_piece(0), 2);
        assert_eq!(PieceBlock::new(0, 1).offset(&geometry), 4);
    }

    #[test]
    #[should_panic]
    fn block_larger_than_piece() {
        Geometry::with_sizes(8, 4, 8);
    }
}
