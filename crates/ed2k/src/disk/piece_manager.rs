use std::{io, path::Path};

use bytes::BytesMut;
use hashbrown::HashMap;
use tracing::{debug, warn};

use super::{BlockManager, FileHandler, Geometry, PieceBlock};
use crate::{
    error::{DiskFault, Error},
    hash::Hash,
};

/// Writes the blocks of one transfer to its file and tracks the pieces
/// being downloaded.
///
/// Every buffer handed to the manager comes back exactly once: in the list
/// returned by a successful call, inside the error of a failed one, or when
/// the transfer is aborted or released.
#[derive(Debug)]
pub struct PieceManager {
    handler: FileHandler,
    geometry: Geometry,
    /// Pieces with at least one block received, by index.
    pieces: HashMap<u32, BlockManager>,
}

impl PieceManager {
    pub fn new(handler: FileHandler, geometry: Geometry) -> Self {
        Self { handler, geometry, pieces: HashMap::new() }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn path(&self) -> &Path {
        self.handler.path()
    }

    /// Indices of the pieces being downloaded, in ascending order.
    pub fn active_pieces(&self) -> Vec<u32> {
        let mut pieces: Vec<u32> = self.pieces.keys().copied().collect();
        pieces.sort_unstable();
        pieces
    }

    /// Every block of the piece was received and hashed, the piece is ready
    /// for [`PieceManager::hash_piece`].
    pub fn is_piece_complete(&self, piece_index: u32) -> bool {
        self.pieces
            .get(&piece_index)
            .is_some_and(|piece| piece.is_complete() && piece.buffers_count() == 0)
    }

    /// Buffers held by all the pieces.
    pub fn buffers_count(&self) -> usize {
        self.pieces.values().map(BlockManager::buffers_count).sum()
    }

    fn piece(&mut self, piece_index: u32) -> &mut BlockManager {
        let blocks = self.geometry.blocks_in_piece(piece_index);
        self.pieces
            .entry(piece_index)
            .or_insert_with(|| BlockManager::new(piece_index, blocks))
    }

    /// Close the file after a failed operation and build the error that
    /// carries `buffers` back to the caller.
    fn fail(&mut self, e: io::Error, buffers: Vec<BytesMut>) -> Error {
        let fault = DiskFault::classify(&e);
        warn!("{:?}: {fault}: {e}", self.handler.path());
        self.handler.force_close();
        Error::Disk { fault, buffers }
    }

    /// Write the data of `block` to the file and register it with its
    /// piece. Returns the buffers that are free again.
    #[tracing::instrument(skip(self, buffer), fields(len = buffer.len()))]
    pub async fn write_block(
        &mut self,
        block: PieceBlock,
        buffer: BytesMut,
    ) -> Result<Vec<BytesMut>, Error> {
        if !self.geometry.contains(block) {
            return Err(Error::BlockOutOfRange { block, buffers: vec![buffer] });
        }

        let offset = block.offset(&self.geometry);
        if let Err(e) = self.handler.write_at(offset, &buffer).await {
            return Err(self.fail(e, vec![buffer]));
        }

        Ok(self.piece(block.piece_index).register_block(block, buffer))
    }

    /// Read back a block already on disk, when resuming a transfer, and
    /// register it with its piece.
    ///
    /// The block size is computed against `file_size`, the size of the
    /// file being restored.
    #[tracing::instrument(skip(self, buffer))]
    pub async fn restore_block(
        &mut self,
        block: PieceBlock,
        mut buffer: BytesMut,
        file_size: u64,
    ) -> Result<Vec<BytesMut>, Error> {
        let geometry = Geometry { file_size, ..self.geometry };
        if !geometry.contains(block) {
            return Err(Error::BlockOutOfRange { block, buffers: vec![buffer] });
        }

        let offset = block.offset(&geometry);
        let size = block.size(&geometry) as usize;
        if let Err(e) = self.handler.read_at(offset, &mut buffer, size).await {
            return Err(self.fail(e, vec![buffer]));
        }

        Ok(self.piece(block.piece_index).register_block(block, buffer))
    }

    /// Hash of a piece whose blocks were all received. The piece is no
    /// longer tracked afterwards.
    ///
    /// # Panics
    ///
    /// If the piece is incomplete or still holds buffers.
    pub fn hash_piece(&mut self, piece_index: u32) -> Result<Hash, Error> {
        let piece = self
            .pieces
            .remove(&piece_index)
            .ok_or(Error::PieceInactive(piece_index))?;

        let hash = piece.piece_hash();
        debug!("piece {piece_index} hash {hash}");
        Ok(hash)
    }

    /// Close the file, optionally delete it, and give back every buffer.
    /// Failures are logged, releasing always completes.
    #[tracing::instrument(skip(self))]
    pub async fn release_file(&mut self, delete: bool) -> Vec<BytesMut> {
        if let Err(e) = self.handler.close().await {
            warn!("could not close {:?}: {e}", self.handler.path());
        }

        if delete {
            if let Err(e) = self.handler.delete_file().await {
                warn!("could not delete {:?}: {e}", self.handler.path());
            }
        }

        self.abort()
    }

    /// Forget every piece being downloaded and give back their buffers.
    pub fn abort(&mut self) -> Vec<BytesMut> {
        let buffers: Vec<BytesMut> = self
            .pieces
            .drain()
            .flat_map(|(_, mut piece)| piece.drain_buffers())
            .collect();
        debug!("aborted, {} buffers released", buffers.len());
        buffers
    }

    pub async fn delete_file(&mut self) -> Result<(), Error> {
        self.handler.delete_file().await?;
        Ok(())
    }
}
