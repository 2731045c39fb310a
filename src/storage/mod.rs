//! Storage module for on-disk block files

pub mod blockfile;

pub use blockfile::{BlockFile, BlockIter, StorageError};

use crate::core::Block;
use std::path::Path;

/// Decode the block at `offset` in the file at `path`
pub fn load_block_at_offset(path: impl AsRef<Path>, offset: u64) -> Result<Block, StorageError> {
    BlockFile::new(path.as_ref()).load_at_offset(offset)
}
