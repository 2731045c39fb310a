//! Random access into flat block files
//!
//! A block file is serialized blocks laid end to end with no separators.
//! A block is addressed only by the byte offset where it starts.

use crate::core::Block;
use crate::wire::{Decodable, DecodeError};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Block file not found: {0}")]
    MissingBlockFile(PathBuf),
    #[error("Offset {offset} is beyond the end of the block file ({len} bytes)")]
    OffsetOutOfRange { offset: u64, len: u64 },
    #[error("Failed to decode block: {0}")]
    Decode(#[from] DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A block file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFile {
    path: PathBuf,
}

impl BlockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<(File, u64), StorageError> {
        let file = File::open(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::MissingBlockFile(self.path.clone())
            } else {
                StorageError::Io(e)
            }
        })?;
        let len = file.metadata()?.len();
        Ok((file, len))
    }

    /// Decode the block starting at `offset`, with every hash recomputed
    pub fn load_at_offset(&self, offset: u64) -> Result<Block, StorageError> {
        let (mut file, len) = self.open()?;
        if offset >= len {
            return Err(StorageError::OffsetOutOfRange { offset, len });
        }
        file.seek(SeekFrom::Start(offset))?;

        let mut reader = BufReader::new(file);
        let mut block = Block::decode(&mut reader)?;
        block.rehash();
        log::debug!(
            "Loaded block {} at offset {} from {}",
            block.hash(),
            offset,
            self.path.display()
        );
        Ok(block)
    }

    /// Walk the file from the start, yielding each block with its offset
    pub fn blocks(&self) -> Result<BlockIter, StorageError> {
        let (file, len) = self.open()?;
        Ok(BlockIter {
            reader: CountingReader {
                inner: BufReader::new(file),
                pos: 0,
            },
            len,
            failed: false,
        })
    }
}

struct CountingReader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Sequential reader over a block file
pub struct BlockIter {
    reader: CountingReader<BufReader<File>>,
    len: u64,
    failed: bool,
}

impl Iterator for BlockIter {
    type Item = Result<(u64, Block), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.pos >= self.len {
            return None;
        }
        let offset = self.reader.pos;
        match Block::decode(&mut self.reader) {
            Ok(mut block) => {
                block.rehash();
                Some(Ok((offset, block)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e.into()))
            }
        }
    }
}
