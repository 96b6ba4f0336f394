use thiserror::Error;

/// The block number to access ranging from 0 (the first block) to n - 1 (the last
/// block) where n is number of blocks available.
pub type BlockNumber = usize;

#[derive(Error, Debug, PartialEq)]
pub enum StorageError {
    #[error("range {offset}..{end} is outside the {capacity} byte region")]
    OutOfRange {
        offset: usize,
        end: usize,
        capacity: usize,
    },
}

/// Byte-addressable block storage backing the filesystem's file data.
///
/// Block `n` starts at byte `n * block_size()`. Accesses are bounds checked
/// against the whole region; the filesystem is responsible for keeping each
/// file inside its own block range.
pub trait BlockStorage {
    fn block_size(&self) -> usize;

    fn block_count(&self) -> usize;

    /// Total bytes in the region.
    fn capacity(&self) -> usize {
        self.block_size() * self.block_count()
    }

    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Attempting to read past the end of the region will return an error.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Copies `buf` into the region starting at `offset`.
    ///
    /// # Errors
    ///
    /// Attempting to write past the end of the region will return an error.
    fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<(), StorageError>;

    /// Moves `len` bytes starting at `src` to `dest`. The ranges may overlap.
    fn move_bytes(&mut self, src: usize, dest: usize, len: usize) -> Result<(), StorageError>;

    /// Byte offset of the first byte of `blocknr`.
    fn block_offset(&self, blocknr: BlockNumber) -> usize {
        blocknr * self.block_size()
    }
}

/// Checks that `offset..offset + len` lies inside a region of `capacity` bytes.
pub(crate) fn check_range(offset: usize, len: usize, capacity: usize) -> Result<usize, StorageError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(end),
        _ => Err(StorageError::OutOfRange {
            offset,
            end: offset.saturating_add(len),
            capacity,
        }),
    }
}
