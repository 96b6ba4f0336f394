use crate::io::block::{check_range, BlockStorage, StorageError};
use crate::sb::SuperBlock;

/// A single contiguous in-memory region split into fixed-size blocks. This is
/// the only storage a mounted filesystem has; nothing outlives it.
pub struct Arena {
    data: Box<[u8]>,
    block_size: usize,
}

impl Arena {
    /// Allocates a zeroed arena sized by the superblock geometry.
    pub fn new(sb: &SuperBlock) -> Self {
        Self {
            data: vec![0; sb.fs_size()].into_boxed_slice(),
            block_size: sb.block_size as usize,
        }
    }
}

impl BlockStorage for Arena {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.data.len() / self.block_size
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let end = check_range(offset, buf.len(), self.data.len())?;
        buf.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<(), StorageError> {
        let end = check_range(offset, buf.len(), self.data.len())?;
        self.data[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn move_bytes(&mut self, src: usize, dest: usize, len: usize) -> Result<(), StorageError> {
        let src_end = check_range(src, len, self.data.len())?;
        check_range(dest, len, self.data.len())?;
        self.data.copy_within(src..src_end, dest);
        Ok(())
    }
}
