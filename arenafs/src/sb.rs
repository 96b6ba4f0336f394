use crate::fs::FsError;

/// Default size in bytes of one arena block.
pub const BLOCK_SIZE: u32 = 512;

/// Default size in bytes of the arena backing all file data (1 MiB).
pub const FS_SIZE: u32 = 1024 * 1024;

/// Default capacity of the entry table, root included.
pub const MAX_ENTRIES: u32 = 64;

/// Longest accepted entry name in bytes.
pub const MAX_NAME_LEN: usize = 31;

/// Longest accepted path in bytes.
pub const MAX_PATH_LEN: usize = 256;

/// Geometry of a mounted filesystem.
///
/// The arena is `blocks_count * block_size` bytes of contiguous memory. The
/// number of entries in the table ultimately sets the upper bound on how many
/// files and directories can exist at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperBlock {
    /// Bytes per arena block. File sizes round up to whole blocks.
    pub block_size: u32,
    /// Total blocks in the arena; the block cursor never passes this value.
    pub blocks_count: u32,
    /// Slots in the entry table, including the root at index 0.
    pub entries_count: u32,
}

impl Default for SuperBlock {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            blocks_count: FS_SIZE / BLOCK_SIZE,
            entries_count: MAX_ENTRIES,
        }
    }
}

impl SuperBlock {
    /// Total arena size in bytes.
    pub fn fs_size(&self) -> usize {
        self.blocks_count as usize * self.block_size as usize
    }

    /// Checks that the geometry can back a filesystem: non-zero blocks and
    /// room for at least the root entry.
    pub fn validate(&self) -> Result<(), FsError> {
        if self.block_size == 0 {
            return Err(FsError::InvalidGeometry(
                "block size must be non-zero".to_string(),
            ));
        }
        if self.blocks_count == 0 {
            return Err(FsError::InvalidGeometry(
                "arena needs at least one block".to_string(),
            ));
        }
        if self.entries_count == 0 {
            return Err(FsError::InvalidGeometry(
                "entry table needs room for the root".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of blocks a file of `size` bytes occupies. The geometry must
    /// have passed [`SuperBlock::validate`].
    pub fn blocks_for(&self, size: u32) -> u32 {
        let bs = self.block_size as u64;
        ((size as u64 + bs - 1) / bs) as u32
    }
}

/// Builds a validated [`SuperBlock`]. Unset values fall back to the defaults.
pub struct SuperBlockBuilder {
    block_size: u32,
    fs_size: u32,
    entries_count: u32,
}

impl Default for SuperBlockBuilder {
    fn default() -> Self {
        SuperBlockBuilder {
            block_size: BLOCK_SIZE,
            fs_size: FS_SIZE,
            entries_count: MAX_ENTRIES,
        }
    }
}

impl SuperBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the size in bytes of one arena block.
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the total arena size in bytes. Must be a multiple of the block size.
    pub fn with_fs_size(mut self, fs_size: u32) -> Self {
        self.fs_size = fs_size;
        self
    }

    /// Sets the entry table capacity, root included.
    pub fn with_entries(mut self, entries: u32) -> Self {
        self.entries_count = entries;
        self
    }

    pub fn build(self) -> Result<SuperBlock, FsError> {
        if self.block_size == 0 {
            return Err(FsError::InvalidGeometry(
                "block size must be non-zero".to_string(),
            ));
        }
        if self.fs_size % self.block_size != 0 {
            return Err(FsError::InvalidGeometry(format!(
                "arena size {} is not a multiple of block size {}",
                self.fs_size, self.block_size
            )));
        }
        let sb = SuperBlock {
            block_size: self.block_size,
            blocks_count: self.fs_size / self.block_size,
            entries_count: self.entries_count,
        };
        sb.validate()?;
        Ok(sb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_is_one_mebibyte_of_512_byte_blocks() {
        let sb = SuperBlock::default();

        assert_eq!(sb.blocks_count, 2048);
        assert_eq!(sb.fs_size(), 1024 * 1024);
        assert_eq!(sb, SuperBlockBuilder::new().build().unwrap());
    }

    #[test]
    fn blocks_round_up_to_whole_blocks() {
        let sb = SuperBlock::default();

        assert_eq!(sb.blocks_for(0), 0);
        assert_eq!(sb.blocks_for(1), 1);
        assert_eq!(sb.blocks_for(512), 1);
        assert_eq!(sb.blocks_for(513), 2);
        assert_eq!(sb.blocks_for(u32::MAX), 8_388_608);
    }

    #[test]
    fn builder_rejects_unaligned_arena() {
        let result = SuperBlockBuilder::new()
            .with_block_size(100)
            .with_fs_size(1050)
            .build();
        match result.unwrap_err() {
            FsError::InvalidGeometry(_) => (),
            _ => assert!(false, "Unexpected error type."),
        }
    }

    #[test]
    fn builder_rejects_empty_table_and_zero_blocks() {
        assert!(SuperBlockBuilder::new().with_entries(0).build().is_err());
        assert!(SuperBlockBuilder::new().with_block_size(0).build().is_err());
        assert!(SuperBlockBuilder::new().with_fs_size(0).build().is_err());
    }

    #[test]
    fn hand_built_geometry_is_validated() {
        assert!(SuperBlock::default().validate().is_ok());
        for sb in [
            SuperBlock { block_size: 0, ..SuperBlock::default() },
            SuperBlock { blocks_count: 0, ..SuperBlock::default() },
            SuperBlock { entries_count: 0, ..SuperBlock::default() },
        ]
        .iter()
        {
            match sb.validate().unwrap_err() {
                FsError::InvalidGeometry(_) => (),
                _ => assert!(false, "Unexpected error type."),
            }
        }
    }
}
