use std::collections::HashSet;

use log::{debug, info};
use thiserror::Error;

use crate::alloc::{AllocError, PageAllocator, PhysAddr};
use crate::io::{Arena, BlockStorage, StorageError};
use crate::node::{DirectoryIndex, Entry, EntryKind, EntryName, EntryTable, ROOT_INDEX};
use crate::path;
use crate::sb::SuperBlock;

#[derive(Error, Debug, PartialEq)]
pub enum FsError {
    #[error("no entry at \"{0}\"")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("\"{0}\" is not a directory")]
    NotADirectory(String),
    #[error("\"{0}\" is not a file")]
    NotAFile(String),
    #[error("entry table is full")]
    TableFull,
    #[error("need {needed} blocks, {available} left")]
    OutOfSpace { needed: u32, available: u32 },
    #[error("directory \"{0}\" is not empty")]
    NotEmpty(String),
    #[error("range {offset}+{len} exceeds file size {size}")]
    OutOfBounds { offset: u32, len: usize, size: u32 },
    #[error("\"{0}\" already exists")]
    AlreadyExists(String),
    #[error("name is {0} bytes long")]
    NameTooLong(usize),
    #[error("the root directory cannot be removed")]
    RootDirectory,
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("inconsistent filesystem: {0}")]
    Inconsistent(String),
    #[error("page allocator: {0}")]
    Alloc(#[from] AllocError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

impl FsError {
    /// Negative errno-style status for callers using the signed result
    /// convention.
    pub fn code(&self) -> i32 {
        match self {
            FsError::NotFound(_) => -2,
            FsError::InvalidPath(_) => -22,
            FsError::NotADirectory(_) => -20,
            FsError::NotAFile(_) => -21,
            FsError::TableFull => -23,
            FsError::OutOfSpace { .. } => -28,
            FsError::NotEmpty(_) => -39,
            FsError::OutOfBounds { .. } => -34,
            FsError::AlreadyExists(_) => -17,
            FsError::NameTooLong(_) => -36,
            FsError::RootDirectory => -16,
            FsError::InvalidGeometry(_) => -22,
            FsError::Inconsistent(_) => -117,
            FsError::Alloc(err) => err.code(),
            FsError::Storage(_) => -5,
        }
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u32,
}

/// Metadata of a single entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metadata {
    /// Slot of the entry in the table.
    pub index: usize,
    pub kind: EntryKind,
    pub size: u32,
    pub start_block: u32,
    /// Blocks reserved for the entry's data.
    pub blocks: u32,
}

/// Space and table usage of a mounted filesystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FsStats {
    pub block_size: u32,
    pub total_blocks: u32,
    /// Blocks behind the cursor, live or not.
    pub used_blocks: u32,
    pub free_blocks: u32,
    /// Blocks reserved by files that still exist.
    pub live_blocks: u32,
    pub total_entries: u32,
    pub free_entries: u32,
}

/// A path-addressed filesystem living entirely inside one storage region.
///
/// # Layout
/// ======================================================================
/// | file 0 blocks | file 1 blocks | ... | cursor -> unused blocks      |
/// ======================================================================
///
/// Files get a contiguous block range from a cursor that only moves forward.
/// Deleting a file clears its table entry but leaves its blocks consumed until
/// an explicit [`FileSystem::compact`].
pub struct FileSystem<T: BlockStorage> {
    dev: T,
    super_block: SuperBlock,
    entries: EntryTable,
    /// Next unused block.
    cursor: u32,
    /// Page acquired from the page allocator for the lifetime of the mount.
    backing: PhysAddr,
}

impl FileSystem<Arena> {
    /// Acquires one page from `pmm` to back the filesystem and formats an
    /// empty arena with only the root directory.
    pub fn mount(pmm: &mut PageAllocator, super_block: SuperBlock) -> Result<Self, FsError> {
        super_block.validate()?;
        info!("FS: allocating memory for file system");
        let backing = pmm.allocate_page()?;
        info!("FS: backing page at {}", backing);
        FileSystem::create(Arena::new(&super_block), super_block, backing)
    }
}

impl<T: BlockStorage> FileSystem<T> {
    /// Formats `dev` with an empty entry table holding only the root. `dev`
    /// must match the superblock geometry.
    pub fn create(dev: T, super_block: SuperBlock, backing: PhysAddr) -> Result<Self, FsError> {
        super_block.validate()?;
        if dev.block_size() != super_block.block_size as usize
            || dev.block_count() != super_block.blocks_count as usize
        {
            return Err(FsError::InvalidGeometry(format!(
                "storage has {} blocks of {} bytes, superblock expects {} of {}",
                dev.block_count(),
                dev.block_size(),
                super_block.blocks_count,
                super_block.block_size
            )));
        }

        info!(
            "FS: {} entries, {} blocks of {} bytes",
            super_block.entries_count, super_block.blocks_count, super_block.block_size
        );
        Ok(FileSystem {
            dev,
            entries: EntryTable::new(super_block.entries_count as usize),
            super_block,
            cursor: 0,
            backing,
        })
    }

    /// Returns the backing page to `pmm`.
    pub fn unmount(self, pmm: &mut PageAllocator) -> Result<(), FsError> {
        info!("FS: unmounting, releasing page {}", self.backing);
        pmm.free_page(self.backing)?;
        Ok(())
    }

    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    pub fn backing_page(&self) -> PhysAddr {
        self.backing
    }

    /// Resolves `path` to its index in the entry table.
    pub fn resolve(&self, path: &str) -> Result<usize, FsError> {
        debug!("FS: searching for path {}", path);
        path::validate(path)?;

        let mut current = ROOT_INDEX;
        let mut segments = path::segments(path).peekable();
        while let Some(segment) = segments.next() {
            current = self
                .entries
                .find_child(current, segment)
                .ok_or_else(|| FsError::NotFound(path.to_string()))?;
            if segments.peek().is_some() && !self.is_dir(current) {
                return Err(FsError::NotADirectory(path.to_string()));
            }
        }
        Ok(current)
    }

    /// Creates a file of `size` bytes or an empty directory at `path` and
    /// returns its table index. Directories ignore `size`.
    pub fn create_entry(&mut self, path: &str, size: u32, kind: EntryKind) -> Result<usize, FsError> {
        debug!("FS: creating {} {}", kind, path);
        path::validate(path)?;
        let (parent_path, name) = path::split_parent(path)?;
        path::validate_name(name)?;
        let entry_name = EntryName::new(name).ok_or(FsError::NameTooLong(name.len()))?;

        let parent = self.resolve(parent_path)?;
        if !self.is_dir(parent) {
            return Err(FsError::NotADirectory(parent_path.to_string()));
        }
        if self.entries.find_child(parent, name).is_some() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let slot = self.entries.free_slot().ok_or(FsError::TableFull)?;

        let (start_block, size) = match kind {
            EntryKind::File => {
                let needed = self.super_block.blocks_for(size);
                let available = self.super_block.blocks_count - self.cursor;
                if needed > available {
                    debug!("FS: not enough space for {}", path);
                    return Err(FsError::OutOfSpace { needed, available });
                }
                let start = self.cursor;
                self.cursor += needed;
                (start, size)
            }
            EntryKind::Directory => (0, 0),
        };

        self.entries.insert(
            slot,
            Entry {
                name: entry_name,
                kind,
                parent,
                start_block,
                size,
                in_use: true,
            },
        );
        debug!("FS: {} stored in slot {}", path, slot);
        Ok(slot)
    }

    /// Creates a file of `size` bytes at `path`.
    pub fn create_file(&mut self, path: &str, size: u32) -> Result<usize, FsError> {
        self.create_entry(path, size, EntryKind::File)
    }

    /// Creates an empty directory at `path`.
    pub fn create_dir(&mut self, path: &str) -> Result<usize, FsError> {
        self.create_entry(path, 0, EntryKind::Directory)
    }

    /// Removes the file or empty directory at `path`. The blocks of a removed
    /// file stay consumed.
    pub fn delete(&mut self, path: &str) -> Result<(), FsError> {
        let index = self.resolve(path)?;
        if index == ROOT_INDEX {
            return Err(FsError::RootDirectory);
        }
        if self.is_dir(index) && self.entries.has_children(index) {
            debug!("FS: directory {} not empty", path);
            return Err(FsError::NotEmpty(path.to_string()));
        }
        self.entries.remove(index);
        debug!("FS: removed {} from slot {}", path, index);
        Ok(())
    }

    /// Reads `buf.len()` bytes of the file at `path` starting at `offset`.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u32) -> Result<usize, FsError> {
        let entry = self.file_entry(path)?;
        let start = self.data_offset(&entry, offset, buf.len())?;
        self.dev.read_at(start, buf)?;
        Ok(buf.len())
    }

    /// Reads `size` bytes of the file at `path` starting at `offset` into a new
    /// buffer.
    pub fn read_to_vec(&self, path: &str, size: usize, offset: u32) -> Result<Vec<u8>, FsError> {
        let mut buf = vec![0; size];
        self.read(path, &mut buf, offset)?;
        Ok(buf)
    }

    /// Writes `buf` into the file at `path` starting at `offset`. Files never
    /// grow; the write must fit inside the size given at creation.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u32) -> Result<usize, FsError> {
        let entry = self.file_entry(path)?;
        let start = self.data_offset(&entry, offset, buf.len())?;
        self.dev.write_at(start, buf)?;
        Ok(buf.len())
    }

    /// Lists the children of the directory at `path` in table order.
    pub fn list(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let dir = self.resolve(path)?;
        if !self.is_dir(dir) {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        Ok(self
            .entries
            .children(dir)
            .into_iter()
            .filter_map(|i| self.entries.get(i))
            .map(|entry| DirEntry {
                name: entry.name.as_str().to_string(),
                kind: entry.kind,
                size: entry.size,
            })
            .collect())
    }

    pub fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        let index = self.resolve(path)?;
        let entry = self.entry(index)?;
        Ok(Metadata {
            index,
            kind: entry.kind,
            size: entry.size,
            start_block: entry.start_block,
            blocks: self.blocks_of(entry),
        })
    }

    pub fn statfs(&self) -> FsStats {
        let live_blocks: u32 = self
            .entries
            .iter()
            .map(|(_, entry)| self.blocks_of(entry))
            .sum();
        let total_entries = self.super_block.entries_count;
        FsStats {
            block_size: self.super_block.block_size,
            total_blocks: self.super_block.blocks_count,
            used_blocks: self.cursor,
            free_blocks: self.super_block.blocks_count - self.cursor,
            live_blocks,
            total_entries,
            free_entries: total_entries - self.entries.live_count() as u32,
        }
    }

    /// Slides every live file down over the blocks left behind by deleted
    /// files and rewinds the cursor. File contents are preserved. Returns the
    /// number of blocks reclaimed.
    pub fn compact(&mut self) -> Result<u32, FsError> {
        let mut files: Vec<(usize, u32, u32)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.kind == EntryKind::File)
            .map(|(i, entry)| (i, entry.start_block, self.blocks_of(entry)))
            .collect();
        files.sort_by_key(|&(_, start, _)| start);

        let block_size = self.dev.block_size();
        let mut next = 0;
        for (index, start, blocks) in files {
            if start != next && blocks > 0 {
                let src = self.dev.block_offset(start as usize);
                let dest = self.dev.block_offset(next as usize);
                self.dev.move_bytes(src, dest, blocks as usize * block_size)?;
            }
            if let Some(entry) = self.entries.get_mut(index) {
                entry.start_block = next;
            }
            next += blocks;
        }

        let reclaimed = self.cursor - next;
        self.cursor = next;
        info!("FS: compaction reclaimed {} blocks", reclaimed);
        Ok(reclaimed)
    }

    /// Walks the entry table and verifies its structural invariants: a single
    /// self-parented root, acyclic parent chains ending at the root, unique
    /// sibling names and disjoint file block ranges behind the cursor.
    pub fn check(&self) -> Result<(), FsError> {
        match self.entries.get(ROOT_INDEX) {
            Some(root) if root.is_dir() && root.parent == ROOT_INDEX => (),
            _ => return Err(FsError::Inconsistent("root directory is damaged".to_string())),
        }

        let capacity = self.entries.capacity();
        let mut names = HashSet::new();
        let mut ranges = Vec::new();
        for (index, entry) in self.entries.iter().filter(|&(i, _)| i != ROOT_INDEX) {
            if entry.parent == index {
                return Err(FsError::Inconsistent(format!("slot {} is its own parent", index)));
            }

            let mut ancestor = entry.parent;
            let mut steps = 0;
            while ancestor != ROOT_INDEX {
                if steps == capacity || !self.is_dir(ancestor) {
                    return Err(FsError::Inconsistent(format!(
                        "slot {} does not descend from the root",
                        index
                    )));
                }
                ancestor = self.entries.get(ancestor).map_or(ROOT_INDEX, |e| e.parent);
                steps += 1;
            }
            if !self.is_dir(entry.parent) {
                return Err(FsError::Inconsistent(format!(
                    "parent of slot {} is not a directory",
                    index
                )));
            }

            if !names.insert((entry.parent, entry.name)) {
                return Err(FsError::Inconsistent(format!(
                    "duplicate name {:?} under slot {}",
                    entry.name, entry.parent
                )));
            }

            let blocks = self.blocks_of(entry);
            if blocks > 0 {
                ranges.push((entry.start_block, entry.start_block + blocks, index));
            }
        }

        ranges.sort();
        let mut previous_end = 0;
        for (start, end, index) in ranges {
            if start < previous_end || end > self.cursor {
                return Err(FsError::Inconsistent(format!(
                    "blocks of slot {} overlap or pass the cursor",
                    index
                )));
            }
            previous_end = end;
        }
        Ok(())
    }

    fn entry(&self, index: usize) -> Result<&Entry, FsError> {
        self.entries
            .get(index)
            .ok_or_else(|| FsError::Inconsistent(format!("slot {} is not in use", index)))
    }

    fn is_dir(&self, index: usize) -> bool {
        self.entries.get(index).map_or(false, Entry::is_dir)
    }

    fn file_entry(&self, path: &str) -> Result<Entry, FsError> {
        let index = self.resolve(path)?;
        let entry = *self.entry(index)?;
        if entry.kind != EntryKind::File {
            return Err(FsError::NotAFile(path.to_string()));
        }
        Ok(entry)
    }

    /// Arena offset for `len` bytes at `offset` inside `entry`, checked against
    /// the logical file size.
    fn data_offset(&self, entry: &Entry, offset: u32, len: usize) -> Result<usize, FsError> {
        if offset as u64 + len as u64 > entry.size as u64 {
            debug!("FS: access {}+{} out of bounds", offset, len);
            return Err(FsError::OutOfBounds {
                offset,
                len,
                size: entry.size,
            });
        }
        Ok(self.dev.block_offset(entry.start_block as usize) + offset as usize)
    }

    fn blocks_of(&self, entry: &Entry) -> u32 {
        match entry.kind {
            EntryKind::File => self.super_block.blocks_for(entry.size),
            EntryKind::Directory => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::PAGE_SIZE;
    use crate::sb::SuperBlockBuilder;

    fn create_test_fs() -> FileSystem<Arena> {
        let mut pmm = PageAllocator::with_bitmap_words(1, 16 * PAGE_SIZE);
        FileSystem::mount(&mut pmm, SuperBlock::default()).unwrap()
    }

    fn create_small_fs(blocks: u32, entries: u32) -> FileSystem<Arena> {
        let mut pmm = PageAllocator::with_bitmap_words(1, 16 * PAGE_SIZE);
        let sb = SuperBlockBuilder::new()
            .with_block_size(16)
            .with_fs_size(16 * blocks)
            .with_entries(entries)
            .build()
            .unwrap();
        FileSystem::mount(&mut pmm, sb).unwrap()
    }

    #[test]
    fn root_dir_resolves_to_root_index() {
        let fs = create_test_fs();
        assert_eq!(fs.resolve("/").unwrap(), 0);
        assert_eq!(fs.resolve("//").unwrap(), 0);
    }

    #[test]
    fn missing_entry_returns_not_found() {
        let fs = create_test_fs();

        match fs.resolve("/foo").unwrap_err() {
            FsError::NotFound(_) => (),
            _ => assert!(false, "Unexpected error type."),
        }
    }

    #[test]
    fn created_file_takes_first_free_slot() {
        let mut fs = create_test_fs();

        assert_eq!(fs.create_file("/foo", 10).unwrap(), 1);
        assert_eq!(fs.resolve("/foo").unwrap(), 1);
        assert_eq!(fs.resolve("/foo/").unwrap(), 1);
    }

    #[test]
    fn cannot_descend_through_a_file() {
        let mut fs = create_test_fs();
        fs.create_file("/foo", 10).unwrap();

        assert_eq!(
            fs.resolve("/foo/bar"),
            Err(FsError::NotADirectory("/foo/bar".to_string()))
        );
        assert_eq!(
            fs.create_file("/foo/bar", 1),
            Err(FsError::NotADirectory("/foo".to_string()))
        );
    }

    #[test]
    fn create_requires_existing_parent() {
        let mut fs = create_test_fs();

        match fs.create_dir("/a/b").unwrap_err() {
            FsError::NotFound(_) => (),
            _ => assert!(false, "Unexpected error type."),
        }
        assert_eq!(fs.statfs().free_entries, 63);
    }

    #[test]
    fn create_rejects_paths_without_a_name() {
        let mut fs = create_test_fs();

        assert!(matches!(fs.create_dir("/"), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.create_file("foo", 1), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.create_file("/a/..", 1), Err(FsError::InvalidPath(_))));
    }

    #[test]
    fn sibling_names_are_unique() {
        let mut fs = create_test_fs();
        fs.create_dir("/etc").unwrap();
        fs.create_file("/etc/hosts", 4).unwrap();

        assert_eq!(
            fs.create_dir("/etc/hosts"),
            Err(FsError::AlreadyExists("/etc/hosts".to_string()))
        );
        // Same name under another parent is fine.
        fs.create_file("/hosts", 4).unwrap();
        assert!(fs.check().is_ok());
    }

    #[test]
    fn table_full_leaves_cursor_untouched() {
        let mut fs = create_small_fs(8, 3);
        fs.create_file("/a", 16).unwrap();
        fs.create_file("/b", 16).unwrap();

        assert_eq!(fs.create_file("/c", 16), Err(FsError::TableFull));
        assert_eq!(fs.statfs().used_blocks, 2);
    }

    #[test]
    fn files_get_consecutive_block_ranges() {
        let mut fs = create_small_fs(8, 8);
        fs.create_file("/a", 17).unwrap();
        fs.create_file("/empty", 0).unwrap();
        fs.create_file("/b", 16).unwrap();

        assert_eq!(fs.stat("/a").unwrap().start_block, 0);
        assert_eq!(fs.stat("/a").unwrap().blocks, 2);
        assert_eq!(fs.stat("/empty").unwrap().blocks, 0);
        assert_eq!(fs.stat("/b").unwrap().start_block, 2);
        assert_eq!(fs.statfs().used_blocks, 3);
    }

    #[test]
    fn directories_consume_no_blocks() {
        let mut fs = create_small_fs(1, 8);
        fs.create_entry("/d", 4096, EntryKind::Directory).unwrap();

        let meta = fs.stat("/d").unwrap();
        assert_eq!(meta.size, 0);
        assert_eq!(meta.blocks, 0);
        assert_eq!(fs.statfs().used_blocks, 0);
    }

    #[test]
    fn space_exhaustion_keeps_prior_files() {
        let mut fs = create_small_fs(4, 8);
        fs.create_file("/a", 32).unwrap();
        fs.create_file("/b", 16).unwrap();

        assert_eq!(
            fs.create_file("/c", 17),
            Err(FsError::OutOfSpace {
                needed: 2,
                available: 1
            })
        );
        assert!(fs.resolve("/c").is_err());
        assert_eq!(fs.stat("/a").unwrap().size, 32);
        assert_eq!(fs.stat("/b").unwrap().size, 16);
        fs.create_file("/c", 16).unwrap();
    }

    #[test]
    fn delete_does_not_reclaim_blocks() {
        let mut fs = create_small_fs(4, 8);
        fs.create_file("/a", 64).unwrap();
        fs.delete("/a").unwrap();

        let stats = fs.statfs();
        assert_eq!(stats.used_blocks, 4);
        assert_eq!(stats.live_blocks, 0);
        assert!(matches!(fs.create_file("/b", 1), Err(FsError::OutOfSpace { .. })));
    }

    #[test]
    fn non_empty_directory_cannot_be_deleted() {
        let mut fs = create_test_fs();
        fs.create_dir("/a").unwrap();
        fs.create_file("/a/b", 10).unwrap();

        assert_eq!(fs.delete("/a"), Err(FsError::NotEmpty("/a".to_string())));
        fs.delete("/a/b").unwrap();
        fs.delete("/a").unwrap();
        assert!(fs.resolve("/a").is_err());
    }

    #[test]
    fn root_cannot_be_deleted() {
        let mut fs = create_test_fs();

        assert_eq!(fs.delete("/"), Err(FsError::RootDirectory));
        assert_eq!(fs.resolve("/").unwrap(), 0);
    }

    #[test]
    fn reads_are_bounded_by_logical_size() {
        let mut fs = create_test_fs();
        fs.create_file("/f", 10).unwrap();

        assert_eq!(
            fs.read_to_vec("/f", 5, 8),
            Err(FsError::OutOfBounds {
                offset: 8,
                len: 5,
                size: 10
            })
        );
        assert_eq!(fs.read_to_vec("/f", 2, 8).unwrap(), vec![0, 0]);
        assert!(fs.read_to_vec("/f", 0, 10).unwrap().is_empty());
        assert!(fs.read_to_vec("/f", 1, u32::MAX).is_err());
    }

    #[test]
    fn writes_are_bounded_by_logical_size() {
        let mut fs = create_test_fs();
        fs.create_file("/f", 10).unwrap();

        assert!(matches!(
            fs.write("/f", &[1; 11], 0),
            Err(FsError::OutOfBounds { .. })
        ));
        assert_eq!(fs.write("/f", &[1; 10], 0).unwrap(), 10);
    }

    #[test]
    fn written_bytes_read_back() {
        let mut fs = create_test_fs();
        fs.create_file("/a", 600).unwrap();
        fs.create_file("/b", 600).unwrap();

        fs.write("/a", b"hello, arena", 500).unwrap();
        fs.write("/b", &[0xff; 600], 0).unwrap();

        assert_eq!(fs.read_to_vec("/a", 12, 500).unwrap(), b"hello, arena".to_vec());
        assert_eq!(fs.read_to_vec("/a", 4, 496).unwrap(), vec![0; 4]);
    }

    #[test]
    fn io_on_directories_is_rejected() {
        let mut fs = create_test_fs();
        fs.create_dir("/d").unwrap();

        assert_eq!(fs.write("/d", b"x", 0), Err(FsError::NotAFile("/d".to_string())));
        let mut buf = [0; 1];
        assert_eq!(fs.read("/", &mut buf, 0), Err(FsError::NotAFile("/".to_string())));
    }

    #[test]
    fn list_returns_children_in_table_order() {
        let mut fs = create_test_fs();
        fs.create_file("/zeta", 3).unwrap();
        fs.create_dir("/alpha").unwrap();
        fs.create_file("/alpha/inner", 1).unwrap();
        fs.create_file("/mid", 7).unwrap();
        fs.delete("/zeta").unwrap();
        fs.create_file("/reused", 2).unwrap();

        let names: Vec<String> = fs.list("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["reused", "alpha", "mid"]);
        assert_eq!(
            fs.list("/alpha").unwrap(),
            vec![DirEntry {
                name: "inner".to_string(),
                kind: EntryKind::File,
                size: 1
            }]
        );
        assert_eq!(fs.list("/mid"), Err(FsError::NotADirectory("/mid".to_string())));
    }

    #[test]
    fn compact_slides_files_over_dead_blocks() {
        let mut fs = create_small_fs(8, 8);
        fs.create_file("/a", 32).unwrap();
        fs.create_file("/b", 20).unwrap();
        fs.create_file("/c", 16).unwrap();
        fs.write("/b", &[7; 20], 0).unwrap();
        fs.write("/c", b"0123456789abcdef", 0).unwrap();
        fs.delete("/a").unwrap();

        assert_eq!(fs.compact().unwrap(), 2);
        assert_eq!(fs.stat("/b").unwrap().start_block, 0);
        assert_eq!(fs.stat("/c").unwrap().start_block, 2);
        assert_eq!(fs.read_to_vec("/b", 20, 0).unwrap(), vec![7; 20]);
        assert_eq!(fs.read_to_vec("/c", 16, 0).unwrap(), b"0123456789abcdef".to_vec());
        assert_eq!(fs.statfs().free_blocks, 5);
        assert!(fs.check().is_ok());
    }

    #[test]
    fn check_detects_cycles_and_duplicates() {
        let mut fs = create_test_fs();
        fs.create_dir("/a").unwrap();
        fs.create_dir("/a/b").unwrap();
        assert!(fs.check().is_ok());

        fs.entries.get_mut(1).unwrap().parent = 2;
        assert!(matches!(fs.check(), Err(FsError::Inconsistent(_))));

        fs.entries.get_mut(1).unwrap().parent = ROOT_INDEX;
        fs.entries.get_mut(2).unwrap().parent = ROOT_INDEX;
        fs.entries.get_mut(2).unwrap().name = EntryName::new("a").unwrap();
        assert!(matches!(fs.check(), Err(FsError::Inconsistent(_))));
    }

    #[test]
    fn check_detects_overlapping_blocks() {
        let mut fs = create_small_fs(8, 8);
        fs.create_file("/a", 32).unwrap();
        fs.create_file("/b", 32).unwrap();

        fs.entries.get_mut(2).unwrap().start_block = 1;
        assert!(matches!(fs.check(), Err(FsError::Inconsistent(_))));
    }

    #[test]
    fn mount_fails_without_memory_and_unmount_returns_page() {
        let mut pmm = PageAllocator::with_bitmap_words(1, PAGE_SIZE);
        let fs = FileSystem::mount(&mut pmm, SuperBlock::default()).unwrap();
        assert_eq!(pmm.free_memory(), 0);

        assert!(matches!(
            FileSystem::mount(&mut pmm, SuperBlock::default()),
            Err(FsError::Alloc(AllocError::OutOfMemory))
        ));

        fs.unmount(&mut pmm).unwrap();
        assert_eq!(pmm.free_memory(), PAGE_SIZE);
    }

    #[test]
    fn create_rejects_mismatched_storage() {
        let sb = SuperBlockBuilder::new().with_fs_size(4096).build().unwrap();
        let arena = Arena::new(&sb);

        let result = FileSystem::create(arena, SuperBlock::default(), PhysAddr::new(0));
        assert!(matches!(result, Err(FsError::InvalidGeometry(_))));
    }

    #[test]
    fn mount_rejects_bad_geometry_without_taking_a_page() {
        let mut pmm = PageAllocator::with_bitmap_words(1, 4 * PAGE_SIZE);
        let bad = [
            SuperBlock { block_size: 0, blocks_count: 4, entries_count: 8 },
            SuperBlock { block_size: 512, blocks_count: 0, entries_count: 8 },
            SuperBlock { block_size: 512, blocks_count: 4, entries_count: 0 },
        ];

        for sb in bad.iter() {
            match FileSystem::mount(&mut pmm, *sb) {
                Err(FsError::InvalidGeometry(_)) => (),
                _ => assert!(false, "Unexpected mount result."),
            }
        }
        assert_eq!(pmm.free_memory(), 4 * PAGE_SIZE);
    }

    #[test]
    fn create_rejects_zero_entry_table() {
        let sb = SuperBlock { entries_count: 0, ..SuperBlock::default() };
        let result = FileSystem::create(Arena::new(&sb), sb, PhysAddr::new(0));
        assert!(matches!(result, Err(FsError::InvalidGeometry(_))));
    }

    #[test]
    fn error_codes_are_negative() {
        assert_eq!(FsError::NotFound("/x".to_string()).code(), -2);
        assert_eq!(FsError::from(AllocError::OutOfMemory).code(), -12);
        assert!(FsError::TableFull.code() < 0);
    }
}
