//! Glue that owns the page allocator and the mounted filesystem, boots them in
//! order and hands their operations to a frontend.

use log::{info, warn};
use thiserror::Error;

use crate::alloc::{AllocError, PageAllocator, PhysAddr, BITMAP_WORDS};
use crate::fs::{FileSystem, FsError};
use crate::io::Arena;
use crate::sb::SuperBlock;

/// Default amount of physical memory handed to the page allocator (128 MiB).
pub const DEFAULT_MEM_SIZE: u64 = 128 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelConfig {
    /// Bytes of physical memory the page allocator manages.
    pub mem_size: u64,
    /// Capacity of the allocator bitmap in 32-bit words.
    pub bitmap_words: usize,
    pub fs: SuperBlock,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            mem_size: DEFAULT_MEM_SIZE,
            bitmap_words: BITMAP_WORDS,
            fs: SuperBlock::default(),
        }
    }
}

impl KernelConfig {
    pub fn with_mem_size(mut self, mem_size: u64) -> Self {
        self.mem_size = mem_size;
        self
    }

    pub fn with_bitmap_words(mut self, words: usize) -> Self {
        self.bitmap_words = words;
        self
    }

    pub fn with_fs(mut self, fs: SuperBlock) -> Self {
        self.fs = fs;
        self
    }
}

#[derive(Error, Debug)]
pub enum BootError {
    #[error("failed to mount file system")]
    Mount(#[source] FsError),
}

/// A failed unmount. The allocator is handed back so its state survives.
#[derive(Error, Debug)]
#[error("failed to unmount file system")]
pub struct ShutdownError {
    #[source]
    pub source: FsError,
    pub pmm: PageAllocator,
}

/// Physical memory usage as reported by the allocator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_pages: usize,
}

/// A booted system: the page allocator plus the filesystem it backs.
pub struct Kernel {
    pmm: PageAllocator,
    fs: FileSystem<Arena>,
}

/// A kernel behind a single lock for hosts with more than one thread.
pub type SharedKernel = spin::Mutex<Kernel>;

impl Kernel {
    /// Initializes the page allocator, then mounts the filesystem on a page
    /// taken from it.
    pub fn boot(config: KernelConfig) -> Result<Self, BootError> {
        info!("Initializing Physical Memory Manager...");
        let mut pmm = PageAllocator::with_bitmap_words(config.bitmap_words, config.mem_size);
        info!("Total memory: {:#018X} bytes", pmm.total_memory());
        info!("Free memory: {:#018X} bytes", pmm.free_memory());

        let fs = FileSystem::mount(&mut pmm, config.fs).map_err(BootError::Mount)?;
        info!("FS: file system initialized");
        Ok(Kernel { pmm, fs })
    }

    pub fn into_shared(self) -> SharedKernel {
        spin::Mutex::new(self)
    }

    pub fn fs(&self) -> &FileSystem<Arena> {
        &self.fs
    }

    pub fn fs_mut(&mut self) -> &mut FileSystem<Arena> {
        &mut self.fs
    }

    pub fn pmm(&self) -> &PageAllocator {
        &self.pmm
    }

    pub fn allocate_page(&mut self) -> Result<PhysAddr, AllocError> {
        self.pmm.allocate_page()
    }

    /// Frees a page taken with [`Kernel::allocate_page`]. The page backing
    /// the mounted filesystem stays held until [`Kernel::shutdown`].
    pub fn free_page(&mut self, addr: PhysAddr) -> Result<(), AllocError> {
        if addr == self.fs.backing_page() {
            warn!("Kernel: refusing to free file system page {}", addr);
            return Err(AllocError::Pinned(addr));
        }
        self.pmm.free_page(addr)
    }

    pub fn meminfo(&self) -> MemInfo {
        MemInfo {
            total_bytes: self.pmm.total_memory(),
            free_bytes: self.pmm.free_memory(),
            used_pages: self.pmm.used_pages(),
        }
    }

    /// Unmounts the filesystem and hands back the allocator, on failure too.
    pub fn shutdown(self) -> Result<PageAllocator, ShutdownError> {
        let Kernel { mut pmm, fs } = self;
        match fs.unmount(&mut pmm) {
            Ok(()) => {
                info!("Kernel: shut down");
                Ok(pmm)
            }
            Err(source) => Err(ShutdownError { source, pmm }),
        }
    }
}

/// Folds a filesystem result into the signed convention used by shell
/// frontends: a byte count or zero on success, a negative code on failure.
pub fn status(result: Result<usize, FsError>) -> isize {
    match result {
        Ok(count) => count as isize,
        Err(err) => err.code() as isize,
    }
}
