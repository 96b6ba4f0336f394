use std::fmt;

use log::{debug, info, warn};
use thiserror::Error;

/// Size in bytes of one physical page tracked by the allocator.
pub const PAGE_SIZE: u64 = 4096;

/// Number of bitmap words. Each 32-bit word tracks 32 pages, so the default
/// bitmap covers 32768 * 32 pages, or 4 GiB of physical memory.
pub const BITMAP_WORDS: usize = 32768;

const WORD_BITS: usize = 32;
const WORD_FULL: u32 = u32::MAX;

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// A physical address handed out by the page allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(u64);

impl PhysAddr {
    pub const fn new(addr: u64) -> Self {
        PhysAddr(addr)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Index of the page containing this address.
    pub const fn page_index(self) -> usize {
        (self.0 / PAGE_SIZE) as usize
    }

    pub const fn is_page_aligned(self) -> bool {
        self.0 % PAGE_SIZE == 0
    }

    fn from_page_index(index: usize) -> Self {
        PhysAddr(index as u64 * PAGE_SIZE)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum AllocError {
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("address {0} is not page aligned")]
    Misaligned(PhysAddr),
    #[error("address {0} is outside the managed range")]
    OutOfRange(PhysAddr),
    #[error("page at {0} is not allocated")]
    DoubleFree(PhysAddr),
    #[error("page at {0} backs the mounted file system")]
    Pinned(PhysAddr),
}

impl AllocError {
    /// Negative errno-style status for callers using the signed result
    /// convention.
    pub fn code(&self) -> i32 {
        match self {
            AllocError::OutOfMemory => -12,
            AllocError::Misaligned(_) => -22,
            AllocError::OutOfRange(_) => -14,
            AllocError::DoubleFree(_) => -114,
            AllocError::Pinned(_) => -16,
        }
    }
}

/// Page ownership bitmap. Bit `n` of word `w` maps to page `w * 32 + n`; a set
/// bit means the page is in use.
#[derive(Debug)]
pub struct Bitmap {
    words: Box<[u32]>,
}

impl Bitmap {
    /// Creates a bitmap of `words` words with every page marked used.
    pub fn new(words: usize) -> Self {
        Self {
            words: vec![WORD_FULL; words].into_boxed_slice(),
        }
    }

    /// Total number of pages the bitmap can track.
    pub fn capacity(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    pub fn get(&self, pagenr: usize) -> State {
        assert!(pagenr < self.capacity());
        let word = self.words[pagenr / WORD_BITS];
        let inner_offset = pagenr % WORD_BITS;
        match (word >> inner_offset) & 0b1 {
            0 => State::Free,
            _ => State::Used,
        }
    }

    pub fn set_reserved(&mut self, pagenr: usize) {
        assert!(pagenr < self.capacity());
        self.words[pagenr / WORD_BITS] |= 0b1_u32 << (pagenr % WORD_BITS);
    }

    pub fn set_free(&mut self, pagenr: usize) {
        assert!(pagenr < self.capacity());
        self.words[pagenr / WORD_BITS] &= !(0b1_u32 << (pagenr % WORD_BITS));
    }

    /// Marks every page as used.
    pub fn fill(&mut self) {
        for word in self.words.iter_mut() {
            *word = WORD_FULL;
        }
    }

    /// Returns the index of the first free page, scanning words in order and
    /// then bits within the first word that has a clear bit.
    pub fn first_free(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|&(_, &word)| word != WORD_FULL)
            .map(|(i, &word)| i * WORD_BITS + (!word).trailing_zeros() as usize)
    }

    pub fn count_free(&self) -> usize {
        self.words.iter().map(|word| word.count_zeros() as usize).sum()
    }
}

/// First-fit physical page allocator over a fixed-size bitmap.
///
/// Every allocation is exactly one page, so there are no size classes and no
/// coalescing. Pages past the range given to [`PageAllocator::init`] stay
/// marked as used for the allocator's lifetime.
#[derive(Debug)]
pub struct PageAllocator {
    bitmap: Bitmap,
    /// Byte count of the manageable physical range, as requested at init.
    total_memory: u64,
}

impl PageAllocator {
    /// Creates an allocator with the default bitmap capacity and initializes
    /// it over `total_bytes` of memory.
    pub fn new(total_bytes: u64) -> Self {
        Self::with_bitmap_words(BITMAP_WORDS, total_bytes)
    }

    /// Creates an allocator with a bitmap of `words` 32-bit words.
    pub fn with_bitmap_words(words: usize, total_bytes: u64) -> Self {
        let mut allocator = Self {
            bitmap: Bitmap::new(words),
            total_memory: 0,
        };
        allocator.init(total_bytes);
        allocator
    }

    /// Resets the bitmap so that exactly `floor(total_bytes / PAGE_SIZE)`
    /// low pages are free, capped at the bitmap's capacity.
    pub fn init(&mut self, total_bytes: u64) {
        info!("PMM: initializing over {:#x} bytes", total_bytes);
        self.total_memory = total_bytes;
        self.bitmap.fill();

        let requested = (total_bytes / PAGE_SIZE) as usize;
        let pages = requested.min(self.bitmap.capacity());
        if pages < requested {
            warn!(
                "PMM: bitmap tracks {:#x} pages, {:#x} requested; capping",
                pages, requested
            );
        }
        for page in 0..pages {
            self.bitmap.set_free(page);
        }
        info!("PMM: {:#x} pages available", pages);
    }

    pub fn allocate_page(&mut self) -> Result<PhysAddr, AllocError> {
        let page = self.bitmap.first_free().ok_or(AllocError::OutOfMemory)?;
        self.bitmap.set_reserved(page);
        let addr = PhysAddr::from_page_index(page);
        debug!("PMM: allocated page at {}", addr);
        Ok(addr)
    }

    /// Returns a page to the allocator. The address must be page aligned,
    /// inside the bitmap, and currently allocated.
    pub fn free_page(&mut self, addr: PhysAddr) -> Result<(), AllocError> {
        if !addr.is_page_aligned() {
            warn!("PMM: refusing to free misaligned address {}", addr);
            return Err(AllocError::Misaligned(addr));
        }
        let page = addr.page_index();
        if page >= self.usable_pages() {
            warn!("PMM: refusing to free out of range address {}", addr);
            return Err(AllocError::OutOfRange(addr));
        }
        if let State::Free = self.bitmap.get(page) {
            warn!("PMM: refusing to double free {}", addr);
            return Err(AllocError::DoubleFree(addr));
        }
        self.bitmap.set_free(page);
        debug!("PMM: freed page at {}", addr);
        Ok(())
    }

    pub fn is_allocated(&self, addr: PhysAddr) -> bool {
        let page = addr.page_index();
        page < self.usable_pages() && self.bitmap.get(page) == State::Used
    }

    /// Free memory in bytes. This rescans the whole bitmap on every call.
    pub fn free_memory(&self) -> u64 {
        self.bitmap.count_free() as u64 * PAGE_SIZE
    }

    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }

    /// Number of pages that init released to the allocator.
    pub fn usable_pages(&self) -> usize {
        ((self.total_memory / PAGE_SIZE) as usize).min(self.bitmap.capacity())
    }

    /// Number of usable pages currently handed out.
    pub fn used_pages(&self) -> usize {
        self.usable_pages() - self.bitmap.count_free()
    }
}
