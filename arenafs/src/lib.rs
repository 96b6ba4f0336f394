//! The memory and storage core of a small kernel: a first-fit physical page
//! allocator over a fixed bitmap, and a path-addressed filesystem that lives
//! entirely in one memory arena.
//!
//! ```no_run
//! use arenafs::{EntryKind, Kernel, KernelConfig};
//!
//! let mut kernel = Kernel::boot(KernelConfig::default()).unwrap();
//! let fs = kernel.fs_mut();
//! fs.create_dir("/etc").unwrap();
//! fs.create_entry("/etc/motd", 64, EntryKind::File).unwrap();
//! fs.write("/etc/motd", b"welcome", 0).unwrap();
//! ```
pub mod alloc;
pub mod fs;
pub mod io;
pub mod node;
pub mod path;
pub mod sb;
pub mod session;

pub use crate::alloc::{AllocError, PageAllocator, PhysAddr, PAGE_SIZE};
pub use crate::fs::{DirEntry, FileSystem, FsError, FsStats, Metadata};
pub use crate::node::EntryKind;
pub use crate::sb::{SuperBlock, SuperBlockBuilder};
pub use crate::session::{
    status, BootError, Kernel, KernelConfig, MemInfo, SharedKernel, ShutdownError,
};
