use std::fmt;

use crate::sb::MAX_NAME_LEN;

/// Index of the root directory in the entry table.
pub const ROOT_INDEX: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  File,
  Directory,
}

impl fmt::Display for EntryKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EntryKind::File => f.write_str("FILE"),
      EntryKind::Directory => f.write_str("DIR"),
    }
  }
}

/// A name stored inline in its entry, like the fixed-width name field of a
/// kernel table slot. Callers validate the length before storing.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryName {
  bytes: [u8; MAX_NAME_LEN],
  len: u8,
}

impl EntryName {
  const EMPTY: EntryName = EntryName {
    bytes: [0; MAX_NAME_LEN],
    len: 0,
  };

  /// Copies `name` into a fixed buffer. Returns `None` if it does not fit.
  pub fn new(name: &str) -> Option<Self> {
    if name.len() > MAX_NAME_LEN {
      return None;
    }
    let mut entry_name = Self::EMPTY;
    entry_name.bytes[..name.len()].copy_from_slice(name.as_bytes());
    entry_name.len = name.len() as u8;
    Some(entry_name)
  }

  pub fn as_str(&self) -> &str {
    // Only ever filled from a &str, and never truncated mid-character.
    std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
  }
}

impl fmt::Debug for EntryName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self.as_str(), f)
  }
}

/// One slot in the filesystem's entry table.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
  /// Unique among the entries sharing `parent`.
  pub name: EntryName,
  pub kind: EntryKind,
  /// Index of the containing directory. The root is its own parent.
  pub parent: usize,
  /// First arena block of a file's data. Zero for directories.
  pub start_block: u32,
  /// Logical file size in bytes. Zero for directories.
  pub size: u32,
  /// A cleared slot is free for reuse and its other fields are meaningless.
  pub in_use: bool,
}

impl Entry {
  const FREE: Entry = Entry {
    name: EntryName::EMPTY,
    kind: EntryKind::File,
    parent: ROOT_INDEX,
    start_block: 0,
    size: 0,
    in_use: false,
  };

  fn root() -> Self {
    Self {
      name: EntryName::EMPTY,
      kind: EntryKind::Directory,
      parent: ROOT_INDEX,
      start_block: 0,
      size: 0,
      in_use: true,
    }
  }

  pub fn is_dir(&self) -> bool {
    self.kind == EntryKind::Directory
  }
}

/// Child lookups over the entry table. Path resolution, listing and the
/// deletion guard only go through this trait, so the table's linear scan can
/// be replaced by a hashed or sorted index without touching them.
pub trait DirectoryIndex {
  /// Index of the in-use child of `dir` called `name`.
  fn find_child(&self, dir: usize, name: &str) -> Option<usize>;
  /// Indices of every in-use child of `dir`, in index order.
  fn children(&self, dir: usize) -> Vec<usize>;

  fn has_children(&self, dir: usize) -> bool {
    !self.children(dir).is_empty()
  }
}

/// Fixed-capacity table of entries. Slot 0 always holds the root directory.
pub struct EntryTable {
  entries: Box<[Entry]>,
}

impl EntryTable {
  /// Creates a table of `capacity` slots with the root installed.
  pub fn new(capacity: usize) -> Self {
    debug_assert!(capacity > 0);
    let mut entries = vec![Entry::FREE; capacity].into_boxed_slice();
    entries[ROOT_INDEX] = Entry::root();
    Self { entries }
  }

  pub fn capacity(&self) -> usize {
    self.entries.len()
  }

  pub fn get(&self, index: usize) -> Option<&Entry> {
    self.entries.get(index).filter(|entry| entry.in_use)
  }

  pub fn get_mut(&mut self, index: usize) -> Option<&mut Entry> {
    self.entries.get_mut(index).filter(|entry| entry.in_use)
  }

  /// First free slot in index order.
  pub fn free_slot(&self) -> Option<usize> {
    self.entries.iter().position(|entry| !entry.in_use)
  }

  /// Stores `entry` in the free slot at `index`.
  pub fn insert(&mut self, index: usize, entry: Entry) {
    debug_assert!(!self.entries[index].in_use);
    self.entries[index] = Entry {
      in_use: true,
      ..entry
    };
  }

  /// Clears the slot at `index`. The root cannot be removed.
  pub fn remove(&mut self, index: usize) {
    debug_assert!(index != ROOT_INDEX);
    self.entries[index].in_use = false;
  }

  /// Every in-use entry with its index, in index order.
  pub fn iter(&self) -> impl Iterator<Item = (usize, &Entry)> {
    self
      .entries
      .iter()
      .enumerate()
      .filter(|(_, entry)| entry.in_use)
  }

  pub fn live_count(&self) -> usize {
    self.iter().count()
  }
}

impl DirectoryIndex for EntryTable {
  fn find_child(&self, dir: usize, name: &str) -> Option<usize> {
    self
      .iter()
      .find(|(i, entry)| *i != ROOT_INDEX && entry.parent == dir && entry.name.as_str() == name)
      .map(|(i, _)| i)
  }

  fn children(&self, dir: usize) -> Vec<usize> {
    self
      .iter()
      .filter(|(i, entry)| *i != ROOT_INDEX && entry.parent == dir)
      .map(|(i, _)| i)
      .collect()
  }

  fn has_children(&self, dir: usize) -> bool {
    self
      .iter()
      .any(|(i, entry)| i != ROOT_INDEX && entry.parent == dir)
  }
}
