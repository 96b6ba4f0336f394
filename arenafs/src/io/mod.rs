mod arena;
mod block;
mod console;

pub use arena::Arena;
pub use block::{BlockNumber, BlockStorage, StorageError};
pub use console::{Console, ConsoleLogger, WriteConsole};
