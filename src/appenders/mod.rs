//! Appender implementations

#[cfg(feature = "console")]
pub mod console;
pub mod file;
pub mod memory;
pub mod writer;

#[cfg(feature = "console")]
pub use console::ConsoleAppender;
pub use file::FileAppender;
pub use memory::MemoryAppender;
pub use writer::{SharedBuffer, WriterAppender};

pub use crate::core::Appender;
