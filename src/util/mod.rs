// Utility Module
// File helpers used by the key store

pub mod file_ops;

pub use file_ops::{read_lines, write_atomic, FileLock};
