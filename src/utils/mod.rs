//! Utility functions and helpers

pub mod fs;

pub use fs::write_file;
