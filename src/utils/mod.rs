// file: src/utils/mod.rs
// version: 2.0.0
// guid: 1e7c4a09-f5d2-4b83-9a6e-c03b8d21f7a5

//! Utility modules for local process execution

pub mod process;

pub use process::{run_checked, shell_quote};
