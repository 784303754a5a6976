// file: src/cli/mod.rs
// version: 2.0.0
// guid: 5a1c7e93-b0d4-4f28-8e6a-d2f91c3b07e5

//! Command line interface for the installer

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
pub use commands::*;
