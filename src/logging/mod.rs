// file: src/logging/mod.rs
// version: 2.0.0
// guid: 91c3e6b8-0f2a-4d57-8e4c-a6d1b7f9203e

//! Logging setup for the installer

pub mod logger;

pub use logger::{init_json_logger, init_logger, with_async_operation_span};
