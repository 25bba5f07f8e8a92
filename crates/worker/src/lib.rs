//! `autorun-worker` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod engine;
pub mod registry;
pub mod retry;
pub mod tasks;
