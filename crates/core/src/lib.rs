//! Canonical job model for the automation worker.
//!
//! Everything in this crate is pure: no I/O, no clocks except where a
//! timestamp is passed in. The store and worker crates build on these
//! types.

pub mod error;
pub mod job;
pub mod normalize;
pub mod outcome;
pub mod status;
pub mod types;
pub mod update;
