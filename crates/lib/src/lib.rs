//! stint-lib: incremental execution of units of work
//!
//! This crate decides, for each unit of work, whether it has to run at all:
//! - `fingerprint`: content fingerprints of inputs, snapshots of outputs
//! - `history`: the state recorded by the last execution of each identity
//! - `steps`: the pipeline that skips empty or up-to-date work and runs the rest
//! - `engine`: the facade assembling the pipeline
//! - `cleanup`: removal of stale outputs the build owns
//! - `workspace`: per-identity directories, leased one execution at a time

pub mod cleanup;
pub mod consts;
pub mod engine;
pub mod execution;
pub mod fingerprint;
pub mod history;
pub mod platform;
pub mod steps;
pub mod util;
pub mod work;
pub mod workspace;
