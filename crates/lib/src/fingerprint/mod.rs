//! Fingerprint model.
//!
//! Content fingerprints of file inputs, snapshots of value inputs, and
//! snapshots of output locations. These are the values compared against the
//! execution history to decide whether a unit of work must run.
//!
//! # Submodules
//!
//! - [`fingerprinter`] - Visiting and fingerprinting declared inputs
//! - [`snapshot`] - Recorded shape of output locations

pub mod fingerprinter;
pub mod snapshot;
mod types;

pub use fingerprinter::{
  FileValueSupplier, FingerprintResult, InputFingerprinter, InputPropertyType, InputVisitor, ValueSupplier, union,
};
pub use snapshot::{FileSystemSnapshot, SnapshotEntry};
pub use types::*;
