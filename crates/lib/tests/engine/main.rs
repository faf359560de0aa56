//! Engine integration tests.
//!
//! These drive units of work through the full pipeline against a real
//! filesystem and a file-backed history.

mod common;
mod skip_empty_tests;
mod up_to_date_tests;
