//! bootrun - reboot-spanning hardware test runner
//!
//! Enrolls one test directory per scenario row, claims them one at a time
//! against the current boot, and moves each into the results root once the
//! operator has judged it. Every state change is a directory rename, so a
//! crash or reboot at any point leaves a state the next invocation can pick
//! up.

pub mod actions;
pub mod cli;
pub mod commands;
pub mod common;
pub mod lifecycle;
pub mod menu;
pub mod report;
pub mod responses;
pub mod runner;
pub mod scenario;
pub mod system;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use runner::{CycleOutcome, Runner};
