//! Shared data types for the batchkit scheduler.
//!
//! Nothing in this crate executes work; it only describes tasks, runs and
//! the snapshots the scheduler reports while a batch is in flight.

mod domain;
pub use domain::*;
