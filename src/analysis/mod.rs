//! Analysis modules.
//!
//! Counting of module loads and the batch driver that feeds it.

pub mod aggregator;
pub mod batch;

pub use batch::{run_batch, BatchOptions};
