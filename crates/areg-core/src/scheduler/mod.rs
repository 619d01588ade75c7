//! Batch scheduler.
//!
//! Runs items in consecutive fixed-size batches. Every item of a batch runs as its own
//! task; the next batch starts only after all of them settled, and after a fixed pause
//! that bounds the sustained request rate.

mod batch;

pub use batch::{run_batches, BatchPlan, BatchReport, Settled};
