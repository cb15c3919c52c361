//! Data layer for adstats.
//!
//! Discovers and reads raw archive dumps, runs the normalize-and-fold batch
//! over them and writes the resulting per-party reports.

pub mod accumulator;
pub mod pipeline;
pub mod reader;
pub mod writer;
