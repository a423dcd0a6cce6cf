//! Analysis modules.
//!
//! Aggregation of validated records into pain points, and the text helpers
//! it shares with the analyzer.

pub mod aggregator;
pub mod text;

pub use aggregator::*;
