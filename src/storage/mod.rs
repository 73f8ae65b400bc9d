//! Persistence of the success record.
//!
//! The engine writes through the `ResultSink` trait and never reads the
//! record back.

mod sink;

pub use sink::{JsonFileSink, MemorySink, ResultSink};
