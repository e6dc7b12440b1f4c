//! Caller-contract violations.
//!
//! Everything else the kernel meets (out-of-range probabilities, unknown
//! keys, zero denominators) is recovered locally and never surfaces here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("population must be a positive finite number, got {0}")]
    InvalidPopulation(f64),

    #[error("measured week count must be non-negative, got {0}")]
    InvalidWeekCount(i32),

    #[error("run cancelled at week {week}")]
    Cancelled { week: u32 },
}
