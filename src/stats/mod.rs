//! Queue metrics module.
//!
//! Turns raw backend counters into per-queue rates for the dashboard.

mod aggregate;
mod normalize;

pub use aggregate::*;
pub use normalize::*;
