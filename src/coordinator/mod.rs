//! Central coordinator module
//!
//! Owns the central temperature and drives the round protocol:
//! - Barrier collection of one report per external
//! - Weighted aggregation and the stability test
//! - Update / done broadcasts

mod engine;

pub use engine::*;
