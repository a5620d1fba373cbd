//! External peer module
//!
//! An external owns one temperature, reports it to the central every round
//! and blends toward the central's answer until told to stop.

mod engine;

pub use engine::*;
