//! tempsync - iterative temperature averaging between a central process
//! and four external processes
//!
//! Each round every external reports its temperature, the central folds
//! the four reports into a weighted average and either broadcasts the new
//! central value or, once nothing is moving any more, tells everyone to stop.

pub mod channel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod peer;
pub mod protocol;
pub mod report;
pub mod simulate;
pub mod transport;
pub mod version;

pub use error::{Error, Result};
