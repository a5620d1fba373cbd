//! Protocol module for central/external communication
//!
//! Defines the fixed wire message and the constants of the averaging
//! protocol. None of these are configurable: both ends must agree on them.

mod messages;

pub use messages::*;

/// Number of external peers taking part in every round
pub const NUM_EXTERNALS: usize = 4;

/// Weight of the central value in the central update
pub const CENTRAL_WEIGHT: f32 = 2.0;

/// Weight of an external's own value in its blend
pub const EXTERNAL_SELF_WEIGHT: f32 = 3.0;

/// Weight of the received central value in an external's blend
pub const EXTERNAL_CENTRAL_WEIGHT: f32 = 2.0;

/// Absolute tolerance of the stability test
pub const EPS: f32 = 1e-3;

/// Previous-round baseline before any round has run; far outside `EPS`
pub const BASELINE_SENTINEL: f32 = 1e9;

/// Largest temperature magnitude accepted anywhere in the protocol.
///
/// The central sums its doubled value and four reports, so each input must
/// stay below a sixth of `f32::MAX` for the aggregate to remain finite.
pub const MAX_TEMPERATURE: f32 = f32::MAX / 6.0;

/// Whether a temperature is finite and small enough to aggregate
pub fn is_valid_temperature(value: f32) -> bool {
    value.is_finite() && value.abs() <= MAX_TEMPERATURE
}

/// Raw tag of a central "keep going" broadcast
pub const UPDATE_MARKER: i32 = 0;

/// Raw tag of a central "stop" broadcast
pub const DONE_MARKER: i32 = -1;

/// Encoded size of one [`Message`] on the wire
pub const MESSAGE_SIZE: usize = 8;

/// Default TCP port of the central process
pub const DEFAULT_PORT: u16 = 2000;
