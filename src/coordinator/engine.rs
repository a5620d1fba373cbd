//! Central round engine
//!
//! Drives rounds until the system is stable:
//! collect from every external (barrier) → aggregate → decide → broadcast.

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channel::MessageChannel;
use crate::error::{Error, Result};
use crate::protocol::{
    is_valid_temperature, Message, Tag, BASELINE_SENTINEL, CENTRAL_WEIGHT, EPS, NUM_EXTERNALS,
};

// ─────────────────────────────────────────────────────────────────
// Round State
// ─────────────────────────────────────────────────────────────────

/// Where the central is within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for one report from every external
    #[default]
    Collecting,
    /// Computing the new central value
    Aggregating,
    /// Running the stability test
    Deciding,
    /// Sending the new central value, next round follows
    BroadcastingUpdate,
    /// Sending the final central value
    BroadcastingDone,
    /// Done was broadcast; no more rounds
    Terminated,
}

/// Result of one completed round
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundOutcome {
    /// Update was broadcast with this central value
    Continue { central: f32 },
    /// Done was broadcast with this final central value
    Converged { central: f32 },
}

/// What the central knows once the session has terminated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralSummary {
    /// Number of rounds run, including the terminating one
    pub rounds: u64,

    /// Central value sent with the done marker
    pub final_central: f32,

    /// External reports of the terminating round, by index
    pub final_externals: [f32; NUM_EXTERNALS],
}

// ─────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────

/// Owns the central value and the stability decision
#[derive(Debug, Clone)]
pub struct Coordinator {
    central: f32,
    previous: [f32; NUM_EXTERNALS],
    latest: [f32; NUM_EXTERNALS],
    round: u64,
    phase: Phase,
    max_rounds: Option<u64>,
}

impl Coordinator {
    /// Create a coordinator starting from the given central value
    pub fn new(initial_central: f32) -> Self {
        Self {
            central: initial_central,
            previous: [BASELINE_SENTINEL; NUM_EXTERNALS],
            latest: [BASELINE_SENTINEL; NUM_EXTERNALS],
            round: 0,
            phase: Phase::default(),
            max_rounds: None,
        }
    }

    /// Cap the number of rounds (0 = unbounded)
    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = if max_rounds == 0 { None } else { Some(max_rounds) };
        self
    }

    /// Current central value
    pub fn central(&self) -> f32 {
        self.central
    }

    /// Rounds started so far
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// External values observed in the previous completed round
    pub fn previous_externals(&self) -> &[f32; NUM_EXTERNALS] {
        &self.previous
    }

    /// Weighted average of the current central value and this round's reports
    pub fn aggregate(&self, externals: &[f32; NUM_EXTERNALS]) -> f32 {
        let sum: f32 = externals.iter().sum();
        (CENTRAL_WEIGHT * self.central + sum) / (CENTRAL_WEIGHT + NUM_EXTERNALS as f32)
    }

    /// Stable when every external and the central moved less than `EPS`.
    ///
    /// Externals are compared with the previous round's reports, not with
    /// the value just broadcast, so the test lags the broadcast by one round.
    pub fn is_stable(&self, externals: &[f32; NUM_EXTERNALS], new_central: f32) -> bool {
        let externals_stable = externals
            .iter()
            .zip(self.previous.iter())
            .all(|(current, previous)| (current - previous).abs() < EPS);
        let central_stable = (new_central - self.central).abs() < EPS;
        externals_stable && central_stable
    }

    /// Receive exactly one report from every channel, starting a new round.
    ///
    /// All channels are awaited together; the returned array is only built
    /// once every report is in. Values are placed by reported index and must
    /// be finite temperatures within range.
    pub async fn collect<C: MessageChannel>(
        &mut self,
        channels: &mut [C],
    ) -> Result<[f32; NUM_EXTERNALS]> {
        self.ensure_active()?;
        check_channel_count(channels)?;
        self.round += 1;
        self.phase = Phase::Collecting;

        let reports = try_join_all(channels.iter_mut().map(|channel| async move {
            let msg = channel.recv().await?;
            Ok::<_, Error>((channel.peer().to_string(), msg))
        }))
        .await?;

        let mut externals = [0.0f32; NUM_EXTERNALS];
        let mut seen = [false; NUM_EXTERNALS];

        for (peer, msg) in reports {
            let id = match msg.tag {
                Tag::External(id) => id,
                other => {
                    return Err(Error::UnexpectedTag {
                        peer,
                        tag: other.into(),
                    })
                }
            };
            if !is_valid_temperature(msg.value) {
                return Err(Error::InvalidTemperature {
                    peer,
                    value: msg.value,
                });
            }
            if seen[id.slot()] {
                return Err(Error::DuplicateExternal {
                    index: id.get(),
                    round: self.round,
                });
            }
            seen[id.slot()] = true;
            externals[id.slot()] = msg.value;
            debug!(round = self.round, external = %id, peer = %peer, value = msg.value, "Got report");
        }

        self.latest = externals;
        Ok(externals)
    }

    /// Run one full round over the given channels
    pub async fn run_round<C: MessageChannel>(&mut self, channels: &mut [C]) -> Result<RoundOutcome> {
        let externals = self.collect(channels).await?;

        self.phase = Phase::Aggregating;
        let new_central = self.aggregate(&externals);

        self.phase = Phase::Deciding;
        if self.is_stable(&externals, new_central) {
            self.phase = Phase::BroadcastingDone;
            broadcast(channels, Message::done(new_central)).await?;
            self.central = new_central;
            self.phase = Phase::Terminated;

            info!(round = self.round, central = new_central, "Stabilized");
            return Ok(RoundOutcome::Converged { central: new_central });
        }

        if let Some(max_rounds) = self.max_rounds {
            if self.round >= max_rounds {
                warn!(
                    round = self.round,
                    central = new_central,
                    "Round limit reached before stabilizing"
                );
                self.phase = Phase::BroadcastingDone;
                broadcast(channels, Message::done(new_central)).await?;
                self.central = new_central;
                self.phase = Phase::Terminated;
                return Err(Error::RoundLimitExceeded {
                    rounds: self.round,
                    central: new_central,
                });
            }
        }

        self.phase = Phase::BroadcastingUpdate;
        broadcast(channels, Message::update(new_central)).await?;

        debug!(
            round = self.round,
            previous = self.central,
            central = new_central,
            "Broadcast update"
        );

        self.central = new_central;
        self.previous = externals;
        self.phase = Phase::Collecting;

        Ok(RoundOutcome::Continue { central: new_central })
    }

    fn ensure_active(&self) -> Result<()> {
        if self.phase == Phase::Terminated {
            return Err(Error::Internal("central session already terminated".to_string()));
        }
        Ok(())
    }

    /// Run rounds until convergence
    pub async fn run<C: MessageChannel>(mut self, channels: &mut [C]) -> Result<CentralSummary> {
        check_channel_count(channels)?;
        info!(central = self.central, max_rounds = ?self.max_rounds, "Central session started");

        loop {
            match self.run_round(channels).await? {
                RoundOutcome::Continue { .. } => continue,
                RoundOutcome::Converged { central } => {
                    return Ok(CentralSummary {
                        rounds: self.round,
                        final_central: central,
                        final_externals: self.latest,
                    });
                }
            }
        }
    }
}

/// Send the same message to every external, in channel order
async fn broadcast<C: MessageChannel>(channels: &mut [C], msg: Message) -> Result<()> {
    for channel in channels.iter_mut() {
        channel.send(msg).await?;
    }
    Ok(())
}

fn check_channel_count<C>(channels: &[C]) -> Result<()> {
    if channels.len() != NUM_EXTERNALS {
        return Err(Error::ChannelCount {
            expected: NUM_EXTERNALS,
            actual: channels.len(),
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
