//! External round engine
//!
//! Each round: report the current value, wait for the central's answer,
//! then either blend toward the received central value or stop.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channel::MessageChannel;
use crate::error::{Error, Result};
use crate::protocol::{
    ExternalId, Message, Tag, EXTERNAL_CENTRAL_WEIGHT, EXTERNAL_SELF_WEIGHT,
};

/// Where an external is within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// About to report the current value
    Sending,
    /// Report sent, blocked on the central's answer
    AwaitingResponse,
    /// Applying an update
    Updating,
    /// Done received; nothing more is sent
    Stopped,
}

/// Result of one round from the external's side
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Update applied; `external` is the new value
    Continue { external: f32, central: f32 },
    /// Done received with the final central value
    Stopped { final_central: f32 },
}

/// What an external knows once it has stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalSummary {
    pub index: ExternalId,
    pub rounds: u64,
    pub final_external: f32,
    pub final_central: f32,
}

/// One external peer and its temperature
#[derive(Debug, Clone)]
pub struct External {
    id: ExternalId,
    external: f32,
    rounds: u64,
    phase: Phase,
}

impl External {
    pub fn new(id: ExternalId, initial: f32) -> Self {
        Self {
            id,
            external: initial,
            rounds: 0,
            phase: Phase::Sending,
        }
    }

    pub fn id(&self) -> ExternalId {
        self.id
    }

    /// Current external value
    pub fn value(&self) -> f32 {
        self.external
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Blend of the own value and a received central value, weighted 3:2
    pub fn blend(&self, central: f32) -> f32 {
        (EXTERNAL_SELF_WEIGHT * self.external + EXTERNAL_CENTRAL_WEIGHT * central)
            / (EXTERNAL_SELF_WEIGHT + EXTERNAL_CENTRAL_WEIGHT)
    }

    /// Run one round: report, wait, act on the answer
    pub async fn step<C: MessageChannel>(&mut self, channel: &mut C) -> Result<StepOutcome> {
        if self.phase == Phase::Stopped {
            return Err(Error::Internal(format!("external {} already stopped", self.id)));
        }

        self.phase = Phase::Sending;
        channel.send(Message::report(self.id, self.external)).await?;
        self.rounds += 1;

        self.phase = Phase::AwaitingResponse;
        let reply = channel.recv().await?;

        match reply.tag {
            Tag::Done => {
                self.phase = Phase::Stopped;
                info!(
                    external = %self.id,
                    temperature = self.external,
                    central = reply.value,
                    rounds = self.rounds,
                    "Done"
                );
                Ok(StepOutcome::Stopped {
                    final_central: reply.value,
                })
            }
            tag => {
                if tag != Tag::Update {
                    warn!(external = %self.id, tag = %tag, "Unexpected tag from central, applying as update");
                }
                self.phase = Phase::Updating;
                let previous = self.external;
                self.external = self.blend(reply.value);
                debug!(
                    external = %self.id,
                    round = self.rounds,
                    central = reply.value,
                    previous,
                    temperature = self.external,
                    "Updated"
                );
                self.phase = Phase::Sending;
                Ok(StepOutcome::Continue {
                    external: self.external,
                    central: reply.value,
                })
            }
        }
    }

    /// Run rounds until the central sends done
    pub async fn run<C: MessageChannel>(mut self, channel: &mut C) -> Result<ExternalSummary> {
        info!(external = %self.id, temperature = self.external, peer = %channel.peer(), "External session started");

        loop {
            if let StepOutcome::Stopped { final_central } = self.step(channel).await? {
                return Ok(ExternalSummary {
                    index: self.id,
                    rounds: self.rounds,
                    final_external: self.external,
                    final_central,
                });
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::StreamChannel;

    fn id(index: u8) -> ExternalId {
        ExternalId::new(index).unwrap()
    }

    #[test]
    fn test_blend_exact() {
        let external = External::new(id(1), 0.0);
        assert_eq!(external.blend(10.0), 4.0);

        let external = External::new(id(2), 10.0);
        assert_eq!(external.blend(10.0), 10.0);
    }

    #[tokio::test]
    async fn test_update_then_done() {
        // Wire script: report 0 → update 10 → report 4 → done 7
        let mock = tokio_test::io::Builder::new()
            .write(&Message::report(id(2), 0.0).encode())
            .read(&Message::update(10.0).encode())
            .write(&Message::report(id(2), 4.0).encode())
            .read(&Message::done(7.0).encode())
            .build();
        let mut channel = StreamChannel::new(mock, "central");

        let summary = External::new(id(2), 0.0).run(&mut channel).await.unwrap();

        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.final_external, 4.0);
        assert_eq!(summary.final_central, 7.0);
    }

    #[tokio::test]
    async fn test_done_never_blends() {
        let mock = tokio_test::io::Builder::new()
            .write(&Message::report(id(1), 3.0).encode())
            .read(&Message::done(1000.0).encode())
            .build();
        let mut channel = StreamChannel::new(mock, "central");
        let mut external = External::new(id(1), 3.0);

        let outcome = external.step(&mut channel).await.unwrap();

        assert_eq!(outcome, StepOutcome::Stopped { final_central: 1000.0 });
        assert_eq!(external.value(), 3.0);
        assert_eq!(external.phase(), Phase::Stopped);
    }

    #[tokio::test]
    async fn test_stopped_external_sends_nothing() {
        let mock = tokio_test::io::Builder::new()
            .write(&Message::report(id(1), 3.0).encode())
            .read(&Message::done(3.0).encode())
            .build();
        let mut channel = StreamChannel::new(mock, "central");
        let mut external = External::new(id(1), 3.0);

        external.step(&mut channel).await.unwrap();
        assert!(matches!(
            external.step(&mut channel).await,
            Err(Error::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_tag_treated_as_update() {
        let mut reply = Message::update(10.0).encode();
        reply[4..].copy_from_slice(&7i32.to_le_bytes());

        let mock = tokio_test::io::Builder::new()
            .write(&Message::report(id(3), 0.0).encode())
            .read(&reply)
            .build();
        let mut channel = StreamChannel::new(mock, "central");
        let mut external = External::new(id(3), 0.0);

        let outcome = external.step(&mut channel).await.unwrap();
        assert_eq!(outcome, StepOutcome::Continue { external: 4.0, central: 10.0 });
    }

    #[tokio::test]
    async fn test_central_closing_is_fatal() {
        let (ours, theirs) = tokio::io::duplex(64);
        let mut channel = StreamChannel::new(ours, "central");

        let central = tokio::spawn(async move {
            let mut central = StreamChannel::new(theirs, "external 4");
            let report = central.recv().await.unwrap();
            assert_eq!(report, Message::report(id(4), 1.0));
            // close without answering
        });

        let result = External::new(id(4), 1.0).run(&mut channel).await;
        central.await.unwrap();

        assert!(matches!(result, Err(Error::ChannelClosed { .. })));
    }
}
