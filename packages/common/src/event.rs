use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::Submission;
use crate::error::JudgeError;

/// Events emitted by the judging core for the realtime fan-out collaborator.
///
/// The core only emits; the surrounding system picks the transport and the
/// commit ordering (deliver only after the triggering state change is
/// durably committed).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JudgeEvent {
    /// A submission's status or verdict changed. Scoped to the contest and to
    /// the owning contestant.
    SubmissionUpdated { submission: Submission },
    /// A contestant's leaderboard row changed. The row is carried as a
    /// generic payload so transports need not know the ranking types.
    LeaderboardUpdated {
        contest_id: i32,
        contestant_id: i32,
        row: serde_json::Value,
    },
}

impl JudgeEvent {
    /// Event topic, used as the fan-out routing key.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::SubmissionUpdated { .. } => "submission_updated",
            Self::LeaderboardUpdated { .. } => "leaderboard_updated",
        }
    }

    /// Contest the event is scoped to.
    pub fn contest_id(&self) -> i32 {
        match self {
            Self::SubmissionUpdated { submission } => submission.contest_id,
            Self::LeaderboardUpdated { contest_id, .. } => *contest_id,
        }
    }
}

/// Sink for events produced by the judging core.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, event: JudgeEvent) -> Result<(), JudgeError>;
}

/// Broadcaster that only logs events. Used by the dev binary and in tests.
#[derive(Debug, Default)]
pub struct LogBroadcaster;

#[async_trait]
impl Broadcaster for LogBroadcaster {
    async fn broadcast(&self, event: JudgeEvent) -> Result<(), JudgeError> {
        info!(
            topic = event.topic(),
            contest_id = event.contest_id(),
            "Broadcasting event"
        );
        Ok(())
    }
}
