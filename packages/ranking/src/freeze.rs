use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{error, info};

use common::domain::Contest;
use common::store::ContestStore;

use crate::error::RankingError;

/// Schedules the one-shot job that flips a contest into frozen-leaderboard
/// mode at its `auto_freeze_at` instant.
///
/// The fired job only flips the flag through the contest store; recomputing
/// and broadcasting standings is triggered by the next submission or an
/// explicit refresh from the surrounding system.
pub struct AutoFreezeScheduler {
    store: Arc<dyn ContestStore>,
    jobs: DashMap<i32, JoinHandle<()>>,
}

impl AutoFreezeScheduler {
    pub fn new(store: Arc<dyn ContestStore>) -> Self {
        Self {
            store,
            jobs: DashMap::new(),
        }
    }

    /// Schedule the freeze job for a contest. Replaces any pending job for
    /// the same contest.
    ///
    /// Fails fast, with no scheduling side effect, when the contest has no
    /// auto-freeze time or the time is not strictly in the future and after
    /// the contest start.
    pub fn schedule(&self, contest: &Contest) -> Result<(), RankingError> {
        let Some(freeze_at) = contest.auto_freeze_at else {
            return Err(RankingError::Validation(
                "contest has no auto-freeze time".into(),
            ));
        };
        let now = Utc::now();
        if freeze_at <= now {
            return Err(RankingError::Validation(
                "auto-freeze time must be strictly in the future".into(),
            ));
        }
        if freeze_at <= contest.start_at {
            return Err(RankingError::Validation(
                "auto-freeze time must be strictly after the contest start".into(),
            ));
        }

        let delay = (freeze_at - now).to_std().unwrap_or_default();
        let store = Arc::clone(&self.store);
        let contest_id = contest.id;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!(contest_id, "Auto-freeze fired");
            if let Err(e) = store.set_frozen(contest_id, true).await {
                error!(contest_id, error = %e, "Failed to flip contest into frozen mode");
            }
        });

        if let Some(previous) = self.jobs.insert(contest_id, handle) {
            previous.abort();
            info!(contest_id, "Replaced pending auto-freeze job");
        } else {
            info!(contest_id, freeze_at = %freeze_at, "Scheduled auto-freeze job");
        }

        Ok(())
    }

    /// Cancel the pending job for a contest. Safe no-op when none exists.
    pub fn cancel(&self, contest_id: i32) {
        match self.jobs.remove(&contest_id) {
            Some((_, handle)) => {
                handle.abort();
                info!(contest_id, "Cancelled auto-freeze job");
            }
            None => {
                info!(contest_id, "No pending auto-freeze job to cancel");
            }
        }
    }

    pub fn has_pending(&self, contest_id: i32) -> bool {
        self.jobs
            .get(&contest_id)
            .is_some_and(|handle| !handle.is_finished())
    }
}
