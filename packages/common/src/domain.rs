use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::answer::{Answer, SubmissionStatus};

/// A contestant's code submission.
///
/// Owned by the persistence collaborator; the core reads it and requests
/// updates through [`crate::store::SubmissionStore`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i32,
    pub contest_id: i32,
    pub contestant_id: i32,
    pub problem_id: i32,
    /// Language key into the worker's language table (e.g., "cpp", "python").
    pub language: String,
    /// Source code content.
    pub code: String,
    pub status: SubmissionStatus,
    pub answer: Answer,
    pub created_at: DateTime<Utc>,
    /// Bumped by the store on every update; clients use it to discard stale
    /// pushes when merging optimistically.
    pub version: i64,
}

/// One input/expected-output pair of a problem's reference data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// A contest problem with its judging limits and reference test data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: i32,
    /// Ordinal letter shown on the scoreboard ("A", "B", ...).
    pub letter: String,
    pub title: String,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
    /// Ordered; judging runs them first to last.
    pub test_cases: Vec<TestCase>,
}

/// Contest-level behavior switches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestSettings {
    /// Whether submissions are judged automatically on arrival.
    pub auto_judge: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: i32,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// When set, the public leaderboard stops revealing new verdicts at this
    /// instant. Must be strictly after `start_at` and in the future at
    /// schedule time.
    pub auto_freeze_at: Option<DateTime<Utc>>,
    pub settings: ContestSettings,
}

impl Contest {
    /// Whether the public leaderboard projection is frozen at `now`.
    pub fn is_frozen_at(&self, now: DateTime<Utc>) -> bool {
        self.auto_freeze_at.is_some_and(|at| now >= at)
    }
}

/// A registered contest participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contestant {
    pub id: i32,
    pub name: String,
}

/// Record of one sandbox run of a submission.
///
/// Created once per judge attempt and immutable afterwards; reruns produce
/// new records rather than overwriting old ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub submission_id: i32,
    pub answer: Answer,
    /// Number of test cases in the problem's reference data.
    pub total_test_cases: u32,
    /// 1-based index of the last test case attempted. Equal to
    /// `total_test_cases` when all cases ran; smaller when judging stopped at
    /// a failing case.
    pub last_test_case: u32,
    /// Input fed to the last attempted case, kept for operator diagnostics.
    pub stdin: Option<String>,
    /// Output captured from the last attempted case.
    pub stdout: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_frozen_at_boundaries() {
        let freeze = Utc.with_ymd_and_hms(2026, 3, 1, 4, 0, 0).unwrap();
        let contest = Contest {
            id: 1,
            title: "Test Round".into(),
            start_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2026, 3, 1, 5, 0, 0).unwrap(),
            auto_freeze_at: Some(freeze),
            settings: ContestSettings::default(),
        };

        assert!(!contest.is_frozen_at(freeze - chrono::Duration::seconds(1)));
        assert!(contest.is_frozen_at(freeze));
        assert!(contest.is_frozen_at(freeze + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_no_freeze_configured() {
        let contest = Contest {
            id: 1,
            title: "Open Round".into(),
            start_at: Utc::now(),
            end_at: Utc::now(),
            auto_freeze_at: None,
            settings: ContestSettings::default(),
        };
        assert!(!contest.is_frozen_at(Utc::now()));
    }
}
