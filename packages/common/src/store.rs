use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::answer::{Answer, SubmissionStatus};
use crate::domain::{Contest, Contestant, Problem, Submission};
use crate::error::JudgeError;

/// Persistence collaborator for submissions.
///
/// The judging core never owns the data; it reads and requests updates
/// through this interface. Implementations back it with whatever the
/// surrounding system uses for storage.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Look up a submission by id.
    async fn find_submission(&self, id: i32) -> Result<Submission, JudgeError>;

    /// Persist a judging outcome: sets the answer, moves the status to
    /// Judged (or back to Judging when the answer is NoAnswer), and bumps the
    /// version. Writing NoAnswer without `force` is rejected as Forbidden;
    /// only the rerun reset may do that.
    async fn save_submission_answer(
        &self,
        id: i32,
        answer: Answer,
        force: bool,
    ) -> Result<Submission, JudgeError>;

    /// Atomically reset a submission to Judging/NoAnswer for a rerun.
    /// Fails with Forbidden when the submission is already Judging, so a
    /// submission is never evaluated by two workers concurrently.
    async fn mark_judging(&self, id: i32) -> Result<Submission, JudgeError>;

    /// Submissions of one contestant for one problem, ordered by creation
    /// time. Input of the leaderboard cell computation.
    async fn find_problem_submissions(
        &self,
        contest_id: i32,
        contestant_id: i32,
        problem_id: i32,
    ) -> Result<Vec<Submission>, JudgeError>;

    /// All submissions of a contest created at or after `since`, ordered by
    /// creation time. Used to replay verdicts hidden during a freeze.
    async fn find_contest_submissions_since(
        &self,
        contest_id: i32,
        since: DateTime<Utc>,
    ) -> Result<Vec<Submission>, JudgeError>;
}

/// Persistence collaborator for contest metadata.
#[async_trait]
pub trait ContestStore: Send + Sync {
    async fn find_contest(&self, id: i32) -> Result<Contest, JudgeError>;

    async fn find_problem(&self, id: i32) -> Result<Problem, JudgeError>;

    async fn find_contestant(&self, id: i32) -> Result<Contestant, JudgeError>;

    /// Flip the contest's public leaderboard projection in or out of frozen
    /// mode. Fired by the auto-freeze scheduler; clearing it is the
    /// operator's "reveal".
    async fn set_frozen(&self, contest_id: i32, frozen: bool) -> Result<(), JudgeError>;
}

#[derive(Default)]
struct MemoryState {
    submissions: HashMap<i32, Submission>,
    contests: HashMap<i32, Contest>,
    problems: HashMap<i32, Problem>,
    contestants: HashMap<i32, Contestant>,
    frozen: HashMap<i32, bool>,
}

/// In-memory store. Reference implementation of the store traits and the
/// test double used throughout the workspace.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_submission(&self, submission: Submission) {
        self.state
            .write()
            .await
            .submissions
            .insert(submission.id, submission);
    }

    pub async fn insert_contest(&self, contest: Contest) {
        self.state.write().await.contests.insert(contest.id, contest);
    }

    pub async fn insert_problem(&self, problem: Problem) {
        self.state.write().await.problems.insert(problem.id, problem);
    }

    pub async fn insert_contestant(&self, contestant: Contestant) {
        self.state
            .write()
            .await
            .contestants
            .insert(contestant.id, contestant);
    }

    pub async fn is_frozen(&self, contest_id: i32) -> bool {
        self.state
            .read()
            .await
            .frozen
            .get(&contest_id)
            .copied()
            .unwrap_or(false)
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn find_submission(&self, id: i32) -> Result<Submission, JudgeError> {
        self.state
            .read()
            .await
            .submissions
            .get(&id)
            .cloned()
            .ok_or_else(|| JudgeError::not_found("Submission", id))
    }

    async fn save_submission_answer(
        &self,
        id: i32,
        answer: Answer,
        force: bool,
    ) -> Result<Submission, JudgeError> {
        if answer == Answer::NoAnswer && !force {
            return Err(JudgeError::Forbidden(
                "cannot update a submission with NoAnswer".into(),
            ));
        }

        let mut state = self.state.write().await;
        let submission = state
            .submissions
            .get_mut(&id)
            .ok_or_else(|| JudgeError::not_found("Submission", id))?;

        submission.answer = answer;
        submission.status = if answer == Answer::NoAnswer {
            SubmissionStatus::Judging
        } else {
            SubmissionStatus::Judged
        };
        submission.version += 1;

        Ok(submission.clone())
    }

    async fn mark_judging(&self, id: i32) -> Result<Submission, JudgeError> {
        let mut state = self.state.write().await;
        let submission = state
            .submissions
            .get_mut(&id)
            .ok_or_else(|| JudgeError::not_found("Submission", id))?;

        if submission.status == SubmissionStatus::Judging {
            return Err(JudgeError::Forbidden(format!(
                "submission {id} is already being judged"
            )));
        }

        submission.status = SubmissionStatus::Judging;
        submission.answer = Answer::NoAnswer;
        submission.version += 1;

        Ok(submission.clone())
    }

    async fn find_problem_submissions(
        &self,
        contest_id: i32,
        contestant_id: i32,
        problem_id: i32,
    ) -> Result<Vec<Submission>, JudgeError> {
        let state = self.state.read().await;
        let mut submissions: Vec<Submission> = state
            .submissions
            .values()
            .filter(|s| {
                s.contest_id == contest_id
                    && s.contestant_id == contestant_id
                    && s.problem_id == problem_id
            })
            .cloned()
            .collect();
        submissions.sort_by_key(|s| (s.created_at, s.id));
        Ok(submissions)
    }

    async fn find_contest_submissions_since(
        &self,
        contest_id: i32,
        since: DateTime<Utc>,
    ) -> Result<Vec<Submission>, JudgeError> {
        let state = self.state.read().await;
        let mut submissions: Vec<Submission> = state
            .submissions
            .values()
            .filter(|s| s.contest_id == contest_id && s.created_at >= since)
            .cloned()
            .collect();
        submissions.sort_by_key(|s| (s.created_at, s.id));
        Ok(submissions)
    }
}

#[async_trait]
impl ContestStore for MemoryStore {
    async fn find_contest(&self, id: i32) -> Result<Contest, JudgeError> {
        self.state
            .read()
            .await
            .contests
            .get(&id)
            .cloned()
            .ok_or_else(|| JudgeError::not_found("Contest", id))
    }

    async fn find_problem(&self, id: i32) -> Result<Problem, JudgeError> {
        self.state
            .read()
            .await
            .problems
            .get(&id)
            .cloned()
            .ok_or_else(|| JudgeError::not_found("Problem", id))
    }

    async fn find_contestant(&self, id: i32) -> Result<Contestant, JudgeError> {
        self.state
            .read()
            .await
            .contestants
            .get(&id)
            .cloned()
            .ok_or_else(|| JudgeError::not_found("Contestant", id))
    }

    async fn set_frozen(&self, contest_id: i32, frozen: bool) -> Result<(), JudgeError> {
        self.state.write().await.frozen.insert(contest_id, frozen);
        Ok(())
    }
}
