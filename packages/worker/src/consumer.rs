use std::sync::Arc;
use std::time::Instant;

use mq::{BroccoliError, BrokerMessage, Mq};
use tracing::{error, info};

use common::JudgeError;
use common::domain::Submission;
use common::event::{Broadcaster, JudgeEvent};
use common::judge_task::JudgeTask;
use common::store::{ContestStore, SubmissionStore};
use ranking::{CellUpdate, compute_cell};

use crate::error::WorkerError;
use crate::evaluator::VerdictEvaluator;
use crate::metrics::JudgeMetrics;
use crate::sandbox::Sandbox;

/// Pulls judge work from the queue, drives the evaluator, and reports the
/// outcome back to the surrounding system.
///
/// Messages for different submissions are independent; per-submission
/// exclusivity comes from the queue's visibility lock plus the rerun rule in
/// [`request_rerun`]. Evaluation errors propagate so the queue's own
/// redelivery and backoff policy governs retry; there is no retry loop here.
pub struct JudgeConsumer<S: Sandbox> {
    evaluator: VerdictEvaluator<S>,
    submissions: Arc<dyn SubmissionStore>,
    contests: Arc<dyn ContestStore>,
    broadcaster: Arc<dyn Broadcaster>,
    pub metrics: Arc<JudgeMetrics>,
}

impl<S: Sandbox + 'static> JudgeConsumer<S> {
    pub fn new(
        sandbox: S,
        submissions: Arc<dyn SubmissionStore>,
        contests: Arc<dyn ContestStore>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            evaluator: VerdictEvaluator::new(sandbox),
            submissions,
            contests,
            broadcaster,
            metrics: Arc::new(JudgeMetrics::new()),
        }
    }

    /// Handle one queue message.
    pub async fn on_message(&self, task: &JudgeTask) -> Result<(), WorkerError> {
        self.metrics.received.inc();

        let submission = self.submissions.find_submission(task.submission_id).await?;
        let problem = self.contests.find_problem(submission.problem_id).await?;

        let started = Instant::now();
        match self.evaluator.run(&submission, &problem).await {
            Ok(execution) => {
                self.metrics.run_time.record(started.elapsed());
                self.metrics.succeeded.inc(execution.answer);

                let updated = self
                    .submissions
                    .save_submission_answer(submission.id, execution.answer, false)
                    .await?;
                self.broadcast_updates(task, &updated).await?;

                info!(
                    submission_id = submission.id,
                    trace_id = %task.trace_id,
                    answer = %execution.answer,
                    last_test_case = execution.last_test_case,
                    total_test_cases = execution.total_test_cases,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Judged submission"
                );
                Ok(())
            }
            Err(err) => {
                self.metrics.failed.inc();
                error!(
                    submission_id = task.submission_id,
                    trace_id = %task.trace_id,
                    error = %err,
                    "Judging failed"
                );
                Err(err)
            }
        }
    }

    /// Emit the updated submission and the contestant's refreshed
    /// leaderboard cell to the broadcast collaborator.
    async fn broadcast_updates(
        &self,
        task: &JudgeTask,
        submission: &Submission,
    ) -> Result<(), WorkerError> {
        self.broadcaster
            .broadcast(JudgeEvent::SubmissionUpdated {
                submission: submission.clone(),
            })
            .await?;

        let contest = self.contests.find_contest(task.contest_id).await?;
        let pair = self
            .submissions
            .find_problem_submissions(contest.id, submission.contestant_id, submission.problem_id)
            .await?;
        let cell = compute_cell(&contest, submission.problem_id, &pair);
        let update = CellUpdate {
            contestant_id: submission.contestant_id,
            cell,
        };
        let row = serde_json::to_value(&update)
            .map_err(|e| JudgeError::Broadcast(format!("failed to encode row update: {e}")))?;

        self.broadcaster
            .broadcast(JudgeEvent::LeaderboardUpdated {
                contest_id: contest.id,
                contestant_id: submission.contestant_id,
                row,
            })
            .await?;

        Ok(())
    }

    /// Consume the judge queue until the connection drops.
    ///
    /// `concurrency` bounds how many messages are processed in parallel.
    pub async fn run(
        self: Arc<Self>,
        queue: Arc<Mq>,
        queue_name: &str,
        concurrency: usize,
    ) -> Result<(), WorkerError> {
        info!(queue = %queue_name, concurrency, "Starting judge consumer");

        let consumer = Arc::clone(&self);
        queue
            .process_messages(
                queue_name,
                Some(concurrency),
                None,
                move |message: BrokerMessage<JudgeTask>| {
                    let consumer = Arc::clone(&consumer);
                    async move {
                        let task = message.payload;
                        consumer
                            .on_message(&task)
                            .await
                            .map_err(|e| BroccoliError::Job(e.to_string()))
                    }
                },
            )
            .await
            .map_err(|e| WorkerError::Mq(e.to_string()))
    }
}

/// Reset a submission for another judging round and return the task to
/// enqueue.
///
/// Rejected with Forbidden while the submission is already being judged, so
/// the same submission is never evaluated by two workers concurrently. The
/// check-and-set is the store's, so it holds under concurrent requests.
pub async fn request_rerun(
    store: &dyn SubmissionStore,
    submission_id: i32,
) -> Result<JudgeTask, WorkerError> {
    let submission = store.mark_judging(submission_id).await?;
    info!(
        submission_id,
        version = submission.version,
        "Submission reset for rerun"
    );
    Ok(JudgeTask::new(submission.id, submission.contest_id))
}

/// Reset a submission and publish the judge task to the queue.
pub async fn rerun(
    store: &dyn SubmissionStore,
    queue: &Mq,
    queue_name: &str,
    submission_id: i32,
) -> Result<JudgeTask, WorkerError> {
    let task = request_rerun(store, submission_id).await?;
    queue
        .publish(queue_name, None, &task, None)
        .await
        .map_err(|e| WorkerError::Mq(e.to_string()))?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use common::domain::{Contest, ContestSettings, Contestant, Problem, TestCase};
    use common::store::MemoryStore;
    use common::{Answer, SubmissionStatus};

    use crate::sandbox::SandboxError;

    #[derive(Default)]
    struct ScriptedSandbox {
        execs: Mutex<VecDeque<Result<String, SandboxError>>>,
    }

    #[async_trait]
    impl Sandbox for ScriptedSandbox {
        async fn create(&self, _: &str, _: u64, _: &str) -> Result<(), SandboxError> {
            Ok(())
        }
        async fn start(&self, _: &str) -> Result<(), SandboxError> {
            Ok(())
        }
        async fn copy_in(&self, _: &str, _: &Path, _: &str) -> Result<(), SandboxError> {
            Ok(())
        }
        async fn exec(
            &self,
            _: &str,
            _: &[&str],
            _: Option<&str>,
            _: Option<u64>,
        ) -> Result<String, SandboxError> {
            self.execs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(String::new()))
        }
        async fn kill(&self, _: &str) -> Result<(), SandboxError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBroadcaster {
        events: Mutex<Vec<JudgeEvent>>,
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(&self, event: JudgeEvent) -> Result<(), JudgeError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let start = Utc::now() - Duration::hours(1);

        store
            .insert_contest(Contest {
                id: 1,
                title: "Test Round".into(),
                start_at: start,
                end_at: start + Duration::hours(5),
                auto_freeze_at: None,
                settings: ContestSettings { auto_judge: true },
            })
            .await;
        store
            .insert_problem(Problem {
                id: 3,
                letter: "A".into(),
                title: "Echo".into(),
                time_limit_ms: 1000,
                memory_limit_mb: 256,
                test_cases: vec![TestCase {
                    input: "1".into(),
                    expected_output: "1".into(),
                }],
            })
            .await;
        store
            .insert_contestant(Contestant {
                id: 2,
                name: "alice".into(),
            })
            .await;
        store
            .insert_submission(common::domain::Submission {
                id: 7,
                contest_id: 1,
                contestant_id: 2,
                problem_id: 3,
                language: "python".into(),
                code: "print(input())".into(),
                status: SubmissionStatus::Judging,
                answer: Answer::NoAnswer,
                created_at: start + Duration::minutes(10),
                version: 0,
            })
            .await;

        store
    }

    fn consumer_with(
        sandbox: ScriptedSandbox,
        store: Arc<MemoryStore>,
        broadcaster: Arc<RecordingBroadcaster>,
    ) -> JudgeConsumer<ScriptedSandbox> {
        JudgeConsumer::new(sandbox, store.clone(), store, broadcaster)
    }

    #[tokio::test]
    async fn successful_judging_persists_and_broadcasts() {
        let store = seeded_store().await;
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let sandbox = ScriptedSandbox {
            execs: Mutex::new(VecDeque::from([Ok("1\n".into())])),
        };
        let consumer = consumer_with(sandbox, store.clone(), broadcaster.clone());

        consumer.on_message(&JudgeTask::new(7, 1)).await.unwrap();

        let submission = store.find_submission(7).await.unwrap();
        assert_eq!(submission.status, SubmissionStatus::Judged);
        assert_eq!(submission.answer, Answer::Accepted);
        assert_eq!(submission.version, 1);

        let events = broadcaster.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].topic(), "submission_updated");
        assert_eq!(events[1].topic(), "leaderboard_updated");

        assert_eq!(consumer.metrics.received.get(), 1);
        assert_eq!(consumer.metrics.succeeded.get(Answer::Accepted), 1);
        assert_eq!(consumer.metrics.failed.get(), 0);
        assert_eq!(consumer.metrics.run_time.count(), 1);
    }

    #[tokio::test]
    async fn missing_submission_propagates_not_found() {
        let store = seeded_store().await;
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let consumer = consumer_with(ScriptedSandbox::default(), store, broadcaster.clone());

        let err = consumer.on_message(&JudgeTask::new(99, 1)).await.unwrap_err();

        assert!(matches!(err, WorkerError::Judge(JudgeError::NotFound(_))));
        assert_eq!(consumer.metrics.received.get(), 1);
        assert!(broadcaster.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn infrastructure_failure_counts_and_reraises() {
        let store = seeded_store().await;
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let sandbox = ScriptedSandbox {
            execs: Mutex::new(VecDeque::from([Err(SandboxError::Execution(
                "daemon gone".into(),
            ))])),
        };
        let consumer = consumer_with(sandbox, store.clone(), broadcaster.clone());

        let err = consumer.on_message(&JudgeTask::new(7, 1)).await.unwrap_err();

        assert!(matches!(err, WorkerError::Sandbox(_)));
        assert_eq!(consumer.metrics.failed.get(), 1);
        assert!(broadcaster.events.lock().unwrap().is_empty());

        // The submission keeps its judging state; redelivery will retry.
        let submission = store.find_submission(7).await.unwrap();
        assert_eq!(submission.status, SubmissionStatus::Judging);
    }

    #[tokio::test]
    async fn rerun_is_forbidden_while_judging() {
        let store = seeded_store().await;

        let err = request_rerun(store.as_ref(), 7).await.unwrap_err();
        assert!(matches!(err, WorkerError::Judge(JudgeError::Forbidden(_))));
    }

    #[tokio::test]
    async fn rerun_resets_a_judged_submission() {
        let store = seeded_store().await;
        store
            .save_submission_answer(7, Answer::WrongAnswer, false)
            .await
            .unwrap();

        let task = request_rerun(store.as_ref(), 7).await.unwrap();
        assert_eq!(task.submission_id, 7);
        assert_eq!(task.contest_id, 1);

        let submission = store.find_submission(7).await.unwrap();
        assert_eq!(submission.status, SubmissionStatus::Judging);
        assert_eq!(submission.answer, Answer::NoAnswer);
    }
}
