use std::io::Write;

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{info, warn};
use uuid::Uuid;

use common::Answer;
use common::domain::{Execution, Problem, Submission};

use crate::error::WorkerError;
use crate::languages::{self, LanguageSpec};
use crate::sandbox::{Sandbox, SandboxError};

/// Judging phase, used to map a generic command failure to the right answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Compile,
    Run,
}

/// Drives the sandbox across a problem's test cases and yields a verdict.
///
/// Every classified guest outcome (timeout, OOM kill, crash, mismatch)
/// becomes an [`Execution`]; only infrastructure failures propagate as
/// errors, so the queue's redelivery policy can retry them.
pub struct VerdictEvaluator<S: Sandbox> {
    sandbox: S,
}

impl<S: Sandbox> VerdictEvaluator<S> {
    pub fn new(sandbox: S) -> Self {
        Self { sandbox }
    }

    /// Judge a submission against its problem's reference data.
    pub async fn run(
        &self,
        submission: &Submission,
        problem: &Problem,
    ) -> Result<Execution, WorkerError> {
        let language = languages::find_language(&submission.language)
            .ok_or_else(|| WorkerError::UnsupportedLanguage(submission.language.clone()))?;

        let name = format!("judge-{}-{}", submission.id, Uuid::new_v4());
        self.sandbox
            .create(language.image, problem.memory_limit_mb, &name)
            .await?;

        let outcome = self
            .judge_in_container(&name, language, submission, problem)
            .await;

        // Teardown on every exit path. The container is created with
        // remove-on-exit, so the kill also releases its filesystem.
        if let Err(err) = self.sandbox.kill(&name).await {
            warn!(container = %name, error = %err, "Failed to kill judge container");
        }

        outcome
    }

    async fn judge_in_container(
        &self,
        name: &str,
        language: &LanguageSpec,
        submission: &Submission,
        problem: &Problem,
    ) -> Result<Execution, WorkerError> {
        self.sandbox.start(name).await?;

        let source = stage_source(&submission.code)?;
        self.sandbox
            .copy_in(name, source.path(), language.source_file)
            .await?;

        let total = problem.test_cases.len() as u32;

        if let Some(compile) = language.compile {
            if let Err(err) = self.sandbox.exec(name, compile, None, None).await {
                let (answer, output) = classify_failure(err, Phase::Compile)?;
                info!(
                    submission_id = submission.id,
                    answer = %answer,
                    "Build step failed"
                );
                return Ok(execution(submission.id, answer, total, 0, None, output));
            }
        }

        let mut last_input: Option<String> = None;
        let mut last_output: Option<String> = None;

        for (index, case) in problem.test_cases.iter().enumerate() {
            let case_no = index as u32 + 1;

            let stdout = match self
                .sandbox
                .exec(
                    name,
                    language.run,
                    Some(&case.input),
                    Some(problem.time_limit_ms),
                )
                .await
            {
                Ok(stdout) => stdout,
                Err(err) => {
                    let (answer, output) = classify_failure(err, Phase::Run)?;
                    info!(
                        submission_id = submission.id,
                        test_case = case_no,
                        answer = %answer,
                        "Test case failed"
                    );
                    return Ok(execution(
                        submission.id,
                        answer,
                        total,
                        case_no,
                        Some(case.input.clone()),
                        output,
                    ));
                }
            };

            if !compare_output(&stdout, &case.expected_output) {
                info!(
                    submission_id = submission.id,
                    test_case = case_no,
                    "Output mismatch"
                );
                return Ok(execution(
                    submission.id,
                    Answer::WrongAnswer,
                    total,
                    case_no,
                    Some(case.input.clone()),
                    Some(stdout),
                ));
            }

            last_input = Some(case.input.clone());
            last_output = Some(stdout);
        }

        info!(
            submission_id = submission.id,
            test_cases = total,
            "All test cases passed"
        );
        Ok(execution(
            submission.id,
            Answer::Accepted,
            total,
            total,
            last_input,
            last_output,
        ))
    }
}

fn execution(
    submission_id: i32,
    answer: Answer,
    total_test_cases: u32,
    last_test_case: u32,
    stdin: Option<String>,
    stdout: Option<String>,
) -> Execution {
    Execution {
        submission_id,
        answer,
        total_test_cases,
        last_test_case,
        stdin,
        stdout,
        created_at: Utc::now(),
    }
}

/// Map a classified sandbox outcome to an answer, or pass an infrastructure
/// failure through.
fn classify_failure(
    err: SandboxError,
    phase: Phase,
) -> Result<(Answer, Option<String>), WorkerError> {
    match err {
        SandboxError::Timeout => Ok((Answer::TimeLimitExceeded, None)),
        SandboxError::OomKilled => Ok((Answer::MemoryLimitExceeded, None)),
        SandboxError::Command { stdout, stderr, .. } => {
            let answer = match phase {
                Phase::Compile => Answer::CompilationError,
                Phase::Run => Answer::RuntimeError,
            };
            Ok((answer, Some(format!("{stderr}{stdout}"))))
        }
        infra => Err(WorkerError::Sandbox(infra)),
    }
}

fn stage_source(code: &str) -> Result<NamedTempFile, WorkerError> {
    let mut file = NamedTempFile::new().map_err(stage_error)?;
    file.write_all(code.as_bytes()).map_err(stage_error)?;
    file.flush().map_err(stage_error)?;
    Ok(file)
}

fn stage_error(err: std::io::Error) -> WorkerError {
    WorkerError::Sandbox(SandboxError::Execution(format!(
        "failed to stage source file: {err}"
    )))
}

/// Compare output: trim trailing whitespace per line, ignore trailing empty
/// lines.
pub fn compare_output(actual: &str, expected: &str) -> bool {
    let normalize = |s: &str| -> Vec<String> {
        let mut lines: Vec<String> = s.lines().map(|l| l.trim_end().to_string()).collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines
    };
    normalize(actual) == normalize(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use common::SubmissionStatus;
    use common::domain::TestCase;

    /// Sandbox double that replays a script of exec outcomes.
    #[derive(Default)]
    struct ScriptedSandbox {
        execs: Mutex<VecDeque<Result<String, SandboxError>>>,
        killed: AtomicBool,
        fail_create: bool,
    }

    impl ScriptedSandbox {
        fn with_execs(execs: Vec<Result<String, SandboxError>>) -> Self {
            Self {
                execs: Mutex::new(execs.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Sandbox for ScriptedSandbox {
        async fn create(&self, _: &str, _: u64, _: &str) -> Result<(), SandboxError> {
            if self.fail_create {
                return Err(SandboxError::Initialization("no docker daemon".into()));
            }
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
            self.killed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn submission(language: &str) -> Submission {
        Submission {
            id: 7,
            contest_id: 1,
            contestant_id: 2,
            problem_id: 3,
            language: language.into(),
            code: "print(input())".into(),
            status: SubmissionStatus::Judging,
            answer: Answer::NoAnswer,
            created_at: Utc::now(),
            version: 0,
        }
    }

    fn problem(cases: &[(&str, &str)]) -> Problem {
        Problem {
            id: 3,
            letter: "A".into(),
            title: "Echo".into(),
            time_limit_ms: 1000,
            memory_limit_mb: 256,
            test_cases: cases
                .iter()
                .map(|(input, expected)| TestCase {
                    input: (*input).into(),
                    expected_output: (*expected).into(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn accepted_when_all_cases_pass() {
        let sandbox = ScriptedSandbox::with_execs(vec![Ok("1\n".into()), Ok("2\n".into())]);
        let evaluator = VerdictEvaluator::new(sandbox);

        let execution = evaluator
            .run(&submission("python"), &problem(&[("1", "1"), ("2", "2")]))
            .await
            .unwrap();

        assert_eq!(execution.answer, Answer::Accepted);
        assert_eq!(execution.total_test_cases, 2);
        assert_eq!(execution.last_test_case, 2);
        assert!(evaluator.sandbox.killed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stops_at_first_mismatch() {
        let sandbox = ScriptedSandbox::with_execs(vec![
            Ok("1\n".into()),
            Ok("wrong\n".into()),
            Ok("3\n".into()),
        ]);
        let evaluator = VerdictEvaluator::new(sandbox);

        let execution = evaluator
            .run(
                &submission("python"),
                &problem(&[("1", "1"), ("2", "2"), ("3", "3")]),
            )
            .await
            .unwrap();

        assert_eq!(execution.answer, Answer::WrongAnswer);
        assert_eq!(execution.last_test_case, 2);
        assert_eq!(execution.stdin.as_deref(), Some("2"));
        assert_eq!(execution.stdout.as_deref(), Some("wrong\n"));
        // The third case never ran.
        assert_eq!(evaluator.sandbox.execs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn timeout_maps_to_time_limit_exceeded() {
        let sandbox = ScriptedSandbox::with_execs(vec![Err(SandboxError::Timeout)]);
        let evaluator = VerdictEvaluator::new(sandbox);

        let execution = evaluator
            .run(&submission("python"), &problem(&[("1", "1")]))
            .await
            .unwrap();

        assert_eq!(execution.answer, Answer::TimeLimitExceeded);
        assert_eq!(execution.last_test_case, 1);
    }

    #[tokio::test]
    async fn oom_kill_maps_to_memory_limit_exceeded() {
        let sandbox = ScriptedSandbox::with_execs(vec![Err(SandboxError::OomKilled)]);
        let evaluator = VerdictEvaluator::new(sandbox);

        let execution = evaluator
            .run(&submission("python"), &problem(&[("1", "1")]))
            .await
            .unwrap();

        assert_eq!(execution.answer, Answer::MemoryLimitExceeded);
    }

    #[tokio::test]
    async fn crash_during_run_maps_to_runtime_error() {
        let sandbox = ScriptedSandbox::with_execs(vec![Err(SandboxError::Command {
            code: 139,
            stdout: String::new(),
            stderr: "segfault".into(),
        })]);
        let evaluator = VerdictEvaluator::new(sandbox);

        let execution = evaluator
            .run(&submission("python"), &problem(&[("1", "1")]))
            .await
            .unwrap();

        assert_eq!(execution.answer, Answer::RuntimeError);
        assert_eq!(execution.stdout.as_deref(), Some("segfault"));
    }

    #[tokio::test]
    async fn compile_failure_maps_to_compilation_error() {
        // First exec is the cpp build step.
        let sandbox = ScriptedSandbox::with_execs(vec![Err(SandboxError::Command {
            code: 1,
            stdout: String::new(),
            stderr: "main.cpp:1: error".into(),
        })]);
        let evaluator = VerdictEvaluator::new(sandbox);

        let execution = evaluator
            .run(&submission("cpp"), &problem(&[("1", "1")]))
            .await
            .unwrap();

        assert_eq!(execution.answer, Answer::CompilationError);
        assert_eq!(execution.last_test_case, 0);
        assert_eq!(execution.total_test_cases, 1);
        assert_eq!(execution.stdout.as_deref(), Some("main.cpp:1: error"));
    }

    #[tokio::test]
    async fn infrastructure_failure_propagates_but_still_kills() {
        let sandbox = ScriptedSandbox::with_execs(vec![Err(SandboxError::Execution(
            "docker exec lost".into(),
        ))]);
        let evaluator = VerdictEvaluator::new(sandbox);

        let err = evaluator
            .run(&submission("python"), &problem(&[("1", "1")]))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Sandbox(_)));
        assert!(evaluator.sandbox.killed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unsupported_language_is_rejected() {
        let evaluator = VerdictEvaluator::new(ScriptedSandbox::default());
        let err = evaluator
            .run(&submission("cobol"), &problem(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_compare_output_exact() {
        assert!(compare_output("3\n", "3\n"));
    }

    #[test]
    fn test_compare_output_trailing_whitespace() {
        assert!(compare_output("3  \n", "3\n"));
    }

    #[test]
    fn test_compare_output_trailing_newlines() {
        assert!(compare_output("3\n\n\n", "3\n"));
    }

    #[test]
    fn test_compare_output_mismatch() {
        assert!(!compare_output("4\n", "3\n"));
    }
}
