use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a submission during the judging lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SubmissionStatus {
    /// Queued or currently being evaluated by a worker.
    Judging,
    /// Evaluation finished and produced an answer.
    Judged,
    /// Judging could not be completed after the queue exhausted its retries.
    Failed,
}

impl SubmissionStatus {
    /// Returns true if judging is complete (successfully or not).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Judging)
    }

    /// All possible status values.
    pub const ALL: &'static [SubmissionStatus] = &[Self::Judging, Self::Judged, Self::Failed];

    /// Returns the string representation (PascalCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Judging => "Judging",
            Self::Judged => "Judged",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::Judging
    }
}

/// Verdict assigned to a submission once it has been judged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Answer {
    /// Not judged yet, or judging was reset by a rerun.
    NoAnswer,
    /// All test cases passed.
    Accepted,
    /// Output did not match expected output.
    WrongAnswer,
    /// Exceeded the problem's time limit.
    TimeLimitExceeded,
    /// Killed by the memory governor or the guest allocator gave up.
    MemoryLimitExceeded,
    /// Program exited with a non-zero code while running a test case.
    RuntimeError,
    /// Failed to compile.
    CompilationError,
}

impl Answer {
    /// Returns true if this is a successful verdict.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Returns true if the submission has been judged at all.
    pub fn is_judged(&self) -> bool {
        !matches!(self, Self::NoAnswer)
    }

    /// All possible answer values.
    pub const ALL: &'static [Answer] = &[
        Self::NoAnswer,
        Self::Accepted,
        Self::WrongAnswer,
        Self::TimeLimitExceeded,
        Self::MemoryLimitExceeded,
        Self::RuntimeError,
        Self::CompilationError,
    ];

    /// Returns the string representation (PascalCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAnswer => "NoAnswer",
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "WrongAnswer",
            Self::TimeLimitExceeded => "TimeLimitExceeded",
            Self::MemoryLimitExceeded => "MemoryLimitExceeded",
            Self::RuntimeError => "RuntimeError",
            Self::CompilationError => "CompilationError",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Answer {
    fn default() -> Self {
        Self::NoAnswer
    }
}

/// Error when parsing an invalid answer string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnswerError {
    invalid: String,
}

impl fmt::Display for ParseAnswerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid answer '{}'. Valid values: {}",
            self.invalid,
            Answer::ALL
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseAnswerError {}

impl FromStr for Answer {
    type Err = ParseAnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Answer::ALL
            .iter()
            .find(|a| a.as_str() == s)
            .copied()
            .ok_or_else(|| ParseAnswerError {
                invalid: s.to_string(),
            })
    }
}

impl FromStr for SubmissionStatus {
    type Err = ParseAnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmissionStatus::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ParseAnswerError {
                invalid: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_serde_roundtrip() {
        for answer in Answer::ALL {
            let json = serde_json::to_string(answer).unwrap();
            let parsed: Answer = serde_json::from_str(&json).unwrap();
            assert_eq!(*answer, parsed);
        }
    }

    #[test]
    fn test_status_serde_roundtrip() {
        for status in SubmissionStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            let parsed: SubmissionStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(*status, parsed);
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Accepted".parse::<Answer>().unwrap(), Answer::Accepted);
        assert_eq!(
            "Judging".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Judging
        );
        assert!("Invalid".parse::<Answer>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SubmissionStatus::Judging.is_terminal());
        assert!(SubmissionStatus::Judged.is_terminal());
        assert!(SubmissionStatus::Failed.is_terminal());
    }
}
