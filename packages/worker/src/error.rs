use common::JudgeError;
use thiserror::Error;

use crate::sandbox::SandboxError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Evaluation infrastructure failure: sandbox creation, file staging.
    /// Classified guest outcomes never surface here; the evaluator maps them
    /// to answers.
    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Judge(#[from] JudgeError),

    #[error("MQ error: {0}")]
    Mq(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

impl From<mq::MqError> for WorkerError {
    fn from(e: mq::MqError) -> Self {
        WorkerError::Mq(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
