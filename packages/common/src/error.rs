use thiserror::Error;

/// Shared error taxonomy of the judging core.
///
/// `NotFound` and `Forbidden` are business outcomes: the former is fatal for
/// the current operation (the queue's redelivery policy decides what happens
/// next), the latter marks an invalid state transition the caller must not
/// blindly retry.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Evaluation infrastructure failure (sandbox creation, file staging).
    /// Propagated to the queue so its backoff policy governs retry.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),
}

impl JudgeError {
    pub fn not_found(entity: &str, id: i32) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }
}
