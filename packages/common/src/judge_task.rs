use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Core trait for all MQ messages.
pub trait Message: Serialize + Clone + Send + Sync {
    fn message_type() -> &'static str
    where
        Self: Sized;

    fn message_id(&self) -> &str;
}

/// A judge work message published to the worker queue.
///
/// Redelivery policy (backoff, max attempts, dead-lettering) is owned by the
/// queue infrastructure, not by the consumer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JudgeTask {
    pub submission_id: i32,
    pub contest_id: i32,
    /// Correlation id carried across services for tracing.
    pub trace_id: String,
    /// Redelivery count as reported by the queue, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

impl JudgeTask {
    /// Create a new task with a generated trace id.
    pub fn new(submission_id: i32, contest_id: i32) -> Self {
        Self {
            submission_id,
            contest_id,
            trace_id: Uuid::new_v4().to_string(),
            retries: None,
        }
    }
}

impl Message for JudgeTask {
    fn message_type() -> &'static str {
        "judge_task"
    }

    fn message_id(&self) -> &str {
        &self.trace_id
    }
}
