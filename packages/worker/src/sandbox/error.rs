use thiserror::Error;

/// Typed outcome of a sandbox operation. Callers never see raw exit codes;
/// classification happens once, at the process boundary.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Environment initialization failed: {0}")]
    Initialization(String),

    /// The guest command hit the soft time ceiling.
    #[error("command timed out")]
    Timeout,

    /// The guest was forcibly killed by the resource governor, or its
    /// runtime reported an allocation failure itself.
    #[error("command killed by the memory governor")]
    OomKilled,

    /// Unclassified non-zero exit, carrying diagnostics for the operator.
    #[error("command failed with exit code {code}: {stderr}")]
    Command {
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("execution error: {0}")]
    Execution(String),
}
