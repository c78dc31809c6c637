pub mod docker;
pub mod error;

use std::path::Path;

use async_trait::async_trait;

pub use docker::DockerSandbox;
pub use error::SandboxError;

/// An isolated, resource-capped execution environment for untrusted code.
///
/// Environments are addressed by the caller-assigned unique name passed to
/// [`Sandbox::create`]. The environment is exclusively owned by the worker
/// that created it for the duration of one submission's evaluation and must
/// be killed on every exit path.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Instantiate the environment: no network, all capabilities dropped, no
    /// privilege escalation, bounded process count, a single CPU, and
    /// symmetric memory/swap ceilings at `memory_limit_mb`. Removed
    /// automatically once it exits.
    async fn create(
        &self,
        image: &str,
        memory_limit_mb: u64,
        name: &str,
    ) -> Result<(), SandboxError>;

    async fn start(&self, name: &str) -> Result<(), SandboxError>;

    /// Copy a host file into the environment.
    async fn copy_in(&self, name: &str, source: &Path, dest: &str) -> Result<(), SandboxError>;

    /// Run a command to completion and return its stdout.
    ///
    /// With a time limit the command is wrapped in an external hard-timeout
    /// guard with a one-second kill-after grace window; the exit code then
    /// distinguishes a soft timeout from a forcible kill by the resource
    /// governor.
    async fn exec(
        &self,
        name: &str,
        command: &[&str],
        stdin: Option<&str>,
        time_limit_ms: Option<u64>,
    ) -> Result<String, SandboxError>;

    /// Tear the environment down. Failures are not retried here; retry
    /// policy belongs to the caller.
    async fn kill(&self, name: &str) -> Result<(), SandboxError>;
}
