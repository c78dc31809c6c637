use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::error::SandboxError;
use super::Sandbox;

/// Exit code of the timeout guard when the soft deadline passes.
const SOFT_TIMEOUT_EXIT: i32 = 124;
/// 128 + SIGTERM: the guard's own kill-after window.
const SIGTERM_EXIT: i32 = 143;
/// 128 + SIGKILL: forcible kill. After the grace period this is the resource
/// governor, not the timeout guard.
const SIGKILL_EXIT: i32 = 137;

/// Grace window between the soft deadline and the forcible kill, seconds.
const KILL_AFTER_SECS: u64 = 1;

/// Allocation-failure marker emitted by the guest runtime when it catches the
/// out-of-memory condition itself and exits with code 1 instead of dying to a
/// kill signal. Observed for one guest runtime's allocator message; known not
/// to generalize to every language.
const OOM_MARKER: &str = "out of memory";

/// Docker-backed sandbox. Drives the `docker` CLI through subprocesses; one
/// container per judged submission, addressed by its unique name.
#[derive(Debug, Clone)]
pub struct DockerSandbox {
    bin: String,
}

impl DockerSandbox {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn docker(&self, args: &[&str]) -> Result<std::process::Output, SandboxError> {
        debug!(args = ?args, "Running docker command");
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| SandboxError::Execution(format!("failed to execute docker: {err}")))
    }
}

/// Classify an exec exit into the typed sandbox outcome.
///
/// Exit code 1 additionally requires sniffing the captured output for the
/// guest runtime's allocation-failure marker, because an allocator that gives
/// up cleanly raises an application-level exit with no kill signal at all.
fn classify_exit(code: i32, stdout: &str, stderr: &str) -> SandboxError {
    match code {
        SOFT_TIMEOUT_EXIT | SIGTERM_EXIT => SandboxError::Timeout,
        SIGKILL_EXIT => SandboxError::OomKilled,
        1 if contains_oom_marker(stderr) || contains_oom_marker(stdout) => SandboxError::OomKilled,
        _ => SandboxError::Command {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        },
    }
}

fn contains_oom_marker(text: &str) -> bool {
    text.to_lowercase().contains(OOM_MARKER)
}

/// Seconds argument for the timeout guard: `time_limit_ms / 1000`.
fn guard_seconds(time_limit_ms: u64) -> String {
    format!("{}", time_limit_ms as f64 / 1000.0)
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn create(
        &self,
        image: &str,
        memory_limit_mb: u64,
        name: &str,
    ) -> Result<(), SandboxError> {
        let memory = format!("{memory_limit_mb}m");
        let args = [
            "create",
            "--rm",
            "--network",
            "none",
            "--cap-drop",
            "ALL",
            "--security-opt",
            "no-new-privileges",
            "--pids-limit",
            "64",
            "--cpus",
            "1",
            "--memory",
            memory.as_str(),
            "--memory-swap",
            memory.as_str(),
            "--name",
            name,
            image,
            // Keep the container alive so commands can be exec'd into it.
            "sleep",
            "infinity",
        ];

        let output = self.docker(&args).await?;
        if !output.status.success() {
            return Err(SandboxError::Initialization(format!(
                "docker create failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<(), SandboxError> {
        let output = self.docker(&["start", name]).await?;
        if !output.status.success() {
            return Err(SandboxError::Initialization(format!(
                "docker start failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn copy_in(&self, name: &str, source: &Path, dest: &str) -> Result<(), SandboxError> {
        let source = source.to_string_lossy();
        let target = format!("{name}:{dest}");
        let output = self.docker(&["cp", &*source, target.as_str()]).await?;
        if !output.status.success() {
            return Err(SandboxError::Execution(format!(
                "docker cp failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn exec(
        &self,
        name: &str,
        command: &[&str],
        stdin: Option<&str>,
        time_limit_ms: Option<u64>,
    ) -> Result<String, SandboxError> {
        let mut args: Vec<&str> = vec!["exec", "-i", name];
        let kill_after = KILL_AFTER_SECS.to_string();
        let seconds;
        if let Some(limit) = time_limit_ms {
            seconds = guard_seconds(limit);
            args.extend(["timeout", "-k", kill_after.as_str(), seconds.as_str()]);
        }
        args.extend(command);

        debug!(container = name, args = ?args, "Executing in sandbox");

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| SandboxError::Execution(format!("failed to spawn docker exec: {err}")))?;

        if let Some(input) = stdin {
            let mut handle = child
                .stdin
                .take()
                .ok_or_else(|| SandboxError::Execution("stdin handle unavailable".into()))?;
            handle.write_all(input.as_bytes()).await.map_err(|err| {
                SandboxError::Execution(format!("failed to write guest stdin: {err}"))
            })?;
            // Dropping the handle closes the pipe so the guest sees EOF.
            drop(handle);
        } else {
            drop(child.stdin.take());
        }

        let output = child.wait_with_output().await.map_err(|err| {
            SandboxError::Execution(format!("failed to collect docker exec output: {err}"))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        match output.status.code() {
            Some(0) => Ok(stdout),
            Some(code) => Err(classify_exit(code, &stdout, &stderr)),
            None => Err(SandboxError::Execution(
                "docker exec terminated by signal".into(),
            )),
        }
    }

    async fn kill(&self, name: &str) -> Result<(), SandboxError> {
        // The container was created with remove-on-exit, so the kill also
        // releases its filesystem.
        let output = self.docker(&["kill", name]).await?;
        if !output.status.success() {
            return Err(SandboxError::Execution(format!(
                "docker kill failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
