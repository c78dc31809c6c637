use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::MqAppConfig;

/// Worker-specific configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Unique identifier for this worker instance. Default: "judge-worker-1".
    #[serde(default = "default_worker_id")]
    pub id: String,
    /// Number of queue messages processed in parallel. Default: 8.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Docker executable path. Default: "docker".
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
}

fn default_worker_id() -> String {
    "judge-worker-1".into()
}
fn default_batch_size() -> usize {
    8
}
fn default_docker_bin() -> String {
    "docker".into()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            id: default_worker_id(),
            batch_size: default_batch_size(),
            docker_bin: default_docker_bin(),
        }
    }
}

/// Worker application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerAppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
}

impl WorkerAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("GAVEL_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("worker.id", "judge-worker-1")?
            .set_default("worker.batch_size", 8_i64)?
            .set_default("worker.docker_bin", "docker")?
            .set_default("mq.url", "redis://localhost:6379")?
            .set_default("mq.pool_size", 5_i64)?
            .set_default("mq.queue_name", "judge_tasks")?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("GAVEL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
