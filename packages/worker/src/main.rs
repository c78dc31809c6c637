use std::sync::Arc;

use anyhow::Context;
use common::event::LogBroadcaster;
use common::store::MemoryStore;
use mq::{MqConfig, init_mq};
use tracing::{error, info};

use worker::config::WorkerAppConfig;
use worker::consumer::JudgeConsumer;
use worker::sandbox::DockerSandbox;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = WorkerAppConfig::load().context("Failed to load config")?;
    info!("Judge worker starting: {}", config.worker.id);

    let queue = Arc::new(
        init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        .context("Failed to initialize MQ")?,
    );

    info!(
        queue_name = %config.mq.queue_name,
        batch_size = config.worker.batch_size,
        "MQ connected"
    );

    // Dev wiring: in-memory store and log-only broadcaster. Deployments
    // inject their persistence and fan-out implementations instead.
    let store = Arc::new(MemoryStore::new());
    let consumer = Arc::new(JudgeConsumer::new(
        DockerSandbox::new(config.worker.docker_bin.clone()),
        store.clone(),
        store,
        Arc::new(LogBroadcaster),
    ));

    let result = consumer
        .run(queue, &config.mq.queue_name, config.worker.batch_size)
        .await;

    if let Err(e) = result {
        error!(error = %e, "Worker stopped unexpectedly");
    }

    Ok(())
}
