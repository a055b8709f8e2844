use std::sync::Arc;

use anyhow::Context;

use prospect_agent::config::{find_config_path, load_config};
use prospect_agent::enrichment::JinaReader;
use prospect_agent::inference::HttpCompletionClient;
use prospect_agent::server::{serve, AppState, Principals};
use prospect_agent::usage::TracingUsageSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("cannot resolve the working directory")?;
    let config_path = find_config_path(&cwd)?;
    let config = load_config(&config_path)?;

    let log_file = prospect_agent::init_tracing(config.server.log_dir().as_deref())
        .context("failed to open the log file")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        log_file = ?log_file,
        pid = std::process::id(),
        "=== prospect-agent starting ==="
    );

    let retry = config.retry.policy();
    let completion = HttpCompletionClient::new(config.models.clone(), retry)
        .context("failed to build the completion client")?;
    let principals = Principals::from_config(&config.auth, &config.platform, retry)
        .context("failed to build platform clients")?;
    let reader = JinaReader::new(&config.enrichment, retry)
        .context("failed to build the website reader")?;
    tracing::info!(
        principals = principals.len(),
        chat_model = %config.models.chat_model,
        json_model = %config.models.json_model,
        "services configured"
    );

    let state = AppState::new(
        &config,
        Arc::new(completion),
        Arc::new(TracingUsageSink),
        principals,
    )
    .with_reader(Arc::new(reader));
    serve(&config.server.bind, state)
        .await
        .with_context(|| format!("server on {} failed", config.server.bind))
}
