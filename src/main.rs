use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = coursegate::GateConfig::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "coursegate",
        "coursegate starting: RUST_LOG='{}', http_port={}, demo={}, rate_window_secs={}, rate_max={}",
        rust_log, config.http_port, config.demo, config.rate_limit.window.as_secs(), config.rate_limit.max_requests
    );

    coursegate::server::run(config).await
}
