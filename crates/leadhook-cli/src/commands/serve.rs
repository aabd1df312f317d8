use leadhook_core::config::LeadhookConfig;
use std::path::Path;

pub async fn run(config_path: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leadhook_server=debug,leadhook_core=debug".into()),
        )
        .init();

    let path = Path::new(config_path);
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", config_path);
    }

    let config = LeadhookConfig::load(path)?;
    tracing::info!(
        "Starting Leadhook '{}' for site '{}' on port {}",
        config.instance.name,
        config.instance.site,
        config.instance.port
    );

    leadhook_server::run_server(config).await
}
