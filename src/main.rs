use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use hls_edge::server::services::{ProxyServices, upstream_services::UpstreamClient};
use hls_edge::{
    AppConfig, ApplicationServer, DynSourceRegistry, FileSourceRegistry, Logger, RedisDatabase,
    RedisSourceRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Arc::new(AppConfig::parse());

    // init logger and sentry, guards are kept alive to flush logs and maintain sentry connection
    let _guards = Logger::init(config.cargo_env, config.sentry_dsn.clone());

    info!("logger and env prepped...");

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("metrics recorder not installed, /metrics is disabled: {}", e);
            None
        }
    };

    // redis wins if both are set, the file is for local runs
    let registry: DynSourceRegistry = match (&config.registry_redis_url, &config.registry_file) {
        (Some(redis_url), _) => {
            info!("connecting to the registry redis...");
            let redis = RedisDatabase::connect(redis_url)
                .await
                .context("registry redis is unreachable")?;
            Arc::new(RedisSourceRegistry::new(
                Arc::new(redis),
                config.registry_config_key.clone(),
            ))
        }
        (None, Some(path)) => {
            info!("reading sources from {}", path);
            Arc::new(FileSourceRegistry::new(path))
        }
        (None, None) => anyhow::bail!("set REGISTRY_REDIS_URL or REGISTRY_FILE"),
    };

    let upstream = UpstreamClient::new()?;
    let services = ProxyServices::new(config.clone(), registry, upstream);

    info!("registry ok, starting proxy server...");

    ApplicationServer::serve(config, services, metrics)
        .await
        .context("proxy server failed to start")?;

    Ok(())
}
