pub mod api;
pub mod dtos;
pub mod error;
pub mod extractors;
pub mod services;
pub mod utils;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{Extension, Router, extract::Request, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use once_cell::sync::Lazy;
use tokio::net::TcpListener;
use tower::{Layer, ServiceBuilder};
use tower_http::{normalize_path::NormalizePathLayer, trace::TraceLayer};
use tracing::info;

use crate::config::AppConfig;
use api::{health_controller::health_endpoint, proxy_controller::ProxyController};
use extractors::PROXY_PREFIX;
use services::ProxyServices;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub fn get_uptime_seconds() -> u64 {
    START_TIME.elapsed().as_secs()
}

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct ApplicationServer;

impl ApplicationServer {
    /// every route with its layers, no listener. tests drive this directly
    pub fn router(services: ProxyServices, metrics: Option<PrometheusHandle>) -> Router {
        let mut router = Router::new()
            .nest(PROXY_PREFIX, ProxyController::app())
            .route("/health", get(health_endpoint));

        // only there when the recorder could be installed
        if let Some(handle) = metrics {
            router = router.route(
                "/metrics",
                get(move || {
                    let handle = handle.clone();
                    async move { handle.render() }
                }),
            );
        }

        router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(services)),
        )
    }

    pub async fn serve(
        config: Arc<AppConfig>,
        services: ProxyServices,
        metrics: Option<PrometheusHandle>,
    ) -> anyhow::Result<()> {
        Lazy::force(&START_TIME);

        // has to wrap the router from the outside or the path is normalized after routing
        let app = NormalizePathLayer::trim_trailing_slash().layer(Self::router(services, metrics));

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!("proxy listening on {}", addr);

        axum::serve(
            listener,
            axum::ServiceExt::<Request>::into_make_service(app),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with an error")?;

        info!("proxy shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        // never resolve, the process gets killed the hard way instead
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, draining connections...");
}
