use axum::Extension;
use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::error;

use crate::server::dtos::health_dto::{
    HealthResponse, HealthStatus, RegistryHealth, ServiceHealthDetails,
};
use crate::server::services::ProxyServices;
use crate::server::{get_app_version, get_uptime_seconds};

/// health endpoint - the proxy itself has no state, so this only checks that the source registry
/// can still be read. without it every proxy request would fail closed
pub async fn health_endpoint(
    Extension(services): Extension<ProxyServices>,
) -> (StatusCode, Json<HealthResponse>) {
    let registry = check_registry_health(&services).await;
    let status = registry.status;

    let response = HealthResponse {
        status,
        timestamp: Utc::now(),
        uptime_seconds: get_uptime_seconds(),
        version: get_app_version().to_string(),
        environment: format!("{:?}", services.config.cargo_env).to_lowercase(),
        services: ServiceHealthDetails { registry },
    };

    let http_status = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(response))
}

async fn check_registry_health(services: &ProxyServices) -> RegistryHealth {
    match services.sources.registry().health_check().await {
        Ok(response_time) => RegistryHealth {
            status: HealthStatus::Healthy,
            response_time_ms: response_time,
        },
        Err(e) => {
            error!("Registry health check failed: {:#}", e);
            RegistryHealth {
                status: HealthStatus::Unhealthy,
                response_time_ms: 0.0,
            }
        }
    }
}
