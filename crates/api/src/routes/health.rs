//! Health check and service root endpoints.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub service: &'static str,
}

/// GET /health: returns service health status.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /: names the service answering.
pub async fn root(service: &'static str) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "ok",
        service,
    })
}
