//! Traffic control status, metrics and reset endpoints

use crate::server::routes::ApiResponse;
use crate::server::state::AppState;
use crate::utils::error::GatewayError;
use actix_web::{HttpResponse, Result as ActixResult, web};
use serde::Serialize;
use tracing::{debug, info};

/// Configure traffic control routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/traffic-control")
            .route("/status", web::get().to(status))
            .route("/metrics/{scope}", web::get().to(scope_metrics))
            .route("/reset/{scope}", web::post().to(reset_scope))
            .route("/anti-loop/reset", web::post().to(reset_anti_loop)),
    );
}

/// Result of a reset request
#[derive(Debug, Clone, Serialize)]
pub struct ResetResult {
    pub scope: String,
    /// False when the scope had no bucket or breaker yet
    pub reset: bool,
}

/// Controller-wide status
async fn status(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    debug!("Traffic control status requested");
    Ok(ApiResponse::success(state.controller.status()).to_http_response())
}

/// Metrics for one scope; 404 for a scope that has never been seen
async fn scope_metrics(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let scope = path.into_inner();
    let metrics = state
        .controller
        .scope_metrics(&scope)
        .ok_or_else(|| GatewayError::not_found(format!("Unknown traffic control scope '{}'", scope)))?;
    Ok(ApiResponse::success(metrics).to_http_response())
}

async fn reset_scope(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let scope = path.into_inner();
    let reset = state.controller.reset_scope(&scope);
    info!(scope = %scope, reset = reset, "Admin reset requested");
    Ok(ApiResponse::success(ResetResult { scope, reset }).to_http_response())
}

async fn reset_anti_loop(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    state.controller.reset_anti_loop();
    Ok(ApiResponse::success(state.controller.status().anti_loop).to_http_response())
}
