//! HTTP route handlers

use crate::server::state::AppState;
use actix_web::{HttpResponse, web};
use serde_json::json;

/// Health check endpoint handler
///
/// Never throttled; reports build info and whether the controller is degraded.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "build": crate::build_info(),
        "traffic_control": {
            "degraded": state.controller.is_degraded(),
        }
    }))
}
