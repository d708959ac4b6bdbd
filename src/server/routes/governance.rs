//! Governance endpoints: read and replace traffic limits at runtime

use crate::config::models::TrafficControlConfig;
use crate::server::routes::ApiResponse;
use crate::server::state::AppState;
use actix_web::{HttpResponse, Result as ActixResult, web};
use tracing::info;

/// Configure governance routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/v1/governance/limits")
            .route(web::get().to(get_limits))
            .route(web::post().to(update_limits)),
    );
}

async fn get_limits(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let config = state.controller.config();
    Ok(ApiResponse::success(config.as_ref()).to_http_response())
}

/// Validate the submitted configuration and swap it in; an invalid body changes nothing
async fn update_limits(
    state: web::Data<AppState>,
    body: web::Json<TrafficControlConfig>,
) -> ActixResult<HttpResponse> {
    state.controller.update_config(body.into_inner())?;
    info!("Traffic limits replaced through governance endpoint");
    let config = state.controller.config();
    Ok(ApiResponse::success(config.as_ref()).to_http_response())
}
