//! Inbound traffic control middleware

use super::helpers::CallerIdentifiers;
use crate::core::traffic_control::inbound_group_scope;
use crate::server::state::AppState;
use crate::utils::error::GatewayError;
use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{ResponseError, web};
use futures::future::{Ready, ready};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

type ResponseFuture<B> =
    Pin<Box<dyn Future<Output = Result<ServiceResponse<EitherBody<B>>, actix_web::Error>>>>;

/// Throttles every non-exempt request through the inbound token buckets
///
/// Requires `web::Data<AppState>` in the app; without it requests pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficControlMiddleware;

impl<S, B> Transform<S, ServiceRequest> for TrafficControlMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = TrafficControlMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TrafficControlMiddlewareService { service }))
    }
}

/// Service implementation for the traffic control middleware
pub struct TrafficControlMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TrafficControlMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = ResponseFuture<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
            warn!("AppState missing, inbound traffic control skipped");
            return self.pass(req);
        };

        let config = state.controller.config();
        if config.inbound.is_exempt(req.path()) {
            return self.pass(req);
        }

        let group = config.inbound.group_for_path(req.path()).to_string();
        let caller = CallerIdentifiers::from_request(&req);
        let decision = state.controller.check_inbound_request(
            &group,
            caller.actor_id.as_deref(),
            caller.session_id.as_deref(),
            caller.client_ip.as_deref(),
        );

        if decision.is_allowed() {
            return self.pass(req);
        }

        debug!(
            method = %req.method(),
            path = req.path(),
            group = %group,
            decision = %decision,
            "Inbound request rejected"
        );
        let response = GatewayError::blocked(inbound_group_scope(&group), decision).error_response();
        let res = req.into_response(response).map_into_right_body();
        Box::pin(ready(Ok(res)))
    }
}

impl<S, B> TrafficControlMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    fn pass(&self, req: ServiceRequest) -> ResponseFuture<B> {
        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}
