//! HTTP middleware implementations
//!
//! - Inbound traffic control (token buckets keyed by endpoint group and caller)

mod helpers;
mod traffic_control;

pub use helpers::{
    ACTOR_ID_HEADER, CallerIdentifiers, SESSION_COOKIE, SESSION_ID_HEADER, cookie_value,
    header_value,
};
pub use traffic_control::{TrafficControlMiddleware, TrafficControlMiddlewareService};
