//! Helper functions for middleware

use actix_web::dev::ServiceRequest;
use actix_web::http::header::HeaderMap;

/// Header carrying the authenticated actor
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the session identifier
pub const SESSION_ID_HEADER: &str = "x-session-id";
/// Cookie carrying the session identifier
pub const SESSION_COOKIE: &str = "session_id";

/// Caller identifiers used to key inbound buckets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentifiers {
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
    pub client_ip: Option<String>,
}

impl CallerIdentifiers {
    /// Collect identifiers from a request
    pub fn from_request(req: &ServiceRequest) -> Self {
        let headers = req.headers();
        Self {
            actor_id: header_value(headers, ACTOR_ID_HEADER),
            session_id: header_value(headers, SESSION_ID_HEADER)
                .or_else(|| cookie_value(headers, SESSION_COOKIE)),
            client_ip: req.peer_addr().map(|addr| addr.ip().to_string()),
        }
    }
}

/// Non-empty header value
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Value of a cookie from the `Cookie` header
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie_header in headers.get_all("cookie") {
        let Ok(cookie_str) = cookie_header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            let Some((key, value)) = cookie.trim().split_once('=') else {
                continue;
            };
            if key == name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}
