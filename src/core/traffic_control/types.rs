//! Traffic control decision and key types

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Outcome of a traffic-control check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed
    Allowed,
    /// Request may proceed as the half-open probe of its scope
    ///
    /// Pass the decision back with the outcome so the breaker can tell the probe apart
    /// from calls admitted before the circuit opened.
    Probe {
        /// Breaker-issued probe id
        id: u64,
    },
    /// Token bucket for the scope is empty
    RateLimited {
        /// Time until a token is available
        retry_after: Duration,
    },
    /// Circuit breaker for the scope is open (or its probe slot is taken)
    CircuitOpen {
        /// Time until a probe may be attempted
        retry_after: Duration,
    },
    /// Global anti-loop guard is in degraded mode
    Degraded {
        /// Time until degraded mode ends
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed | Decision::Probe { .. })
    }

    /// Suggested wait before retrying, `None` when allowed
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Allowed | Decision::Probe { .. } => None,
            Decision::RateLimited { retry_after }
            | Decision::CircuitOpen { retry_after }
            | Decision::Degraded { retry_after } => Some(*retry_after),
        }
    }

    /// Value for a `Retry-After` header: whole seconds, rounded up, at least 1
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after().map(retry_after_header_secs)
    }

    /// Stable identifier of the gate that produced the decision
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allowed => "allowed",
            Decision::Probe { .. } => "probe",
            Decision::RateLimited { .. } => "rate_limited",
            Decision::CircuitOpen { .. } => "circuit_open",
            Decision::Degraded { .. } => "degraded",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.retry_after() {
            Some(retry_after) => write!(
                f,
                "{} (retry after {:.3}s)",
                self.as_str(),
                retry_after.as_secs_f64()
            ),
            None => f.write_str(self.as_str()),
        }
    }
}

impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Decision", 2)?;
        state.serialize_field("decision", self.as_str())?;
        state.serialize_field(
            "retry_after_ms",
            &self.retry_after().map(|d| d.as_millis() as u64),
        )?;
        state.end()
    }
}

/// Round a wait up to whole seconds for the `Retry-After` header
pub fn retry_after_header_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    let rounded = if retry_after.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    };
    rounded.max(1)
}

/// Which side of the service a decision applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Calls to external providers
    Outbound,
    /// Requests from the UI
    Inbound,
}

/// Scope for an outbound call: `{provider}:{verb}`, lower-cased
pub fn outbound_scope(provider: &str, verb: &str) -> String {
    format!(
        "{}:{}",
        provider.to_ascii_lowercase(),
        verb.to_ascii_lowercase()
    )
}

/// The identifier an inbound request was keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InboundIdentity {
    /// Authenticated actor id
    Actor(String),
    /// Session id
    Session(String),
    /// Client IP address
    Ip(String),
    /// Nothing identified the caller
    Anonymous,
}

impl InboundIdentity {
    /// Identifier kind, safe to log
    pub fn kind(&self) -> &'static str {
        match self {
            InboundIdentity::Actor(_) => "actor",
            InboundIdentity::Session(_) => "session",
            InboundIdentity::Ip(_) => "ip",
            InboundIdentity::Anonymous => "anonymous",
        }
    }

    fn value(&self) -> &str {
        match self {
            InboundIdentity::Actor(v) | InboundIdentity::Session(v) | InboundIdentity::Ip(v) => v,
            InboundIdentity::Anonymous => "",
        }
    }
}

/// Key of an inbound token bucket: endpoint group plus the first available identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InboundKey {
    /// Endpoint group
    pub group: String,
    /// Caller identity
    pub identity: InboundIdentity,
}

impl InboundKey {
    /// Resolve the key with actor → session → IP precedence; blank values are ignored
    pub fn resolve(
        group: &str,
        actor_id: Option<&str>,
        session_id: Option<&str>,
        client_ip: Option<&str>,
    ) -> Self {
        let present = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let identity = if let Some(actor) = present(actor_id) {
            InboundIdentity::Actor(actor)
        } else if let Some(session) = present(session_id) {
            InboundIdentity::Session(session)
        } else if let Some(ip) = present(client_ip) {
            InboundIdentity::Ip(ip)
        } else {
            InboundIdentity::Anonymous
        };

        Self {
            group: group.to_string(),
            identity,
        }
    }

    /// Bucket key inside the shared rate limiter
    ///
    /// Prefixed so inbound buckets can never collide with outbound scopes.
    pub fn bucket_key(&self) -> String {
        format!(
            "{}{}:{}:{}",
            INBOUND_BUCKET_PREFIX,
            self.group,
            self.identity.kind(),
            self.identity.value()
        )
    }

    /// Metrics scope for the endpoint group (identities are never exposed)
    pub fn group_scope(&self) -> String {
        inbound_group_scope(&self.group)
    }
}

/// Prefix shared by every inbound bucket key
pub const INBOUND_BUCKET_PREFIX: &str = "inbound:";

/// Metrics scope for an inbound endpoint group
pub fn inbound_group_scope(group: &str) -> String {
    format!("{}{}", INBOUND_BUCKET_PREFIX, group)
}
