//! Traffic control configuration
//!
//! Everything the [`TrafficController`](crate::core::traffic_control::TrafficController)
//! consults at decision time lives in [`TrafficControlConfig`]. The controller holds the
//! whole section as one immutable snapshot, so a reload is a single atomic swap.

use super::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Token bucket policy for one scope or endpoint group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketPolicy {
    /// Maximum number of tokens the bucket holds
    pub capacity: u32,
    /// Tokens added back per second
    pub refill_per_sec: f64,
}

impl BucketPolicy {
    /// Create a new bucket policy
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
        }
    }

    /// Sustained rate expressed per minute
    pub fn per_minute(&self) -> f64 {
        self.refill_per_sec * 60.0
    }
}

fn default_outbound_policy() -> BucketPolicy {
    BucketPolicy::new(default_outbound_capacity(), default_outbound_refill())
}

fn default_inbound_policy() -> BucketPolicy {
    BucketPolicy::new(default_inbound_capacity(), default_inbound_refill())
}

/// Outbound (provider-facing) limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundLimits {
    /// Policy for scopes without an explicit entry
    #[serde(default = "default_outbound_policy")]
    pub default: BucketPolicy,
    /// Per-scope overrides, keyed by `provider:verb` or `provider:*`
    #[serde(default)]
    pub scopes: HashMap<String, BucketPolicy>,
}

impl Default for OutboundLimits {
    fn default() -> Self {
        Self {
            default: default_outbound_policy(),
            scopes: HashMap::new(),
        }
    }
}

impl OutboundLimits {
    /// Resolve the policy for a scope: exact match, then `provider:*`, then the default
    pub fn policy_for(&self, scope: &str) -> BucketPolicy {
        if let Some(policy) = self.scopes.get(scope) {
            return *policy;
        }
        if let Some((provider, _)) = scope.split_once(':') {
            let wildcard = format!("{}:*", provider);
            if let Some(policy) = self.scopes.get(&wildcard) {
                return *policy;
            }
        }
        self.default
    }
}

/// Maps a path prefix to an endpoint group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteGroup {
    /// Path prefix, matched against the request path
    pub prefix: String,
    /// Endpoint group name
    pub group: String,
}

/// Inbound (UI-facing) limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundLimits {
    /// Policy for groups without an explicit entry
    #[serde(default = "default_inbound_policy")]
    pub default: BucketPolicy,
    /// Per-group overrides
    #[serde(default)]
    pub groups: HashMap<String, BucketPolicy>,
    /// Path prefix to endpoint group mapping
    #[serde(default)]
    pub routes: Vec<RouteGroup>,
    /// Paths that are never throttled
    #[serde(default = "default_exempt_prefixes")]
    pub exempt_prefixes: Vec<String>,
}

impl Default for InboundLimits {
    fn default() -> Self {
        Self {
            default: default_inbound_policy(),
            groups: HashMap::new(),
            routes: Vec::new(),
            exempt_prefixes: default_exempt_prefixes(),
        }
    }
}

/// Group used when no route prefix matches
pub const DEFAULT_ENDPOINT_GROUP: &str = "default";

impl InboundLimits {
    /// Policy for an endpoint group
    pub fn policy_for(&self, group: &str) -> BucketPolicy {
        self.groups.get(group).copied().unwrap_or(self.default)
    }

    /// Resolve the endpoint group for a request path (longest matching prefix wins)
    pub fn group_for_path(&self, path: &str) -> &str {
        self.routes
            .iter()
            .filter(|route| path.starts_with(route.prefix.as_str()))
            .max_by_key(|route| route.prefix.len())
            .map(|route| route.group.as_str())
            .unwrap_or(DEFAULT_ENDPOINT_GROUP)
    }

    /// Whether a path bypasses inbound throttling
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Initial cooldown before a probe is admitted (seconds)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Upper bound for the doubled cooldown (seconds)
    #[serde(default = "default_max_cooldown_secs")]
    pub max_cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            max_cooldown_secs: default_max_cooldown_secs(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Base cooldown
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Cooldown ceiling
    pub fn max_cooldown(&self) -> Duration {
        Duration::from_secs(self.max_cooldown_secs)
    }
}

/// Retry configuration for outbound calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Random jitter added on top of the delay, as a fraction of it
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

/// Global anti-loop guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiLoopConfig {
    /// Outbound requests allowed per window before degraded mode
    #[serde(default = "default_hard_cap")]
    pub hard_cap: u64,
    /// Window length (seconds)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// How long degraded mode lasts (seconds)
    #[serde(default = "default_degraded_cooldown_secs")]
    pub degraded_cooldown_secs: u64,
    /// Requests non-critical scopes may still make during one degraded period
    #[serde(default = "default_degraded_allowance")]
    pub degraded_allowance: u64,
    /// Scopes that are always admitted by the guard (`provider:verb` or `provider:*`)
    #[serde(default)]
    pub critical_scopes: Vec<String>,
}

impl Default for AntiLoopConfig {
    fn default() -> Self {
        Self {
            hard_cap: default_hard_cap(),
            window_secs: default_window_secs(),
            degraded_cooldown_secs: default_degraded_cooldown_secs(),
            degraded_allowance: default_degraded_allowance(),
            critical_scopes: Vec::new(),
        }
    }
}

impl AntiLoopConfig {
    /// Window length
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Degraded mode duration
    pub fn degraded_cooldown(&self) -> Duration {
        Duration::from_secs(self.degraded_cooldown_secs)
    }

    /// Whether a scope is exempt from degraded-mode throttling
    pub fn is_critical(&self, scope: &str) -> bool {
        self.critical_scopes.iter().any(|critical| {
            match critical.strip_suffix(":*") {
                Some(provider) => scope
                    .split_once(':')
                    .is_some_and(|(scope_provider, _)| scope_provider == provider),
                None => critical == scope,
            }
        })
    }
}

/// Decision log configuration
///
/// Disabled unless explicitly switched on, since decision events carry request metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLogConfig {
    /// Write decision events to disk
    #[serde(default)]
    pub enabled: bool,
    /// Directory for the rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Start a new file after this many hours
    #[serde(default = "default_rotation_hours")]
    pub rotation_hours: u64,
    /// Delete files older than this many days
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Stop writing once the directory exceeds this many bytes
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,
    /// Events buffered between the hot path and the writer thread
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DecisionLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: None,
            rotation_hours: default_rotation_hours(),
            retention_days: default_retention_days(),
            max_total_bytes: default_max_total_bytes(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl DecisionLogConfig {
    /// Rotation period
    pub fn rotation(&self) -> Duration {
        Duration::from_secs(self.rotation_hours * 3600)
    }

    /// Retention period
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 3600)
    }
}

/// Traffic control configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficControlConfig {
    /// Outbound limits
    #[serde(default)]
    pub outbound: OutboundLimits,
    /// Inbound limits
    #[serde(default)]
    pub inbound: InboundLimits,
    /// Circuit breaker settings
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,
    /// Anti-loop guard settings
    #[serde(default)]
    pub anti_loop: AntiLoopConfig,
    /// Decision log settings
    #[serde(default)]
    pub logging: DecisionLogConfig,
}
