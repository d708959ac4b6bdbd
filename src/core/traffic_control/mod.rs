//! API traffic control
//!
//! Every outbound call to an external provider and every inbound UI request passes
//! through a [`TrafficController`]. Outbound calls are scoped `provider:verb`; inbound
//! requests are keyed by endpoint group and caller identity.

pub mod anti_loop;
pub mod clock;
mod controller;
pub mod metrics;
mod types;


pub use anti_loop::{AntiLoopGuard, AntiLoopSnapshot};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use controller::{TrafficController, TrafficStatus};
pub use metrics::{DecisionCounts, ResponseCounts, ScopeMetrics, ScopeMetricsSnapshot};
pub use types::{
    Decision, Direction, InboundIdentity, InboundKey, inbound_group_scope, outbound_scope,
    retry_after_header_secs,
};
