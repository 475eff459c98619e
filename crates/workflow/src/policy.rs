//! Failure policies for the read-only guards.
//!
//! When a guard cannot reach the store it substitutes a default decision
//! instead of surfacing the error. The direction differs per guard and is
//! a deliberate product decision; do not unify the two without revisiting
//! that trade-off.

use std::fmt::Display;
use tracing::warn;

/// Which default a guard substitutes for a swallowed infrastructure error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPolicy {
    /// Do not gate: the driver proceeds despite the failure.
    Open,
    /// Gate: the driver is asked for more documentation despite the failure.
    Closed,
}

impl FailPolicy {
    /// Default for "is this requirement in effect" style guards.
    pub fn default_required(self) -> bool {
        match self {
            FailPolicy::Open => false,
            FailPolicy::Closed => true,
        }
    }

    /// Default for "may the driver proceed" style guards.
    pub fn default_allowed(self) -> bool {
        match self {
            FailPolicy::Open => true,
            FailPolicy::Closed => false,
        }
    }

    /// Log the swallowed error before the default is substituted.
    pub fn swallow(self, guard: &str, err: impl Display) {
        warn!(guard, policy = ?self, %err, "guard read failed, substituting default decision");
    }
}

/// Contract-details gate never blocks a driver on infrastructure failure.
pub const CONTRACT_DETAILS_GATE: FailPolicy = FailPolicy::Open;
/// Pickup-completion gate never blocks a driver on infrastructure failure.
pub const PICKUP_COMPLETION_GATE: FailPolicy = FailPolicy::Open;
/// Delivery ordering never blocks a driver on infrastructure failure.
pub const DELIVERY_ORDER_GATE: FailPolicy = FailPolicy::Open;
/// Photo requirement prefers asking for more evidence on failure.
pub const PHOTO_REQUIREMENT_GATE: FailPolicy = FailPolicy::Closed;
