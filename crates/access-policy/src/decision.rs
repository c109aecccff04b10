use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The outcome of a single tap, listed in evaluation priority order.
///
/// When a tap satisfies several conditions at once, the variant that appears
/// first in this list is the one reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    /// The credential is on the deny list.
    Blacklisted,
    /// No credential is registered under the presented UID.
    InvalidCard,
    /// The credential exists but has been disabled.
    Inactive,
    /// The credential is past its expiry timestamp.
    Expired,
    /// The zone does not exist or is switched off.
    InvalidZone,
    /// The tap happened outside the zone's time window.
    InvalidTime,
    /// A remaining policy check failed (clearance, restriction, allow list).
    Denied,
    /// Every check passed.
    Granted,
}

impl AccessStatus {
    /// Every status, highest priority first.
    pub const ALL: [AccessStatus; 8] = [
        AccessStatus::Blacklisted,
        AccessStatus::InvalidCard,
        AccessStatus::Inactive,
        AccessStatus::Expired,
        AccessStatus::InvalidZone,
        AccessStatus::InvalidTime,
        AccessStatus::Denied,
        AccessStatus::Granted,
    ];

    /// Wire name used in audit records and exports.
    pub fn as_str(self) -> &'static str {
        match self {
            AccessStatus::Blacklisted => "blacklisted",
            AccessStatus::InvalidCard => "invalid_card",
            AccessStatus::Inactive => "inactive",
            AccessStatus::Expired => "expired",
            AccessStatus::InvalidZone => "invalid_zone",
            AccessStatus::InvalidTime => "invalid_time",
            AccessStatus::Denied => "denied",
            AccessStatus::Granted => "granted",
        }
    }

    /// Position in the evaluation order; 0 wins over everything else.
    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn is_granted(self) -> bool {
        self == AccessStatus::Granted
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a status name outside the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown access status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for AccessStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AccessStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// The result of evaluating one tap against a credential and zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub status: AccessStatus,
    /// Human-readable explanation, suitable for the audit trail.
    pub reason: String,
}

impl PolicyDecision {
    pub fn new(status: AccessStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    /// Convenience constructor for a granted decision.
    pub fn granted() -> Self {
        Self::new(AccessStatus::Granted, "access granted")
    }

    /// Convenience constructor for a generic policy denial.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::new(AccessStatus::Denied, reason)
    }
}
