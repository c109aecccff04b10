use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::decision::{AccessStatus, PolicyDecision};
use crate::schema::{Credential, ListMembership, Zone};
use crate::window;

/// Resolve one tap into a decision.
///
/// Pure and deterministic: the result depends only on the arguments. Absent
/// credential or zone are ordinary inputs, not errors. Checks run in a fixed
/// order and the first one that fails decides the outcome:
///
/// 1. unknown credential → [`AccessStatus::InvalidCard`]
/// 2. credential on the deny list → [`AccessStatus::Blacklisted`]
/// 3. credential disabled → [`AccessStatus::Inactive`]
/// 4. credential past expiry → [`AccessStatus::Expired`]
/// 5. zone unknown or disabled → [`AccessStatus::InvalidZone`]
/// 6. outside the zone's time window → [`AccessStatus::InvalidTime`]
/// 7. zone restriction, no grant for the zone, insufficient clearance, or
///    allow-list-only zone → [`AccessStatus::Denied`]
/// 8. otherwise [`AccessStatus::Granted`]
///
/// An unknown credential cannot carry a deny-list entry, so step 1 never
/// hides step 2; the resulting outcome always matches the order of
/// [`AccessStatus::ALL`].
pub fn evaluate(
    credential: Option<&Credential>,
    zone: Option<&Zone>,
    at: DateTime<Utc>,
) -> PolicyDecision {
    let decision = decide(credential, zone, at);
    debug!(
        uid = credential.map(|c| c.uid.as_str()),
        zone = zone.map(|z| z.id),
        status = %decision.status,
        "policy evaluated"
    );
    decision
}

fn decide(credential: Option<&Credential>, zone: Option<&Zone>, at: DateTime<Utc>) -> PolicyDecision {
    let Some(card) = credential else {
        return PolicyDecision::new(AccessStatus::InvalidCard, "unregistered or invalid card");
    };

    if let Some(decision) = check_card(card, at) {
        return decision;
    }

    let zone = match zone {
        Some(z) if z.is_active => z,
        Some(z) => {
            return PolicyDecision::new(
                AccessStatus::InvalidZone,
                format!("zone {} ({}) is inactive", z.id, z.name),
            )
        }
        None => return PolicyDecision::new(AccessStatus::InvalidZone, "zone does not exist"),
    };

    if let Some(schedule) = &zone.time_window {
        if !window::is_open(schedule, at) {
            return PolicyDecision::new(
                AccessStatus::InvalidTime,
                format!("outside the opening hours of zone {}", zone.name),
            );
        }
    }

    if let Some(decision) = check_policy(card, zone, at) {
        return decision;
    }

    trace!(uid = card.uid, zone = zone.id, "all checks passed");
    PolicyDecision::granted()
}

/// Card-identity checks; these run before anything zone specific so a bad
/// card never reveals how a zone is configured.
fn check_card(card: &Credential, at: DateTime<Utc>) -> Option<PolicyDecision> {
    if card.list_membership == ListMembership::Blacklisted {
        return Some(PolicyDecision::new(
            AccessStatus::Blacklisted,
            "card is on the deny list",
        ));
    }
    if !card.is_active {
        return Some(PolicyDecision::new(AccessStatus::Inactive, "card is disabled"));
    }
    if card.is_expired_at(at) {
        let expiry = card
            .expires_at
            .map(|e| e.to_rfc3339())
            .unwrap_or_default();
        return Some(PolicyDecision::new(
            AccessStatus::Expired,
            format!("card expired at {expiry}"),
        ));
    }
    None
}

/// Remaining zone policy; every failure here is a plain denial.
fn check_policy(card: &Credential, zone: &Zone, at: DateTime<Utc>) -> Option<PolicyDecision> {
    if let Some(reason) = &zone.restriction {
        return Some(PolicyDecision::denied(format!(
            "zone {} is restricted: {reason}",
            zone.name
        )));
    }
    if !card.may_enter(zone.id, at) {
        return Some(PolicyDecision::denied(format!(
            "no access to zone {}",
            zone.name
        )));
    }
    if zone.security_level > card.clearance_level {
        return Some(PolicyDecision::denied(format!(
            "insufficient clearance: level {} required, card has {}",
            zone.security_level, card.clearance_level
        )));
    }
    if zone.whitelist_only && card.list_membership != ListMembership::Whitelisted {
        return Some(PolicyDecision::denied(format!(
            "zone {} admits allow-listed cards only",
            zone.name
        )));
    }
    None
}
