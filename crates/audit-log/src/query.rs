use std::cmp::Reverse;

use access_policy::{AccessStatus, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::RecordedAttempt;

/// Criteria for selecting audit records. Every populated field must match
/// (AND logic); the default filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFilter {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub zone_id: Option<ZoneId>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub resolved_user_id: Option<String>,
    /// Empty means any status.
    #[serde(default)]
    pub statuses: Vec<AccessStatus>,
    /// Only non-granted outcomes.
    #[serde(default)]
    pub failures_only: bool,
    /// Inclusive lower bound on the tap timestamp.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the tap timestamp.
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn zone(mut self, zone_id: ZoneId) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.resolved_user_id = Some(user_id.into());
        self
    }

    pub fn status(mut self, status: AccessStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn failures_only(mut self) -> Self {
        self.failures_only = true;
        self
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    pub fn until(mut self, at: DateTime<Utc>) -> Self {
        self.until = Some(at);
        self
    }

    pub fn matches(&self, record: &RecordedAttempt) -> bool {
        let a = &record.attempt;
        self.uid.as_ref().map_or(true, |uid| *uid == a.uid)
            && self.zone_id.map_or(true, |zone| zone == a.zone_id)
            && self
                .device_id
                .as_ref()
                .map_or(true, |device| a.device_id.as_ref() == Some(device))
            && self
                .resolved_user_id
                .as_ref()
                .map_or(true, |user| a.resolved_user_id.as_ref() == Some(user))
            && (self.statuses.is_empty() || self.statuses.contains(&a.status))
            && !(self.failures_only && a.status.is_granted())
            && self.since.map_or(true, |since| a.timestamp >= since)
            && self.until.map_or(true, |until| a.timestamp < until)
    }
}

/// Apply `filter` to `records` and return one page, most recent first.
///
/// Ordering is by tap timestamp descending with ties broken by id
/// descending, so the result is stable for an unchanged log.
pub fn select<'a>(
    records: impl IntoIterator<Item = &'a RecordedAttempt>,
    filter: &AuditFilter,
    limit: usize,
    offset: usize,
) -> Vec<RecordedAttempt> {
    let mut matched: Vec<&RecordedAttempt> = records
        .into_iter()
        .filter(|r| filter.matches(r))
        .collect();
    matched.sort_by_key(|r| Reverse((r.attempt.timestamp, r.id)));
    matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AccessAttempt;
    use chrono::Duration;

    fn base() -> DateTime<Utc> {
        "2024-06-03T12:00:00Z".parse().unwrap()
    }

    fn record(id: u64, minutes: i64, uid: &str, zone: ZoneId, status: AccessStatus) -> RecordedAttempt {
        let attempt = AccessAttempt::new(base() + Duration::minutes(minutes), uid, zone, status, "r")
            .with_device(Some(format!("door-{zone}")))
            .with_resolved_user((status != AccessStatus::InvalidCard).then(|| format!("owner-{uid}")));
        RecordedAttempt::new(id, attempt)
    }

    fn log() -> Vec<RecordedAttempt> {
        vec![
            record(1, 0, "AAA", 1, AccessStatus::Granted),
            record(2, 5, "BBB", 1, AccessStatus::Denied),
            record(3, 10, "UNKNOWN", 2, AccessStatus::InvalidCard),
            record(4, 10, "AAA", 2, AccessStatus::Granted),
            record(5, 2, "AAA", 1, AccessStatus::Expired),
        ]
    }

    fn ids(records: &[RecordedAttempt]) -> Vec<u64> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn most_recent_first_with_id_tiebreak() {
        let got = select(&log(), &AuditFilter::all(), 100, 0);
        assert_eq!(ids(&got), vec![4, 3, 2, 5, 1]);
    }

    #[test]
    fn limit_and_offset_page_through() {
        let log = log();
        assert_eq!(ids(&select(&log, &AuditFilter::all(), 2, 0)), vec![4, 3]);
        assert_eq!(ids(&select(&log, &AuditFilter::all(), 2, 2)), vec![2, 5]);
        assert_eq!(ids(&select(&log, &AuditFilter::all(), 2, 4)), vec![1]);
        assert!(select(&log, &AuditFilter::all(), 2, 10).is_empty());
        assert!(select(&log, &AuditFilter::all(), 0, 0).is_empty());
    }

    #[test]
    fn filter_by_uid_and_zone() {
        let log = log();
        assert_eq!(ids(&select(&log, &AuditFilter::all().uid("AAA"), 10, 0)), vec![4, 5, 1]);
        assert_eq!(
            ids(&select(&log, &AuditFilter::all().uid("AAA").zone(1), 10, 0)),
            vec![5, 1]
        );
    }

    #[test]
    fn filter_by_device_and_user() {
        let log = log();
        assert_eq!(ids(&select(&log, &AuditFilter::all().device("door-2"), 10, 0)), vec![4, 3]);
        assert_eq!(
            ids(&select(&log, &AuditFilter::all().user("owner-BBB"), 10, 0)),
            vec![2]
        );
    }

    #[test]
    fn filter_by_statuses() {
        let log = log();
        let filter = AuditFilter::all()
            .status(AccessStatus::Denied)
            .status(AccessStatus::InvalidCard);
        assert_eq!(ids(&select(&log, &filter, 10, 0)), vec![3, 2]);
    }

    #[test]
    fn failures_only_drops_granted() {
        let got = select(&log(), &AuditFilter::all().failures_only(), 10, 0);
        assert_eq!(ids(&got), vec![3, 2, 5]);
    }

    #[test]
    fn time_bounds_are_half_open() {
        let filter = AuditFilter::all()
            .since(base() + Duration::minutes(2))
            .until(base() + Duration::minutes(10));
        assert_eq!(ids(&select(&log(), &filter, 10, 0)), vec![2, 5]);
    }
}
