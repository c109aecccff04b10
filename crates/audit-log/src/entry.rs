use access_policy::{AccessStatus, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sequence number assigned by the log when a record is appended.
pub type AttemptId = u64;

/// The immutable outcome of one tap, as handed to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessAttempt {
    /// Unique per tap; the log refuses a second record with the same id.
    pub event_id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    /// The UID exactly as the reader reported it, even when unknown.
    pub uid: String,
    pub zone_id: ZoneId,
    #[serde(default)]
    pub device_id: Option<String>,
    /// Owner of the credential, when one was found.
    #[serde(default)]
    pub resolved_user_id: Option<String>,
    pub status: AccessStatus,
    pub reason: String,
    /// Time spent resolving the decision, in milliseconds.
    #[serde(default)]
    pub decision_time_ms: f64,
}

impl AccessAttempt {
    /// Create an attempt with a fresh UUID v4 event id. Optional fields
    /// default to `None` / zero.
    pub fn new(
        timestamp: DateTime<Utc>,
        uid: impl Into<String>,
        zone_id: ZoneId,
        status: AccessStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4(),
            timestamp,
            uid: uid.into(),
            zone_id,
            device_id: None,
            resolved_user_id: None,
            status,
            reason: reason.into(),
            decision_time_ms: 0.0,
        }
    }

    pub fn with_device(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_resolved_user(mut self, user_id: Option<String>) -> Self {
        self.resolved_user_id = user_id;
        self
    }

    pub fn with_decision_time_ms(mut self, ms: f64) -> Self {
        self.decision_time_ms = ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_granted()
    }
}

/// An attempt together with the id the log assigned to it. This is the shape
/// stored on disk and returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAttempt {
    pub id: AttemptId,
    #[serde(flatten)]
    pub attempt: AccessAttempt,
}

impl RecordedAttempt {
    pub fn new(id: AttemptId, attempt: AccessAttempt) -> Self {
        Self { id, attempt }
    }
}

impl std::ops::Deref for RecordedAttempt {
    type Target = AccessAttempt;

    fn deref(&self) -> &AccessAttempt {
        &self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AccessAttempt {
        AccessAttempt::new(
            "2024-06-03T12:00:00Z".parse().unwrap(),
            "04:a1",
            1,
            AccessStatus::Granted,
            "access granted",
        )
    }

    #[test]
    fn new_generates_distinct_event_ids() {
        assert_ne!(sample().event_id, sample().event_id);
    }

    #[test]
    fn recorded_attempt_serializes_flat() {
        let record = RecordedAttempt::new(
            7,
            sample()
                .with_device(Some("door-1".into()))
                .with_resolved_user(Some("user-17".into())),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["uid"], "04:a1");
        assert_eq!(json["status"], "granted");
        assert_eq!(json["device_id"], "door-1");
        assert_eq!(json["resolved_user_id"], "user-17");

        let back: RecordedAttempt = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn missing_user_serializes_as_null() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json["resolved_user_id"].is_null());
        assert!(json["device_id"].is_null());
    }

    #[test]
    fn deref_exposes_attempt_fields() {
        let record = RecordedAttempt::new(1, sample());
        assert!(record.is_success());
        assert_eq!(record.zone_id, 1);
    }
}
