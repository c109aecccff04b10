use std::sync::Arc;
use std::time::Instant;

use access_policy::{AccessStatus, ZoneId};
use audit_log::{AccessAttempt, AttemptId, AuditLog, RecordedAttempt};
use chrono::{DateTime, Utc};
use credential_store::{CredentialStore, ZoneRegistry};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::EngineError;

/// One presentation of a card to a reader.
#[derive(Debug, Clone, PartialEq)]
pub struct TapEvent {
    /// UID exactly as the reader produced it.
    pub uid: String,
    pub zone_id: ZoneId,
    pub device_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl TapEvent {
    /// A tap happening now, with no device attached.
    pub fn new(uid: impl Into<String>, zone_id: ZoneId) -> Self {
        Self {
            uid: uid.into(),
            zone_id,
            device_id: None,
            at: Utc::now(),
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// What the caller of the engine gets back for a tap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TapOutcome {
    pub attempt_id: AttemptId,
    pub status: AccessStatus,
    pub reason: String,
    pub resolved_user_id: Option<String>,
}

impl From<&RecordedAttempt> for TapOutcome {
    fn from(record: &RecordedAttempt) -> Self {
        Self {
            attempt_id: record.id,
            status: record.status,
            reason: record.reason.clone(),
            resolved_user_id: record.resolved_user_id.clone(),
        }
    }
}

/// Resolves taps against the stores and records every outcome.
///
/// The engine keeps no state of its own besides handles to its collaborators,
/// so one instance (or any clone of it) may serve any number of concurrent
/// taps.
#[derive(Clone)]
pub struct AccessEngine {
    credentials: Arc<dyn CredentialStore>,
    zones: Arc<dyn ZoneRegistry>,
    audit: Arc<dyn AuditLog>,
}

impl AccessEngine {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        zones: Arc<dyn ZoneRegistry>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            credentials,
            zones,
            audit,
        }
    }

    /// The audit log this engine records into.
    pub fn audit(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    /// Decide `tap` and record the outcome.
    ///
    /// Returns the stored record once the audit log has acknowledged it.
    /// Unknown cards and zones are ordinary outcomes; only a failing store
    /// or audit log produces an error, in which case the caller must not
    /// treat the tap as decided.
    pub async fn evaluate(&self, tap: TapEvent) -> Result<RecordedAttempt, EngineError> {
        let started = Instant::now();

        let (credential, zone) = tokio::join!(
            self.credentials.lookup(&tap.uid),
            self.zones.lookup(tap.zone_id)
        );
        let credential = credential.map_err(|err| {
            error!(uid = %tap.uid, zone = tap.zone_id, %err, "credential lookup failed");
            EngineError::CredentialLookup(err)
        })?;
        let zone = zone.map_err(|err| {
            error!(uid = %tap.uid, zone = tap.zone_id, %err, "zone lookup failed");
            EngineError::ZoneLookup(err)
        })?;

        let decision = access_policy::evaluate(credential.as_ref(), zone.as_ref(), tap.at);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let attempt = AccessAttempt::new(tap.at, tap.uid, tap.zone_id, decision.status, decision.reason)
            .with_device(tap.device_id)
            .with_resolved_user(credential.map(|c| c.owner_id))
            .with_decision_time_ms(elapsed_ms);
        let pending = attempt.clone();

        let id = self.audit.append(attempt).await.map_err(|err| {
            error!(
                uid = %pending.uid,
                zone = pending.zone_id,
                status = %pending.status,
                %err,
                "access attempt could not be recorded"
            );
            EngineError::AuditAppend(err)
        })?;

        let record = RecordedAttempt::new(id, pending);
        if record.is_success() {
            info!(
                attempt = record.id,
                uid = %record.uid,
                zone = record.zone_id,
                device = record.device_id.as_deref(),
                user = record.resolved_user_id.as_deref(),
                "access granted"
            );
        } else {
            warn!(
                attempt = record.id,
                uid = %record.uid,
                zone = record.zone_id,
                device = record.device_id.as_deref(),
                status = %record.status,
                reason = %record.reason,
                "access refused"
            );
        }
        Ok(record)
    }

    /// Convenience wrapper for a tap happening at the current time.
    pub async fn evaluate_now(
        &self,
        uid: &str,
        zone_id: ZoneId,
        device_id: Option<&str>,
    ) -> Result<RecordedAttempt, EngineError> {
        let mut tap = TapEvent::new(uid, zone_id);
        tap.device_id = device_id.map(str::to_string);
        self.evaluate(tap).await
    }
}
