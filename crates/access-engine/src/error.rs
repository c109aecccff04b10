use audit_log::AuditError;
use credential_store::StoreError;

/// A storage fault that stopped a tap from being resolved and recorded.
///
/// Domain outcomes such as `invalid_card` or `denied` are never errors; they
/// come back as a recorded attempt. An `EngineError` means no decision was
/// reported to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("credential lookup failed: {0}")]
    CredentialLookup(#[source] StoreError),

    #[error("zone lookup failed: {0}")]
    ZoneLookup(#[source] StoreError),

    #[error("failed to record access attempt: {0}")]
    AuditAppend(#[source] AuditError),
}
