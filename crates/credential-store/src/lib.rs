//! Read-side stores for the tapgate access controller.
//!
//! The decision path only ever asks two questions: "which credential has
//! this UID?" and "which zone has this id?". Both are answered through the
//! object-safe [`CredentialStore`] and [`ZoneRegistry`] traits so the engine
//! can be handed any backing store at construction time. Absence is a normal
//! answer (`Ok(None)`); only a failing backend is an error.
//!
//! The in-memory implementations in [`memory`] are populated from a
//! versioned YAML registry file via [`loader`].

pub mod loader;
pub mod memory;
mod uid;

use access_policy::{Credential, Zone, ZoneId};
use async_trait::async_trait;

pub use loader::{load_registry, load_registry_from_str, Registry};
pub use memory::{MemoryCredentialStore, MemoryZoneRegistry};
pub use uid::normalize_uid;

/// Errors raised by a failing store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Lookup of credentials by card UID.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the credential registered under `uid`.
    ///
    /// Implementations match on the canonical form produced by
    /// [`normalize_uid`], so `04:a1:b2` and `04A1B2` find the same card.
    async fn lookup(&self, uid: &str) -> Result<Option<Credential>, StoreError>;
}

/// Lookup of zones by id.
#[async_trait]
pub trait ZoneRegistry: Send + Sync {
    async fn lookup(&self, zone_id: ZoneId) -> Result<Option<Zone>, StoreError>;
}
