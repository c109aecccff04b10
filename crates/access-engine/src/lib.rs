//! # access-engine
//!
//! The orchestrator of the tapgate access controller. An [`AccessEngine`]
//! holds its three collaborators (credential store, zone registry, audit
//! log), and for every tap it looks up the card and the zone, runs the
//! policy evaluator, and returns only after the outcome has been recorded.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use access_engine::{AccessEngine, TapEvent};
//! use access_policy::{AccessStatus, Credential, Zone};
//! use audit_log::MemoryAuditLog;
//! use credential_store::{MemoryCredentialStore, MemoryZoneRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), access_engine::EngineError> {
//! let engine = AccessEngine::new(
//!     Arc::new(MemoryCredentialStore::from_credentials([
//!         Credential::new("04A1B2C3", "user-17").with_clearance(5),
//!     ])),
//!     Arc::new(MemoryZoneRegistry::from_zones([Zone::new(1, "Lobby", 3)])),
//!     Arc::new(MemoryAuditLog::new()),
//! );
//!
//! let outcome = engine.evaluate_now("04:a1:b2:c3", 1, Some("door-1")).await?;
//! assert_eq!(outcome.status, AccessStatus::Granted);
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;

pub use engine::{AccessEngine, TapEvent, TapOutcome};
pub use error::EngineError;
