//! # access-policy
//!
//! Core decision logic for the tapgate access controller.  This crate holds
//! the credential and zone model and a pure evaluator that resolves a tap
//! against them into one outcome from a closed status vocabulary.
//!
//! ## Quick start
//!
//! ```rust
//! use access_policy::{evaluate, AccessStatus, Credential, Zone};
//!
//! let card = Credential::new("04A1B2C3", "user-17").with_clearance(5);
//! let lobby = Zone::new(1, "Lobby", 3);
//!
//! let decision = evaluate(Some(&card), Some(&lobby), chrono::Utc::now());
//! assert_eq!(decision.status, AccessStatus::Granted);
//! ```

mod decision;
mod evaluator;
mod schema;
pub mod window;

// Re-export primary public API at crate root.
pub use decision::{AccessStatus, PolicyDecision, UnknownStatus};
pub use evaluator::evaluate;
pub use schema::{Credential, ListMembership, TimeWindow, WindowRange, Zone, ZoneGrant, ZoneId};
