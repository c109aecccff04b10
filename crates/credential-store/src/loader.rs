use std::collections::HashSet;
use std::path::Path;

use access_policy::{Credential, Zone};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::memory::{MemoryCredentialStore, MemoryZoneRegistry};
use crate::uid::normalize_uid;

/// Largest UTC offset a zone clock may declare (±14h).
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Administrator-managed credentials and zones, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    /// Schema version; currently must be "1.0".
    pub version: String,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

impl Registry {
    /// Index the registry into lookup stores.
    pub fn into_stores(self) -> (MemoryCredentialStore, MemoryZoneRegistry) {
        (
            MemoryCredentialStore::from_credentials(self.credentials),
            MemoryZoneRegistry::from_zones(self.zones),
        )
    }
}

/// Load a [`Registry`] from a YAML file on disk.
pub fn load_registry(path: impl AsRef<Path>) -> Result<Registry> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read registry file: {}", path.display()))?;
    load_registry_from_str(&contents)
        .with_context(|| format!("failed to parse registry file: {}", path.display()))
}

/// Parse and validate a [`Registry`] from a YAML string.
pub fn load_registry_from_str(yaml: &str) -> Result<Registry> {
    let registry: Registry = serde_yml::from_str(yaml).context("YAML deserialization failed")?;
    validate(&registry)?;
    tracing::debug!(
        credentials = registry.credentials.len(),
        zones = registry.zones.len(),
        "registry loaded"
    );
    Ok(registry)
}

fn validate(registry: &Registry) -> Result<()> {
    if registry.version != "1.0" {
        bail!(
            "unsupported registry version '{}'; only '1.0' is supported",
            registry.version
        );
    }

    let mut uids = HashSet::new();
    for credential in &registry.credentials {
        let key = normalize_uid(&credential.uid);
        if key.is_empty() {
            bail!("credential uid must not be empty");
        }
        if !uids.insert(key) {
            bail!("duplicate credential uid: '{}'", credential.uid);
        }
        if credential.clearance_level > 10 {
            bail!(
                "credential '{}': clearance_level {} is outside 0-10",
                credential.uid,
                credential.clearance_level
            );
        }
    }

    let mut ids = HashSet::new();
    for zone in &registry.zones {
        if !ids.insert(zone.id) {
            bail!("duplicate zone id: {}", zone.id);
        }
        if !(1..=10).contains(&zone.security_level) {
            bail!(
                "zone {}: security_level {} is outside 1-10",
                zone.id,
                zone.security_level
            );
        }
        if let Some(window) = &zone.time_window {
            if window.ranges.is_empty() {
                bail!("zone {}: time_window must have at least one range", zone.id);
            }
            if window.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
                bail!(
                    "zone {}: utc_offset_minutes {} is outside ±{}",
                    zone.id,
                    window.utc_offset_minutes,
                    MAX_UTC_OFFSET_MINUTES
                );
            }
        }
    }

    for credential in &registry.credentials {
        let Some(grants) = &credential.zone_grants else {
            continue;
        };
        let mut granted = HashSet::new();
        for grant in grants {
            if !ids.contains(&grant.zone_id) {
                bail!(
                    "credential '{}': zone grant refers to unknown zone {}",
                    credential.uid,
                    grant.zone_id
                );
            }
            if !granted.insert(grant.zone_id) {
                bail!(
                    "credential '{}': duplicate grant for zone {}",
                    credential.uid,
                    grant.zone_id
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CredentialStore, ZoneRegistry};
    use access_policy::ListMembership;

    fn expect_error(yaml: &str, needle: &str) {
        let err = load_registry_from_str(yaml).unwrap_err();
        assert!(
            format!("{err:#}").contains(needle),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn load_minimal_registry() {
        let registry = load_registry_from_str("version: \"1.0\"\n").unwrap();
        assert!(registry.credentials.is_empty());
        assert!(registry.zones.is_empty());
    }

    #[test]
    fn demo_registry_is_valid() {
        let registry =
            load_registry_from_str(include_str!("../../../demos/registry.yaml")).unwrap();
        assert_eq!(registry.credentials.len(), 4);
        assert_eq!(registry.zones.len(), 4);
        let contractor = &registry.credentials[2];
        assert_eq!(contractor.zone_grants.as_ref().map(Vec::len), Some(2));
        assert!(registry.credentials[0].zone_grants.is_none());
    }

    #[tokio::test]
    async fn load_complete_registry() {
        let yaml = r#"
version: "1.0"
credentials:
  - uid: "04:A1:B2:C3"
    owner_id: "user-17"
    clearance_level: 5
  - uid: "DEADBEEF"
    owner_id: "user-9"
    list_membership: blacklisted
    is_active: false
zones:
  - id: 1
    name: "Lobby"
    security_level: 1
  - id: 2
    name: "Server room"
    security_level: 8
    whitelist_only: true
    time_window:
      ranges:
        - days: [mon, tue, wed, thu, fri]
          start: "07:00"
          end: "19:00"
"#;
        let registry = load_registry_from_str(yaml).unwrap();
        assert_eq!(registry.credentials.len(), 2);
        assert_eq!(registry.zones.len(), 2);

        let (credentials, zones) = registry.into_stores();
        let card = credentials.lookup("04a1b2c3").await.unwrap().unwrap();
        assert_eq!(card.clearance_level, 5);
        let bad = credentials.lookup("DEADBEEF").await.unwrap().unwrap();
        assert_eq!(bad.list_membership, ListMembership::Blacklisted);

        let room = zones.lookup(2).await.unwrap().unwrap();
        assert!(room.whitelist_only);
        assert!(room.time_window.is_some());
    }

    #[test]
    fn reject_wrong_version() {
        expect_error("version: \"2.0\"\n", "unsupported registry version");
    }

    #[test]
    fn reject_duplicate_uid_after_normalization() {
        expect_error(
            r#"
version: "1.0"
credentials:
  - uid: "04:a1"
    owner_id: "u1"
  - uid: "04A1"
    owner_id: "u2"
"#,
            "duplicate credential uid",
        );
    }

    #[test]
    fn reject_empty_uid() {
        expect_error(
            r#"
version: "1.0"
credentials:
  - uid: " : "
    owner_id: "u1"
"#,
            "must not be empty",
        );
    }

    #[test]
    fn reject_out_of_range_clearance() {
        expect_error(
            r#"
version: "1.0"
credentials:
  - uid: "AAA"
    owner_id: "u1"
    clearance_level: 11
"#,
            "outside 0-10",
        );
    }

    #[test]
    fn reject_duplicate_zone_id() {
        expect_error(
            r#"
version: "1.0"
zones:
  - id: 1
    name: "A"
    security_level: 1
  - id: 1
    name: "B"
    security_level: 2
"#,
            "duplicate zone id: 1",
        );
    }

    #[test]
    fn reject_grant_for_unknown_zone() {
        expect_error(
            r#"
version: "1.0"
credentials:
  - uid: "AAA"
    owner_id: "u1"
    zone_grants:
      - zone_id: 7
zones:
  - id: 1
    name: "A"
    security_level: 1
"#,
            "unknown zone 7",
        );
    }

    #[test]
    fn reject_duplicate_grant() {
        expect_error(
            r#"
version: "1.0"
credentials:
  - uid: "AAA"
    owner_id: "u1"
    zone_grants:
      - zone_id: 1
      - zone_id: 1
        expires_at: "2030-01-01T00:00:00Z"
zones:
  - id: 1
    name: "A"
    security_level: 1
"#,
            "duplicate grant for zone 1",
        );
    }

    #[test]
    fn reject_security_level_zero() {
        expect_error(
            r#"
version: "1.0"
zones:
  - id: 1
    name: "A"
    security_level: 0
"#,
            "outside 1-10",
        );
    }

    #[test]
    fn reject_empty_time_window() {
        expect_error(
            r#"
version: "1.0"
zones:
  - id: 1
    name: "A"
    security_level: 1
    time_window:
      ranges: []
"#,
            "at least one range",
        );
    }

    #[test]
    fn reject_absurd_utc_offset() {
        expect_error(
            r#"
version: "1.0"
zones:
  - id: 1
    name: "A"
    security_level: 1
    time_window:
      utc_offset_minutes: 1000
      ranges:
        - start: "00:00"
          end: "23:59"
"#,
            "utc_offset_minutes 1000",
        );
    }

    #[test]
    fn load_from_nonexistent_file() {
        let err = load_registry("/does/not/exist.yaml").unwrap_err();
        assert!(
            err.to_string().contains("failed to read registry file"),
            "unexpected error: {err}"
        );
    }
}
