//! In-memory stores keyed for O(1) lookup.
//!
//! Reads take a shared lock for the duration of one hash lookup and clone the
//! record out, so concurrent taps never wait on each other. Administrative
//! writes take the exclusive lock briefly. Records are never removed; they are
//! deactivated instead.

use std::collections::HashMap;
use std::sync::RwLock;

use access_policy::{Credential, Zone, ZoneId};
use async_trait::async_trait;
use tracing::info;

use crate::uid::normalize_uid;
use crate::{CredentialStore, StoreError, ZoneRegistry};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    by_uid: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an initial set of credentials. Later entries with
    /// the same canonical UID replace earlier ones.
    pub fn from_credentials(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let by_uid = credentials
            .into_iter()
            .map(|c| (normalize_uid(&c.uid), c))
            .collect();
        Self {
            by_uid: RwLock::new(by_uid),
        }
    }

    /// Insert or replace the credential registered under its UID.
    pub fn upsert(&self, credential: Credential) -> Result<(), StoreError> {
        let key = normalize_uid(&credential.uid);
        let mut map = self.by_uid.write().map_err(|_| StoreError::Poisoned)?;
        info!(uid = %key, owner = %credential.owner_id, "credential upserted");
        map.insert(key, credential);
        Ok(())
    }

    /// Disable a credential. Returns `false` if no such UID is registered.
    pub fn deactivate(&self, uid: &str) -> Result<bool, StoreError> {
        let key = normalize_uid(uid);
        let mut map = self.by_uid.write().map_err(|_| StoreError::Poisoned)?;
        match map.get_mut(&key) {
            Some(credential) => {
                credential.is_active = false;
                info!(uid = %key, "credential deactivated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.by_uid.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup(&self, uid: &str) -> Result<Option<Credential>, StoreError> {
        let map = self.by_uid.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(&normalize_uid(uid)).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryZoneRegistry {
    by_id: RwLock<HashMap<ZoneId, Zone>>,
}

impl MemoryZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_zones(zones: impl IntoIterator<Item = Zone>) -> Self {
        let by_id = zones.into_iter().map(|z| (z.id, z)).collect();
        Self {
            by_id: RwLock::new(by_id),
        }
    }

    pub fn upsert(&self, zone: Zone) -> Result<(), StoreError> {
        let mut map = self.by_id.write().map_err(|_| StoreError::Poisoned)?;
        info!(zone = zone.id, name = %zone.name, "zone upserted");
        map.insert(zone.id, zone);
        Ok(())
    }

    /// Switch a zone off. Returns `false` if the id is unknown.
    pub fn deactivate(&self, zone_id: ZoneId) -> Result<bool, StoreError> {
        let mut map = self.by_id.write().map_err(|_| StoreError::Poisoned)?;
        match map.get_mut(&zone_id) {
            Some(zone) => {
                zone.is_active = false;
                info!(zone = zone_id, "zone deactivated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// All zones ordered by id.
    pub fn zones(&self) -> Result<Vec<Zone>, StoreError> {
        let map = self.by_id.read().map_err(|_| StoreError::Poisoned)?;
        let mut zones: Vec<Zone> = map.values().cloned().collect();
        zones.sort_by_key(|z| z.id);
        Ok(zones)
    }
}

#[async_trait]
impl ZoneRegistry for MemoryZoneRegistry {
    async fn lookup(&self, zone_id: ZoneId) -> Result<Option<Zone>, StoreError> {
        let map = self.by_id.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(&zone_id).cloned())
    }
}
