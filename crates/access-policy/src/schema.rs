use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Numeric zone identifier as printed on reader configuration.
pub type ZoneId = u32;

/// One physical card bound to a person.
///
/// Credentials are read-only to the decision path. Administrators disable
/// them rather than removing them so audit records keep pointing at
/// something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque token read from the card.
    pub uid: String,
    /// Reference to the owning person; opaque to this crate.
    pub owner_id: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Absent means the credential never expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub list_membership: ListMembership,
    /// Highest zone security level this credential may pass.
    #[serde(default = "default_clearance")]
    pub clearance_level: u8,
    /// Zones this credential has been granted. Absent means the credential
    /// is not limited to particular zones; an empty list grants none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_grants: Option<Vec<ZoneGrant>>,
}

impl Credential {
    /// An active, non-expiring, unlisted credential with the default
    /// clearance of 1.
    pub fn new(uid: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            owner_id: owner_id.into(),
            is_active: true,
            expires_at: None,
            list_membership: ListMembership::None,
            clearance_level: default_clearance(),
            zone_grants: None,
        }
    }

    pub fn with_clearance(mut self, level: u8) -> Self {
        self.clearance_level = level;
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_membership(mut self, membership: ListMembership) -> Self {
        self.list_membership = membership;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Limit the credential to the given zones.
    pub fn with_zone_grants(mut self, grants: Vec<ZoneGrant>) -> Self {
        self.zone_grants = Some(grants);
        self
    }

    /// Expiry is strict: a tap at exactly `expires_at` is still valid.
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expiry| at > expiry)
    }

    /// Whether the credential may enter `zone_id` at `at` as far as its
    /// zone grants are concerned.
    pub fn may_enter(&self, zone_id: ZoneId, at: DateTime<Utc>) -> bool {
        match &self.zone_grants {
            None => true,
            Some(grants) => grants
                .iter()
                .any(|g| g.zone_id == zone_id && g.is_valid_at(at)),
        }
    }
}

/// Permission for one credential to enter one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneGrant {
    pub zone_id: ZoneId,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Absent means the grant never lapses.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ZoneGrant {
    pub fn new(zone_id: ZoneId) -> Self {
        Self {
            zone_id,
            is_active: true,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn revoked(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Active and not past its expiry; expiry is strict like the card's.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expiry| at <= expiry)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMembership {
    #[default]
    None,
    Whitelisted,
    Blacklisted,
}

/// A controlled access point or area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    /// 1 (lowest) to 10 (highest).
    pub security_level: u8,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Absent means the zone is always open.
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    /// Administrative lock-down. While set, every tap is denied with this
    /// text in the reason.
    #[serde(default)]
    pub restriction: Option<String>,
    /// Admit only credentials on the allow list.
    #[serde(default)]
    pub whitelist_only: bool,
}

impl Zone {
    pub fn new(id: ZoneId, name: impl Into<String>, security_level: u8) -> Self {
        Self {
            id,
            name: name.into(),
            security_level,
            is_active: true,
            time_window: None,
            restriction: None,
            whitelist_only: false,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn restricted(mut self, reason: impl Into<String>) -> Self {
        self.restriction = Some(reason.into());
        self
    }

    pub fn whitelist_only(mut self) -> Self {
        self.whitelist_only = true;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn is_high_security(&self) -> bool {
        self.security_level >= 7
    }
}

/// Weekly opening schedule for a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Offset of the zone's local clock from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// The zone is open when any range matches.
    pub ranges: Vec<WindowRange>,
}

impl TimeWindow {
    pub fn new(ranges: Vec<WindowRange>) -> Self {
        Self {
            utc_offset_minutes: 0,
            ranges,
        }
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }
}

/// One allowed slice of the week, inclusive at minute granularity.
///
/// A range whose `start` is later than its `end` runs past midnight into
/// the following day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRange {
    /// Empty means every day of the week.
    #[serde(default)]
    pub days: Vec<Weekday>,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl WindowRange {
    pub fn new(days: Vec<Weekday>, start: NaiveTime, end: NaiveTime) -> Self {
        Self { days, start, end }
    }

    pub fn every_day(start: NaiveTime, end: NaiveTime) -> Self {
        Self::new(Vec::new(), start, end)
    }
}

fn default_true() -> bool {
    true
}

fn default_clearance() -> u8 {
    1
}

/// `"HH:MM"` wall-clock times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT)
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{raw}': {e}")))
    }
}
