// ABOUTME: Defines the Event record stored by the audit log and its single validation rule.
// ABOUTME: Also owns the expiration and identity rules that every storage backend applies on save.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// Seconds between the Unix epoch and 0001-01-01T00:00:00Z, the "unset" date.
const ZERO_DATE_SECS: i64 = -62_135_596_800;

/// Reasons an event is rejected before it reaches storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid date")]
    InvalidDate,

    #[error("invalid status code")]
    InvalidStatusCode,
}

/// A single audit record: a status code observed at a point in time, plus
/// free-form metadata. `expiration` is epoch seconds, 0 meaning "not assigned".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub id: String,
    #[serde(default = "zero_date")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub status_code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status_message: String,
    #[serde(default)]
    pub expiration: i64,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub metadata: BTreeMap<String, String>,
}

impl Event {
    /// Create an event without id, expiration, or metadata.
    pub fn new(date: DateTime<Utc>, status_code: i64, status_message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            date,
            status_code,
            status_message: status_message.into(),
            expiration: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Generate a fresh, unique event id.
    pub fn new_id() -> String {
        Ulid::new().to_string()
    }

    /// Check the fields that have constraints. `status_message` and
    /// `metadata` are accepted as-is.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_zero_date(&self.date) {
            return Err(ValidationError::InvalidDate);
        }
        if self.status_code < 0 {
            return Err(ValidationError::InvalidStatusCode);
        }
        Ok(())
    }

    /// True once wall-clock time has passed an assigned expiration.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.expiration == 0 {
            return false;
        }
        match DateTime::from_timestamp(self.expiration, 0) {
            Some(expires_at) => expires_at < now,
            None => self.expiration < 0,
        }
    }

    /// True when `date` lies in `[from, to]` (both ends inclusive) and the
    /// status code matches exactly.
    pub fn matches(&self, from: DateTime<Utc>, to: DateTime<Utc>, status_code: i64) -> bool {
        self.status_code == status_code && self.date >= from && self.date <= to
    }

    /// Apply the save-time rules shared by every backend: an empty id gets a
    /// fresh one, and an unassigned expiration becomes `now + ttl` when a TTL
    /// is configured. A caller-supplied expiration is never overwritten.
    pub fn prepare_for_save(&mut self, now: DateTime<Utc>, ttl: Duration) {
        if self.id.is_empty() {
            self.id = Self::new_id();
        }
        if self.expiration == 0 && !ttl.is_zero() {
            let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
            self.expiration = now.timestamp().saturating_add(ttl_secs);
        }
    }
}

/// The timestamp a missing `date` decodes to. Validation rejects it.
pub fn zero_date() -> DateTime<Utc> {
    DateTime::from_timestamp(ZERO_DATE_SECS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// True only for the unset timestamp itself.
pub fn is_zero_date(date: &DateTime<Utc>) -> bool {
    *date == zero_date()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
