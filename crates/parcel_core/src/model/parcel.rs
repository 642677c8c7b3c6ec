//! Parcel record and lifecycle statuses.
//!
//! # Responsibility
//! - Define the row shape persisted in table `parcel`.
//! - Name the canonical status values of the registered -> sent -> delivered flow.
//!
//! # Invariants
//! - `number` is `0` until storage assigns one on insert.
//! - `created_at` is set once at construction and never rewritten.
//! - `status` is an open string; only `registered` unlocks address change and deletion.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage-assigned parcel identifier (`parcel.number`).
pub type ParcelNumber = i64;

/// Owning client identifier (`parcel.client`).
pub type ClientId = i64;

/// Status value for parcels accepted but not yet dispatched.
pub const PARCEL_STATUS_REGISTERED: &str = "registered";
/// Status value for dispatched parcels.
pub const PARCEL_STATUS_SENT: &str = "sent";
/// Status value for parcels handed over to the recipient.
pub const PARCEL_STATUS_DELIVERED: &str = "delivered";

/// Known lifecycle statuses.
///
/// Persisted rows may carry other strings; see [`Parcel::known_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    /// Accepted, still mutable.
    Registered,
    /// Dispatched.
    Sent,
    /// Handed over.
    Delivered,
}

impl ParcelStatus {
    /// Stable string stored in `parcel.status`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => PARCEL_STATUS_REGISTERED,
            Self::Sent => PARCEL_STATUS_SENT,
            Self::Delivered => PARCEL_STATUS_DELIVERED,
        }
    }

    /// Parses an exact stored value. Returns `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            PARCEL_STATUS_REGISTERED => Some(Self::Registered),
            PARCEL_STATUS_SENT => Some(Self::Sent),
            PARCEL_STATUS_DELIVERED => Some(Self::Delivered),
            _ => None,
        }
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of table `parcel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// Primary key. Ignored on insert.
    pub number: ParcelNumber,
    pub client: ClientId,
    pub status: String,
    pub address: String,
    /// RFC3339 timestamp in UTC.
    pub created_at: String,
}

impl Parcel {
    /// Creates a `registered` parcel stamped with the current UTC time.
    pub fn new(client: ClientId, address: impl Into<String>) -> Self {
        Self::with_created_at(
            client,
            PARCEL_STATUS_REGISTERED,
            address,
            current_timestamp(),
        )
    }

    /// Creates an unsaved parcel from explicit field values.
    ///
    /// For callers that already know status and creation time, e.g. parcels
    /// handed to `ParcelService::add`, and tests.
    pub fn with_created_at(
        client: ClientId,
        status: impl Into<String>,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            number: 0,
            client,
            status: status.into(),
            address: address.into(),
            created_at: created_at.into(),
        }
    }

    /// Whether address change and deletion are still allowed.
    pub fn is_registered(&self) -> bool {
        self.status == PARCEL_STATUS_REGISTERED
    }

    /// Maps `status` to a known lifecycle value, if it is one.
    pub fn known_status(&self) -> Option<ParcelStatus> {
        ParcelStatus::parse(&self.status)
    }
}

/// Current UTC time as RFC3339 with second precision, e.g. `2024-01-01T00:00:00Z`.
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::{current_timestamp, Parcel, ParcelStatus, PARCEL_STATUS_REGISTERED};

    #[test]
    fn new_parcel_starts_registered_and_unsaved() {
        let parcel = Parcel::new(1000, "test");
        assert_eq!(parcel.number, 0);
        assert_eq!(parcel.status, PARCEL_STATUS_REGISTERED);
        assert!(parcel.is_registered());
        assert_eq!(parcel.known_status(), Some(ParcelStatus::Registered));
    }

    #[test]
    fn status_strings_roundtrip_through_enum() {
        for status in [
            ParcelStatus::Registered,
            ParcelStatus::Sent,
            ParcelStatus::Delivered,
        ] {
            assert_eq!(ParcelStatus::parse(status.as_str()), Some(status));
            assert_eq!(status.to_string(), status.as_str());
        }
        assert_eq!(ParcelStatus::parse("Registered"), None);
        assert_eq!(ParcelStatus::parse("lost"), None);
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let parcel = Parcel::with_created_at(7, "lost", "dock 4", "2024-01-01T00:00:00Z");
        assert!(!parcel.is_registered());
        assert_eq!(parcel.known_status(), None);
        assert_eq!(parcel.status, "lost");
    }

    #[test]
    fn timestamp_is_utc_rfc3339_seconds() {
        let stamp = current_timestamp();
        assert!(stamp.ends_with('Z'), "unexpected timestamp: {stamp}");
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
        assert!(!stamp.contains('.'));
    }
}
