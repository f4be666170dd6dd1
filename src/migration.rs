//! The snapshot format consumed by the one-time data migration.
//!
//! A snapshot is the export of a legacy client-local dataset: three
//! collections keyed by caller-local string identifiers, with no
//! uniqueness guarantees across collections. Decoding is lenient where
//! the legacy client was lenient (missing collections, missing amounts);
//! everything else is checked before the transactional import starts.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::types::Amount;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub events: Vec<LocalEvent>,
    #[serde(default)]
    pub participants: Vec<LocalParticipant>,
    #[serde(default)]
    pub participations: Vec<LocalParticipation>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEvent {
    pub id: String,
    pub name: String,
    pub date: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Amount>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LocalParticipant {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalParticipation {
    pub id: String,
    pub event_id: String,
    pub participant_id: String,
    #[serde(default)]
    pub is_winner: bool,
    #[serde(default)]
    pub paid_amount: Amount,
}

impl Snapshot {
    /// Build a snapshot from the three raw JSON arrays of the legacy
    /// client storage. A missing collection is treated as empty, the way
    /// the legacy client defaulted each storage key to `[]`.
    pub fn from_json(
        events: Option<&str>,
        participants: Option<&str>,
        participations: Option<&str>,
    ) -> serde_json::Result<Snapshot> {
        Ok(Snapshot {
            events: serde_json::from_str(events.unwrap_or("[]"))?,
            participants: serde_json::from_str(participants.unwrap_or("[]"))?,
            participations: serde_json::from_str(participations.unwrap_or("[]"))?,
        })
    }
}

/// Parse a snapshot event date. The legacy client stored either a plain
/// calendar date or a full RFC 3339 timestamp.
pub fn parse_snapshot_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(date).ok().map(|d| d.date_naive()))
}
