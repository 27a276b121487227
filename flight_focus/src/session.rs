// THEORY:
// Session outcome types and the trip record handed to the logbook. The record's
// on-disk field names follow the logbook's JSON layout, not the Rust field names.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-level state owned by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InFlight,
    Landed,
    Crashed,
    Aborted,
}

impl SessionState {
    /// Landed, crashed and aborted sessions accept no further transitions
    /// other than returning home.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Landed | SessionState::Crashed | SessionState::Aborted
        )
    }
}

/// How a flight ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TripOutcome {
    Landed,
    Crashed,
    Aborted,
}

impl fmt::Display for TripOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripOutcome::Landed => write!(f, "LANDED"),
            TripOutcome::Crashed => write!(f, "CRASHED"),
            TripOutcome::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// One logbook line. Field names on disk follow the logbook's JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    #[serde(rename = "date", with = "minute_format")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "source")]
    pub origin: String,
    pub destination: String,
    #[serde(rename = "duration", default)]
    pub duration_hours: f64,
    #[serde(rename = "status")]
    pub outcome: TripOutcome,
}

impl TripRecord {
    /// Builds a record; the duration is rounded to two decimals.
    pub fn new(
        timestamp: NaiveDateTime,
        origin: impl Into<String>,
        destination: impl Into<String>,
        duration_hours: f64,
        outcome: TripOutcome,
    ) -> Self {
        Self {
            timestamp,
            origin: origin.into(),
            destination: destination.into(),
            duration_hours: (duration_hours.max(0.0) * 100.0).round() / 100.0,
            outcome,
        }
    }
}

/// Serializes timestamps as `YYYY-MM-DD HH:MM`.
mod minute_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, FORMAT).map_err(serde::de::Error::custom)
    }
}
