// THEORY:
// The logbook is an append-only history of flights. The engine hands it exactly one
// `TripRecord` per finished session and never reads it back; saving is
// fire-and-forget, and a failure to write is logged rather than allowed to disturb
// the session that just ended.
//
// `JsonLogbook` keeps the history as a single pretty-printed JSON array. A missing
// or unreadable file is treated as an empty history, so a corrupt logbook costs the
// old entries but never blocks a new one from being written.

use crate::error::FocusError;
use crate::session::{TripOutcome, TripRecord};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

/// The logging collaborator that receives finished trips.
pub trait TripLog {
    fn save_trip(&mut self, record: TripRecord);
}

/// A logbook stored as a JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonLogbook {
    path: PathBuf,
}

impl JsonLogbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every saved trip, oldest first.
    pub fn entries(&self) -> Result<Vec<TripRecord>, FocusError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Appends one trip and rewrites the file.
    pub fn append(&self, record: &TripRecord) -> Result<(), FocusError> {
        let mut entries = self.entries().unwrap_or_else(|e| {
            warn!("starting a fresh logbook, {} is unreadable: {e}", self.path.display());
            Vec::new()
        });
        entries.push(record.clone());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    pub fn summary(&self) -> Result<LogbookSummary, FocusError> {
        Ok(LogbookSummary::from_entries(&self.entries()?))
    }
}

impl TripLog for JsonLogbook {
    fn save_trip(&mut self, record: TripRecord) {
        match self.append(&record) {
            Ok(()) => info!(
                "logged {} flight to {} ({:.2} h)",
                record.outcome, record.destination, record.duration_hours
            ),
            Err(e) => error!("could not save trip to {}: {e}", self.path.display()),
        }
    }
}

/// Headline numbers for the logbook screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogbookSummary {
    pub flights: usize,
    pub landed: usize,
    /// Hours flown on flights that landed.
    pub hours_landed: f64,
}

impl LogbookSummary {
    pub fn from_entries(entries: &[TripRecord]) -> Self {
        let landed = entries.iter().filter(|e| e.outcome == TripOutcome::Landed);
        Self {
            flights: entries.len(),
            landed: landed.clone().count(),
            hours_landed: landed.map(|e| e.duration_hours).sum(),
        }
    }

    /// `landed/flights`, e.g. `3/5`.
    pub fn score(&self) -> String {
        format!("{}/{}", self.landed, self.flights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(destination: &str, hours: f64, outcome: TripOutcome) -> TripRecord {
        let timestamp = NaiveDate::from_ymd_opt(2025, 6, 1)
            .and_then(|d| d.and_hms_opt(18, 5, 0))
            .unwrap();
        TripRecord::new(timestamp, "DELHI", destination, hours, outcome)
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let logbook = JsonLogbook::new(dir.path().join("flight_log.json"));
        assert!(logbook.entries().unwrap().is_empty());
    }

    #[test]
    fn trips_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut logbook = JsonLogbook::new(dir.path().join("logs/flight_log.json"));

        logbook.save_trip(record("Pune", 2.0, TripOutcome::Landed));
        logbook.save_trip(record("Goa", 0.5, TripOutcome::Crashed));

        let entries = logbook.entries().unwrap();
        assert_eq!(
            entries.iter().map(|e| e.destination.as_str()).collect::<Vec<_>>(),
            vec!["Pune", "Goa"]
        );
        assert_eq!(entries[1], record("Goa", 0.5, TripOutcome::Crashed));
    }

    #[test]
    fn corrupt_file_is_replaced_on_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flight_log.json");
        std::fs::write(&path, "{ not json").unwrap();
        let mut logbook = JsonLogbook::new(&path);

        assert!(logbook.entries().is_err());
        logbook.save_trip(record("Kochi", 3.25, TripOutcome::Landed));

        assert_eq!(logbook.entries().unwrap().len(), 1);
    }

    #[test]
    fn summary_counts_only_landed_hours() {
        let entries = vec![
            record("Pune", 2.0, TripOutcome::Landed),
            record("Goa", 0.4, TripOutcome::Crashed),
            record("Kochi", 3.25, TripOutcome::Landed),
            record("Ladakh", 0.1, TripOutcome::Aborted),
        ];

        let summary = LogbookSummary::from_entries(&entries);

        assert_eq!(summary.flights, 4);
        assert_eq!(summary.landed, 2);
        assert_eq!(summary.hours_landed, 5.25);
        assert_eq!(summary.score(), "2/4");
    }
}
