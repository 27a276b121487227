// THEORY:
// The destination table and flight plans. A plan is validated once at construction,
// so the dispatcher can trust its duration for the whole flight.

use crate::error::FocusError;
use std::time::Duration;

/// A city the operator can fly to, with its planned flight time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    pub name: &'static str,
    pub flight_hours: f64,
}

pub const DESTINATIONS: [Destination; 9] = [
    Destination { name: "Pune", flight_hours: 2.0 },
    Destination { name: "Mumbai", flight_hours: 2.5 },
    Destination { name: "Udipi", flight_hours: 2.75 },
    Destination { name: "Goa", flight_hours: 2.5 },
    Destination { name: "Ladakh", flight_hours: 1.0 },
    Destination { name: "Kochi", flight_hours: 3.25 },
    Destination { name: "Jaipur", flight_hours: 1.5 },
    Destination { name: "Kolkata", flight_hours: 2.25 },
    Destination { name: "Chennai", flight_hours: 3.0 },
];

/// Case-insensitive lookup in [`DESTINATIONS`].
pub fn find(name: &str) -> Option<&'static Destination> {
    DESTINATIONS
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name.trim()))
}

/// Where a session is going and how long it is supposed to last.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightPlan {
    destination: String,
    duration: Duration,
}

impl FlightPlan {
    /// A plan for a listed destination.
    pub fn to(name: &str) -> Result<Self, FocusError> {
        let destination =
            find(name).ok_or_else(|| FocusError::UnknownDestination(name.to_string()))?;
        Self::new(destination.name, destination.flight_hours)
    }

    /// A plan with an explicit duration in hours.
    pub fn new(destination: impl Into<String>, hours: f64) -> Result<Self, FocusError> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(FocusError::InvalidConfig(format!(
                "flight duration must be positive, got {hours} h"
            )));
        }
        let duration = Duration::try_from_secs_f64(hours * 3600.0).map_err(|e| {
            FocusError::InvalidConfig(format!("flight duration of {hours} h is out of range: {e}"))
        })?;
        Ok(Self {
            destination: destination.into(),
            duration,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn hours(&self) -> f64 {
        self.duration.as_secs_f64() / 3600.0
    }

    /// Human-readable duration, e.g. `2 Hr 45 Min` or `3 Hours`.
    pub fn describe(&self) -> String {
        let total_minutes = self.duration.as_secs() / 60;
        let (hours, minutes) = (total_minutes / 60, total_minutes % 60);
        if minutes > 0 {
            format!("{hours} Hr {minutes} Min")
        } else {
            format!("{hours} Hours")
        }
    }
}
