// THEORY:
// `FocusConfig` is the single tuning surface of the engine. Every constant the
// detection core relies on (the debounce tolerance, the escalation window, the
// classifier confidence floor) lives here instead of being scattered through the
// modules, so the monitor, the feed and the dispatcher all read from one place.
//
// The struct is plain data with serde defaults: a partial JSON file only needs to
// name the values it changes. Durations are stored as integer seconds/milliseconds
// to keep the file format obvious, and exposed as `Duration` through accessors.

use crate::error::FocusError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a flight, shared by every engine component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Consecutive distracted frames absorbed before a warning begins.
    pub tolerance_frames: u32,
    /// Grace period between warning start and crash, in whole seconds.
    pub escalation_window_secs: u64,
    /// Detections below this confidence are ignored by the monitor.
    pub confidence_threshold: f32,
    /// Width of the downsized camera preview.
    pub preview_width: u32,
    /// Height of the downsized camera preview.
    pub preview_height: u32,
    /// Sleep between two processed camera frames.
    pub monitor_pacing_ms: u64,
    /// Sleep after a missing frame or a failed classification.
    pub retry_delay_ms: u64,
    /// Frame rate used when the looping media does not declare one.
    pub default_fps: f64,
    /// Capacity of the background video channel.
    pub background_capacity: usize,
    /// Interval between two dispatcher ticks.
    pub tick_interval_ms: u64,
    /// Departure city written into every trip record.
    pub origin: String,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            tolerance_frames: 10,
            escalation_window_secs: 15,
            confidence_threshold: 0.4,
            preview_width: 240,
            preview_height: 180,
            monitor_pacing_ms: 50,
            retry_delay_ms: 100,
            default_fps: 30.0,
            background_capacity: 2,
            tick_interval_ms: 33,
            origin: String::from("DELHI"),
        }
    }
}

impl FocusConfig {
    /// Loads a configuration from a JSON file, filling missing fields with defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FocusError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FocusError> {
        if self.escalation_window_secs == 0 {
            return Err(FocusError::InvalidConfig(
                "escalation_window_secs must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(FocusError::InvalidConfig(format!(
                "confidence_threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.preview_width == 0 || self.preview_height == 0 {
            return Err(FocusError::InvalidConfig(
                "preview dimensions must be non-zero".into(),
            ));
        }
        if self.background_capacity == 0 {
            return Err(FocusError::InvalidConfig(
                "background_capacity must be non-zero".into(),
            ));
        }
        if !self.default_fps.is_finite() || self.default_fps <= 0.0 {
            return Err(FocusError::InvalidConfig(format!(
                "default_fps {} must be a positive frame rate",
                self.default_fps
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(FocusError::InvalidConfig("tick_interval_ms must be non-zero".into()));
        }
        Ok(())
    }

    pub fn escalation_window(&self) -> Duration {
        Duration::from_secs(self.escalation_window_secs)
    }

    pub fn monitor_pacing(&self) -> Duration {
        Duration::from_millis(self.monitor_pacing_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
