// THEORY:
// The `attention` module is the heart of the detection core. It turns a noisy,
// per-frame "distracted / not distracted" signal into a small number of discrete,
// well-ordered events: a warning countdown, a cleared warning, or a crash.
//
// Key architectural principles:
// 1.  **Debounce by Frame Count**: A single misclassified frame must never start a
//     warning. The tracker counts consecutive distracted frames and only escalates
//     once the count exceeds the tolerance. Any safe frame resets the count.
// 2.  **Escalate by Wall Clock**: Once escalation starts, the remaining time is a
//     function of elapsed real time since the warning began, not of how many frames
//     arrived. The countdown is recomputed on each frame, so a stalled camera pauses
//     it rather than letting it expire.
// 3.  **Rate-Limited Output**: Each remaining-second value is emitted at most once
//     per escalation episode, so the event stream carries at most one warning per
//     second regardless of the camera frame rate.
// 4.  **Terminal Crash**: `Crashed` is a one-shot transition. After it, the tracker
//     ignores every observation.
//
// The tracker is a pure state machine: it takes the frame's reason and the frame's
// arrival `Instant` and returns at most one event. It owns no thread, no clock and
// no channel, which makes it deterministic under test.

use crate::core_modules::detection::DistractionReason;
use std::time::{Duration, Instant};

/// The live attention state of one monitor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Safe,
    Warning {
        reason: DistractionReason,
        started_at: Instant,
    },
    Crashed(DistractionReason),
}

/// A transition reported by the attention monitor to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionEvent {
    Warning {
        seconds_remaining: u32,
        reason: DistractionReason,
    },
    ClearWarning,
    Crashed {
        reason: DistractionReason,
    },
}

/// Debounce and escalation state machine for a single monitor run.
#[derive(Debug, Clone)]
pub struct AttentionTracker {
    /// Distracted frames absorbed before a warning starts.
    tolerance: u32,
    /// Whole seconds between warning start and crash.
    window_secs: u64,
    /// Consecutive distracted frames seen so far.
    distracted_frames: u32,
    /// The last remaining-second value emitted in the current episode.
    last_emitted: Option<u32>,
    state: MonitorState,
}

impl AttentionTracker {
    pub fn new(tolerance: u32, window: Duration) -> Self {
        // A fractional window rounds up to the next whole second.
        let mut window_secs = window.as_secs();
        if window.subsec_nanos() > 0 {
            window_secs += 1;
        }
        Self {
            tolerance,
            window_secs: window_secs.max(1),
            distracted_frames: 0,
            last_emitted: None,
            state: MonitorState::Safe,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn distracted_frames(&self) -> u32 {
        self.distracted_frames
    }

    pub fn is_crashed(&self) -> bool {
        matches!(self.state, MonitorState::Crashed(_))
    }

    /// Feeds one classified frame into the state machine.
    ///
    /// `reason` is `None` for a safe frame. `now` is the frame's arrival time.
    pub fn observe(
        &mut self,
        reason: Option<DistractionReason>,
        now: Instant,
    ) -> Option<AttentionEvent> {
        if self.is_crashed() {
            return None;
        }

        let Some(reason) = reason else {
            self.distracted_frames = 0;
            return match self.state {
                MonitorState::Warning { .. } => {
                    self.state = MonitorState::Safe;
                    self.last_emitted = None;
                    Some(AttentionEvent::ClearWarning)
                }
                _ => None,
            };
        };

        self.distracted_frames = self.distracted_frames.saturating_add(1);
        if self.distracted_frames <= self.tolerance {
            return None;
        }

        let started_at = match self.state {
            MonitorState::Warning { started_at, .. } => started_at,
            _ => {
                self.last_emitted = None;
                now
            }
        };
        self.state = MonitorState::Warning { reason, started_at };

        let elapsed = now.saturating_duration_since(started_at).as_secs();
        let remaining = self.window_secs.saturating_sub(elapsed);
        if remaining == 0 {
            self.state = MonitorState::Crashed(reason);
            return Some(AttentionEvent::Crashed { reason });
        }

        let remaining = u32::try_from(remaining).unwrap_or(u32::MAX);
        if self.last_emitted == Some(remaining) {
            return None;
        }
        self.last_emitted = Some(remaining);
        Some(AttentionEvent::Warning {
            seconds_remaining: remaining,
            reason,
        })
    }
}
