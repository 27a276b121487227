// THEORY:
// The presentation boundary. The dispatcher pushes frames and transitions into a
// `Presentation`; it never reads anything back. A GUI, a terminal or a test
// recorder can sit behind it.

use crate::core_modules::detection::DistractionReason;
use crate::core_modules::frame::Frame;
use crate::error::FocusError;
use crate::task::FeedKind;
use std::time::Duration;

pub trait Presentation {
    /// Full-screen background video frame.
    fn show_background(&mut self, frame: Frame);

    /// Small camera preview tile.
    fn show_preview(&mut self, frame: Frame);

    fn on_warning(&mut self, seconds_remaining: u32, reason: DistractionReason);

    fn on_clear_warning(&mut self);

    fn on_crashed(&mut self, reason: DistractionReason);

    /// Time left in the flight, called once per whole second.
    fn show_countdown(&mut self, _remaining: Duration) {}

    fn on_landed(&mut self, _destination: &str) {}

    fn on_aborted(&mut self) {}

    /// A background feed stopped producing; its channel will stay stale.
    fn on_feed_lost(&mut self, _feed: FeedKind, _error: &FocusError) {}
}

/// Formats a countdown as `HH:MM:SS`.
pub fn format_clock(remaining: Duration) -> String {
    let total = remaining.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
