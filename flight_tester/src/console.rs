// THEORY:
// Terminal stand-ins for the cockpit screen and the sound system. Both write to the
// `log` facade, so `RUST_LOG` controls how chatty a flight is.

use flight_focus::{
    format_clock, AudioBackend, AudioChannel, Cue, DistractionReason, FeedKind, FocusError, Frame,
    Presentation,
};
use log::{debug, error, info, warn};
use std::time::Duration;

/// Writes every cockpit transition to the log and counts the frames it was handed.
#[derive(Default)]
pub struct ConsoleCockpit {
    background_frames: u64,
    preview_frames: u64,
}

impl ConsoleCockpit {
    fn report_frames(&self) {
        info!(
            "{} background and {} preview frames shown",
            self.background_frames, self.preview_frames
        );
    }
}

impl Presentation for ConsoleCockpit {
    fn show_background(&mut self, _frame: Frame) {
        self.background_frames += 1;
    }

    fn show_preview(&mut self, frame: Frame) {
        self.preview_frames += 1;
        if self.preview_frames == 1 {
            info!("camera preview live ({}x{})", frame.width(), frame.height());
        }
    }

    fn on_warning(&mut self, seconds_remaining: u32, reason: DistractionReason) {
        warn!("!! {reason} !! crash in {seconds_remaining}s");
    }

    fn on_clear_warning(&mut self) {
        info!("attention restored, warning cleared");
    }

    fn on_crashed(&mut self, reason: DistractionReason) {
        error!("CRASHED: {reason}");
        self.report_frames();
    }

    fn show_countdown(&mut self, remaining: Duration) {
        // Once a minute at info, every second at debug.
        if remaining.as_secs() % 60 == 0 {
            info!("time to landing {}", format_clock(remaining));
        } else {
            debug!("time to landing {}", format_clock(remaining));
        }
    }

    fn on_landed(&mut self, destination: &str) {
        info!("touchdown in {destination}");
        self.report_frames();
    }

    fn on_aborted(&mut self) {
        info!("flight aborted");
        self.report_frames();
    }

    fn on_feed_lost(&mut self, feed: FeedKind, error: &FocusError) {
        error!("{feed} feed lost, continuing without it: {error}");
    }
}

/// Audio backend that announces cues in the log instead of playing them.
pub struct ConsoleAudio;

impl AudioBackend for ConsoleAudio {
    fn play(&mut self, channel: AudioChannel, cue: Cue, looped: bool) -> Result<(), FocusError> {
        let mode = if looped { "looping" } else { "once" };
        debug!("audio: {cue:?} on {channel:?} ({mode})");
        Ok(())
    }

    fn stop(&mut self, channel: AudioChannel) -> Result<(), FocusError> {
        debug!("audio: {channel:?} stopped");
        Ok(())
    }
}
