// THEORY:
// The `LoopVideoFeed` is the simpler twin of the attention monitor. It plays a finite
// clip forever: read at the clip's own frame rate, rewind at the end, repeat. It has
// no state machine; its only job is to keep the background channel supplied without
// ever running ahead of a slow consumer.
//
// Backpressure is by dropping. The background channel holds at most a couple of
// frames; when it is full the newly read frame is discarded on this side and the
// feed moves on. The dispatcher always shows the newest frame it finds, so a dropped
// frame is simply never seen.

use crate::config::FocusConfig;
use crate::core_modules::channels::{BoundedSender, Offer, StopSignal, StopToken};
use crate::core_modules::frame::{Frame, LoopMedia};
use crate::error::FocusError;
use crate::task::{FeedKind, Opener, TaskHandle};
use log::{debug, error, info, warn};
use std::thread;
use std::time::Duration;

/// Used when neither the clip nor the configuration gives a usable frame rate.
const FALLBACK_DELAY: Duration = Duration::from_nanos(33_333_333);

/// Time between frames at `fps`, or `None` for rates no `Duration` can express.
fn frame_delay(fps: f64) -> Option<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / fps).ok()
}

/// Replays a media clip in a loop onto the background channel.
pub struct LoopVideoFeed {
    media: Box<dyn LoopMedia>,
    frames: BoundedSender<Frame>,
    /// Time between two frames at the clip's frame rate.
    delay: Duration,
    /// Frames discarded because the consumer had not caught up.
    dropped: u64,
}

impl LoopVideoFeed {
    pub fn new(media: Box<dyn LoopMedia>, frames: BoundedSender<Frame>, default_fps: f64) -> Self {
        let delay = media
            .frame_rate()
            .and_then(frame_delay)
            .or_else(|| frame_delay(default_fps))
            .unwrap_or(FALLBACK_DELAY);
        Self {
            media,
            frames,
            delay,
            dropped: 0,
        }
    }

    /// Starts the feed on its own thread; the media is opened on that thread.
    pub fn spawn(
        config: &FocusConfig,
        media: Opener<Box<dyn LoopMedia>>,
        frames: BoundedSender<Frame>,
    ) -> Result<TaskHandle, FocusError> {
        let stop = StopSignal::new();
        let token = stop.token();
        let default_fps = config.default_fps;
        TaskHandle::spawn(FeedKind::LoopVideo, stop, move || {
            let media = media().inspect_err(|e| error!("background media failed to open: {e}"))?;
            let mut feed = LoopVideoFeed::new(media, frames, default_fps);
            info!("loop video running at {:.1} fps", 1.0 / feed.delay.as_secs_f64());
            feed.run(&token)
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Runs until `stop` is raised or the consumer disappears.
    ///
    /// Ends with `FocusError::EmptyMedia` if the clip has no frames at all.
    pub fn run(&mut self, stop: &StopToken) -> Result<(), FocusError> {
        while !stop.is_stopped() {
            let frame = match self.next_looped() {
                Ok(frame) => frame,
                Err(FocusError::EmptyMedia) => {
                    error!("background media has no frames");
                    return Err(FocusError::EmptyMedia);
                }
                Err(e) => {
                    warn!("background frame read failed: {e}");
                    thread::sleep(self.delay);
                    continue;
                }
            };

            match self.frames.offer(frame) {
                Offer::Sent => {}
                Offer::Dropped => self.dropped += 1,
                Offer::Closed => {
                    info!("background consumer gone, loop video exiting");
                    break;
                }
            }
            thread::sleep(self.delay);
        }
        debug!("loop video stopped after dropping {} frames", self.dropped);
        Ok(())
    }

    /// Reads the next frame, rewinding to the first frame at end of stream.
    pub fn next_looped(&mut self) -> Result<Frame, FocusError> {
        if let Some(frame) = self.media.next_frame()? {
            return Ok(frame);
        }
        debug!("end of background clip, rewinding");
        self.media.rewind()?;
        self.media.next_frame()?.ok_or(FocusError::EmptyMedia)
    }
}
