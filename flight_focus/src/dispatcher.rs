// THEORY:
// The `Dispatcher` is the single consumer of everything the background tasks
// produce, and the sole owner of the session. It is driven by an external tick
// (about 30 per second) and must never block: every read is a `try` read and an
// empty channel simply means there is nothing to do this tick.
//
// One tick performs, in order:
// 1.  **Background frame**: drain the video channel, show only the newest frame.
// 2.  **Preview frame**: take the camera preview slot if it holds a frame.
// 3.  **Attention events**: drain the event FIFO completely, applying each event in
//     the order the monitor produced it. Unlike frames, no event may be skipped.
// 4.  **Feed health**: collect any background task that has exited and report a
//     failure once. The session continues with stale data for that feed.
// 5.  **Countdown**: advance the flight clock and land when it runs out.
//
// Session transitions are terminal-once. The first of Landed / Crashed / Aborted
// writes exactly one trip record and tears both background tasks down; anything
// that arrives afterwards (a second crash, a late warning) is logged and ignored.

use crate::audio::{AudioService, Cue};
use crate::config::FocusConfig;
use crate::core_modules::attention::AttentionEvent;
use crate::core_modules::channels::{
    bounded_channel, fifo_channel, slot_channel, BoundedReceiver, BoundedSender, FifoReceiver,
    FifoSender, SlotReceiver, SlotSender,
};
use crate::core_modules::detection::Classifier;
use crate::core_modules::frame::{Frame, FrameSource, LoopMedia};
use crate::destinations::FlightPlan;
use crate::error::FocusError;
use crate::logbook::TripLog;
use crate::loop_feed::LoopVideoFeed;
use crate::monitor::AttentionMonitor;
use crate::presentation::Presentation;
use crate::session::{SessionState, TripOutcome, TripRecord};
use crate::task::{Opener, TaskHandle};
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

/// How to open the resources of one flight. Each opener runs on the thread of
/// the task that uses it.
pub struct FlightCrew {
    pub camera: Opener<Box<dyn FrameSource>>,
    pub classifier: Opener<Box<dyn Classifier>>,
    pub media: Opener<Box<dyn LoopMedia>>,
}

/// Producer ends of one flight's channels.
struct ProducerEnds {
    background: BoundedSender<Frame>,
    preview: SlotSender<Frame>,
    events: FifoSender<AttentionEvent>,
}

/// Consumer ends of one flight's channels.
struct ConsumerEnds {
    background: BoundedReceiver<Frame>,
    preview: SlotReceiver<Frame>,
    events: FifoReceiver<AttentionEvent>,
}

fn flight_channels(config: &FocusConfig) -> (ProducerEnds, ConsumerEnds) {
    let (background_tx, background_rx) = bounded_channel(config.background_capacity);
    let (preview_tx, preview_rx) = slot_channel();
    let (events_tx, events_rx) = fifo_channel();
    (
        ProducerEnds {
            background: background_tx,
            preview: preview_tx,
            events: events_tx,
        },
        ConsumerEnds {
            background: background_rx,
            preview: preview_rx,
            events: events_rx,
        },
    )
}

/// Everything that only exists while a flight is in the air.
struct Flight {
    plan: FlightPlan,
    started_at: Instant,
    ends: ConsumerEnds,
    tasks: Vec<TaskHandle>,
    warning_visible: bool,
    /// Last whole second shown on the countdown.
    last_shown: Option<u64>,
}

impl Flight {
    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
            .min(self.plan.duration())
    }
}

/// Tick-driven consumer and session owner.
pub struct Dispatcher {
    config: FocusConfig,
    presentation: Box<dyn Presentation>,
    audio: AudioService,
    logbook: Box<dyn TripLog>,
    state: SessionState,
    flight: Option<Flight>,
}

impl Dispatcher {
    /// Fails with `InvalidConfig` before anything is spawned if `config` does
    /// not validate.
    pub fn new(
        config: FocusConfig,
        presentation: Box<dyn Presentation>,
        audio: AudioService,
        logbook: Box<dyn TripLog>,
    ) -> Result<Self, FocusError> {
        config.validate()?;
        Ok(Self {
            config,
            presentation,
            audio,
            logbook,
            state: SessionState::Idle,
            flight: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    /// Takes off: spawns the attention monitor and the loop feed and starts the
    /// countdown. Only allowed when no flight is in the air.
    pub fn start_flight(
        &mut self,
        plan: FlightPlan,
        crew: FlightCrew,
        now: Instant,
    ) -> Result<(), FocusError> {
        if self.state == SessionState::InFlight {
            return Err(FocusError::SessionActive);
        }

        let (producers, consumers) = flight_channels(&self.config);
        let monitor = AttentionMonitor::spawn(
            self.config.clone(),
            crew.camera,
            crew.classifier,
            producers.preview,
            producers.events,
        )?;
        let feed = LoopVideoFeed::spawn(&self.config, crew.media, producers.background)?;

        self.board(plan, consumers, vec![monitor, feed], now);
        Ok(())
    }

    fn board(&mut self, plan: FlightPlan, ends: ConsumerEnds, tasks: Vec<TaskHandle>, now: Instant) {
        info!(
            "departing {} for {} ({})",
            self.config.origin,
            plan.destination(),
            plan.describe()
        );
        self.audio.stop_alarm();
        self.audio.play_music();
        self.state = SessionState::InFlight;
        self.flight = Some(Flight {
            plan,
            started_at: now,
            ends,
            tasks,
            warning_visible: false,
            last_shown: None,
        });
    }

    /// One non-blocking pass over every channel, then the countdown.
    pub fn tick(&mut self, now: Instant) -> SessionState {
        let Some(mut flight) = self.flight.take() else {
            return self.state;
        };

        if let Some(frame) = flight.ends.background.take_latest() {
            self.presentation.show_background(frame);
        }
        if let Some(frame) = flight.ends.preview.take() {
            self.presentation.show_preview(frame);
        }
        while let Some(event) = flight.ends.events.try_next() {
            self.apply(&mut flight, event, now);
        }
        self.reap(&mut flight);

        if self.state == SessionState::InFlight {
            self.advance_countdown(&mut flight, now);
        }

        if self.state == SessionState::InFlight {
            self.flight = Some(flight);
        } else {
            Self::teardown(flight);
        }
        self.state
    }

    /// Ends an in-flight session as aborted. Returns `false` when nothing was
    /// in the air.
    pub fn abort(&mut self, now: Instant) -> bool {
        if self.state != SessionState::InFlight {
            return false;
        }
        let Some(mut flight) = self.flight.take() else {
            return false;
        };
        self.hide_warning(&mut flight);
        self.presentation.on_aborted();
        self.audio.stop_music();
        self.finish(&flight, TripOutcome::Aborted, now);
        Self::teardown(flight);
        true
    }

    /// Leaves a finished session and goes back to idle, ready for another flight.
    pub fn return_home(&mut self) -> bool {
        if !self.state.is_terminal() {
            return false;
        }
        self.audio.stop_alarm();
        self.audio.play_music();
        self.state = SessionState::Idle;
        true
    }

    /// Aborts any flight still in the air and releases the audio service.
    pub fn shutdown(&mut self, now: Instant) {
        self.abort(now);
        self.audio.shutdown();
    }

    fn apply(&mut self, flight: &mut Flight, event: AttentionEvent, now: Instant) {
        if self.state != SessionState::InFlight {
            match event {
                AttentionEvent::Crashed { reason } => {
                    warn!("ignoring crash ({reason}) after the session already ended")
                }
                other => debug!("ignoring {other:?} after the session ended"),
            }
            return;
        }

        match event {
            AttentionEvent::Warning {
                seconds_remaining,
                reason,
            } => {
                self.presentation.on_warning(seconds_remaining, reason);
                self.audio.start_alarm();
                flight.warning_visible = true;
            }
            AttentionEvent::ClearWarning => {
                self.hide_warning(flight);
            }
            AttentionEvent::Crashed { reason } => {
                warn!("crashed: {reason}");
                self.hide_warning(flight);
                self.presentation.on_crashed(reason);
                self.audio.stop_music();
                self.audio.play_sfx(Cue::Alarm);
                self.finish(flight, TripOutcome::Crashed, now);
            }
        }
    }

    fn hide_warning(&mut self, flight: &mut Flight) {
        if flight.warning_visible {
            self.presentation.on_clear_warning();
            flight.warning_visible = false;
        }
        self.audio.stop_alarm();
    }

    fn reap(&mut self, flight: &mut Flight) {
        for task in &mut flight.tasks {
            match task.reap() {
                Some(Ok(())) => info!("{} finished", task.kind()),
                Some(Err(e)) => {
                    error!("{} stopped: {e}", task.kind());
                    self.presentation.on_feed_lost(task.kind(), &e);
                }
                None => {}
            }
        }
    }

    fn advance_countdown(&mut self, flight: &mut Flight, now: Instant) {
        let planned = flight.plan.duration();
        let elapsed = now.saturating_duration_since(flight.started_at);
        if elapsed >= planned {
            info!("landed in {}", flight.plan.destination());
            self.hide_warning(flight);
            self.presentation.on_landed(flight.plan.destination());
            self.audio.stop_music();
            self.audio.play_sfx(Cue::Cheer);
            self.finish(flight, TripOutcome::Landed, now);
            return;
        }

        let remaining = planned - elapsed;
        let shown = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        if flight.last_shown != Some(shown) {
            flight.last_shown = Some(shown);
            self.presentation.show_countdown(Duration::from_secs(shown));
        }
    }

    /// Records the terminal outcome. Called at most once per flight because
    /// every caller requires `InFlight` and this leaves it.
    fn finish(&mut self, flight: &Flight, outcome: TripOutcome, now: Instant) {
        self.state = match outcome {
            TripOutcome::Landed => SessionState::Landed,
            TripOutcome::Crashed => SessionState::Crashed,
            TripOutcome::Aborted => SessionState::Aborted,
        };
        let hours = match outcome {
            TripOutcome::Landed => flight.plan.hours(),
            TripOutcome::Crashed | TripOutcome::Aborted => {
                flight.elapsed(now).as_secs_f64() / 3600.0
            }
        };
        let record = TripRecord::new(
            chrono::Local::now().naive_local(),
            self.config.origin.clone(),
            flight.plan.destination(),
            hours,
            outcome,
        );
        self.logbook.save_trip(record);
    }

    fn teardown(flight: Flight) {
        for task in &flight.tasks {
            task.stop();
        }
        debug!("flight to {} torn down", flight.plan.destination());
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(flight) = self.flight.take() {
            Self::teardown(flight);
        }
    }
}
