//! End-to-end flights with synthetic devices and real background threads.

use flight_focus::sources::{ImageSequence, ScriptedClassifier, SyntheticCamera};
use flight_focus::{
    AudioService, Classifier, Dispatcher, DistractionReason, FlightCrew, FlightPlan, FocusConfig,
    FocusError, Frame, FrameSource, JsonLogbook, LoopMedia, Presentation, SessionState,
    TripOutcome,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Background,
    Preview,
    Warning(u32, DistractionReason),
    Clear,
    Crashed(DistractionReason),
    Landed(String),
    Aborted,
}

#[derive(Clone, Default)]
struct Screen {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Screen {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn transitions(&self) -> Vec<Seen> {
        self.seen()
            .into_iter()
            .filter(|s| !matches!(s, Seen::Background | Seen::Preview))
            .collect()
    }

    fn count(&self, wanted: Seen) -> usize {
        self.seen().into_iter().filter(|s| *s == wanted).count()
    }

    fn push(&self, seen: Seen) {
        self.seen.lock().unwrap().push(seen);
    }
}

impl Presentation for Screen {
    fn show_background(&mut self, _frame: Frame) {
        self.push(Seen::Background);
    }

    fn show_preview(&mut self, _frame: Frame) {
        self.push(Seen::Preview);
    }

    fn on_warning(&mut self, seconds_remaining: u32, reason: DistractionReason) {
        self.push(Seen::Warning(seconds_remaining, reason));
    }

    fn on_clear_warning(&mut self) {
        self.push(Seen::Clear);
    }

    fn on_crashed(&mut self, reason: DistractionReason) {
        self.push(Seen::Crashed(reason));
    }

    fn on_landed(&mut self, destination: &str) {
        self.push(Seen::Landed(destination.to_string()));
    }

    fn on_aborted(&mut self) {
        self.push(Seen::Aborted);
    }
}

fn quick_config() -> FocusConfig {
    FocusConfig {
        tolerance_frames: 2,
        escalation_window_secs: 1,
        monitor_pacing_ms: 1,
        retry_delay_ms: 1,
        tick_interval_ms: 5,
        ..FocusConfig::default()
    }
}

fn crew(script: &'static str) -> FlightCrew {
    FlightCrew {
        camera: Box::new(|| -> Result<Box<dyn FrameSource>, FocusError> {
            let frame = Frame::filled(64, 48, [90, 90, 90]);
            Ok(Box::new(SyntheticCamera::new(frame, Duration::from_millis(2))))
        }),
        classifier: Box::new(move || -> Result<Box<dyn Classifier>, FocusError> {
            Ok(Box::new(ScriptedClassifier::parse(script)?))
        }),
        media: Box::new(|| -> Result<Box<dyn LoopMedia>, FocusError> {
            Ok(Box::new(ImageSequence::sky(32, 24, 6)))
        }),
    }
}

struct Cockpit {
    dispatcher: Dispatcher,
    screen: Screen,
    logbook: JsonLogbook,
    _dir: tempfile::TempDir,
}

fn cockpit() -> Cockpit {
    let dir = tempfile::tempdir().unwrap();
    let logbook = JsonLogbook::new(dir.path().join("flight_log.json"));
    let screen = Screen::default();
    let dispatcher = Dispatcher::new(
        quick_config(),
        Box::new(screen.clone()),
        AudioService::silent(),
        Box::new(logbook.clone()),
    )
    .unwrap();
    Cockpit {
        dispatcher,
        screen,
        logbook,
        _dir: dir,
    }
}

/// Ticks in real time until `done` holds or the deadline passes.
fn fly_until(
    dispatcher: &mut Dispatcher,
    limit: Duration,
    mut done: impl FnMut(SessionState) -> bool,
) -> SessionState {
    let deadline = Instant::now() + limit;
    loop {
        let state = dispatcher.tick(Instant::now());
        if done(state) || Instant::now() >= deadline {
            return state;
        }
        thread::sleep(dispatcher.config().tick_interval());
    }
}

#[test]
fn sustained_phone_use_crashes_the_flight() {
    let mut c = cockpit();
    c.dispatcher
        .start_flight(FlightPlan::to("Goa").unwrap(), crew("phone:1"), Instant::now())
        .unwrap();

    let state = fly_until(&mut c.dispatcher, Duration::from_secs(10), |s| s.is_terminal());

    assert_eq!(state, SessionState::Crashed);
    let phone = DistractionReason::PhoneDetected;
    assert_eq!(
        c.screen.transitions(),
        vec![Seen::Warning(1, phone), Seen::Clear, Seen::Crashed(phone)]
    );
    assert!(c.screen.count(Seen::Background) > 0);
    assert!(c.screen.count(Seen::Preview) > 0);

    let entries = c.logbook.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, TripOutcome::Crashed);
    assert_eq!(entries[0].destination, "Goa");
    assert_eq!(entries[0].origin, "DELHI");
}

#[test]
fn attentive_pilot_lands_and_can_fly_again() {
    let mut c = cockpit();
    let short_hop = FlightPlan::new("Ladakh", 0.0003).unwrap();
    c.dispatcher
        .start_flight(short_hop, crew("present:1"), Instant::now())
        .unwrap();

    let state = fly_until(&mut c.dispatcher, Duration::from_secs(10), |s| s.is_terminal());

    assert_eq!(state, SessionState::Landed);
    assert_eq!(c.screen.transitions(), vec![Seen::Landed("Ladakh".into())]);

    assert!(c.dispatcher.return_home());
    c.dispatcher
        .start_flight(FlightPlan::to("Pune").unwrap(), crew("present:1"), Instant::now())
        .unwrap();
    fly_until(&mut c.dispatcher, Duration::from_millis(200), |_| false);
    assert!(c.dispatcher.abort(Instant::now()));

    let outcomes: Vec<TripOutcome> = c
        .logbook
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| e.outcome)
        .collect();
    assert_eq!(outcomes, vec![TripOutcome::Landed, TripOutcome::Aborted]);
}

#[test]
fn brief_distraction_is_forgiven() {
    let mut c = cockpit();
    c.dispatcher
        .start_flight(
            FlightPlan::to("Kochi").unwrap(),
            crew("absent:4,present:100000"),
            Instant::now(),
        )
        .unwrap();

    let screen = c.screen.clone();
    let state = fly_until(&mut c.dispatcher, Duration::from_secs(5), |_| {
        screen.count(Seen::Clear) > 0
    });

    assert_eq!(state, SessionState::InFlight);
    assert_eq!(
        c.screen.transitions(),
        vec![Seen::Warning(1, DistractionReason::PilotAbsence), Seen::Clear]
    );

    c.dispatcher.shutdown(Instant::now());
    assert_eq!(c.dispatcher.state(), SessionState::Aborted);
}
