// THEORY:
// This file is the main entry point for the `flight_focus` library crate, the engine
// of a flight-themed focus timer. The operator picks a destination, the countdown
// runs for the flight time, and a camera watches whether the pilot stays at the desk
// and off the phone. Sustained distraction escalates to a warning and then a crash.
//
// Key architectural principles:
// 1.  **Two producers, one consumer**: the attention monitor and the loop video feed
//     each run on their own thread and only ever push into channels. The
//     `Dispatcher` is the single consumer and the single owner of session state.
// 2.  **One discipline per channel**: the camera preview is a latest-wins slot, the
//     background video is a small bounded queue that drops when full, and attention
//     events are an unbounded FIFO where nothing is ever dropped.
// 3.  **Pure core**: the debounce/escalation logic (`core_modules::attention`) is a
//     plain state machine over injected timestamps, independent of cameras, threads
//     or clocks.
// 4.  **Capabilities at the edges**: cameras, classifiers, media, audio, presentation
//     and the logbook are traits. The crate ships synthetic implementations; real
//     devices plug in from the runner.

pub mod audio;
pub mod config;
pub mod core_modules;
pub mod destinations;
pub mod dispatcher;
pub mod error;
pub mod logbook;
pub mod loop_feed;
pub mod monitor;
pub mod presentation;
pub mod session;
pub mod sources;
pub mod task;

// Re-export the public surface used by runners.
pub use audio::{AudioBackend, AudioChannel, AudioService, Cue};
pub use config::FocusConfig;
pub use core_modules::attention::{AttentionEvent, AttentionTracker, MonitorState};
pub use core_modules::detection::{BoundingBox, Classifier, Detection, DistractionReason, Label};
pub use core_modules::frame::{Frame, FrameSource, LoopMedia};
pub use destinations::{Destination, FlightPlan, DESTINATIONS};
pub use dispatcher::{Dispatcher, FlightCrew};
pub use error::FocusError;
pub use logbook::{JsonLogbook, LogbookSummary, TripLog};
pub use presentation::{format_clock, Presentation};
pub use session::{SessionState, TripOutcome, TripRecord};
pub use task::{FeedKind, Opener};
