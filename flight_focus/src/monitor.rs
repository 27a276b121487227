// THEORY:
// The `AttentionMonitor` is the background half of the detection core. It owns the
// camera, the classifier and the `AttentionTracker`, and nothing else in the
// process touches any of them. Its loop is deliberately simple:
//
//   acquire frame -> classify -> publish preview -> derive reason -> track -> emit
//
// Key architectural principles:
// 1.  **Confined Blocking**: Camera reads and classification may block for as long
//     as they like. That cost stays on this thread; the dispatcher only ever sees
//     non-blocking channel reads.
// 2.  **Skip, Don't Guess**: A missing frame or a classifier failure is neither a
//     safe frame nor a distracted one. The iteration is skipped, the tracker is not
//     touched, and the loop retries after a short delay.
// 3.  **Two Outputs, Two Disciplines**: Previews go into a single-slot buffer where
//     the newest always wins. Attention events go into a lossless FIFO because the
//     dispatcher must replay Warning / ClearWarning / Crashed in order.
// 4.  **Cooperative Stop**: The stop flag is checked once per iteration. A read or
//     classification already in flight completes before the thread exits.

use crate::config::FocusConfig;
use crate::core_modules::attention::{AttentionEvent, AttentionTracker};
use crate::core_modules::channels::{FifoSender, SlotSender, StopSignal, StopToken};
use crate::core_modules::detection::{Classifier, DistractionReason};
use crate::core_modules::frame::{Frame, FrameSource};
use crate::error::FocusError;
use crate::task::{FeedKind, Opener, TaskHandle};
use log::{debug, error, info, warn};
use std::thread;
use std::time::Instant;

/// What a single monitor iteration achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A frame was classified and fed to the tracker.
    Processed,
    /// No frame, or the classifier failed; nothing was counted.
    Skipped,
    /// The event consumer has gone away.
    Disconnected,
}

/// Pulls camera frames, classifies them and reports attention transitions.
pub struct AttentionMonitor {
    config: FocusConfig,
    camera: Box<dyn FrameSource>,
    classifier: Box<dyn Classifier>,
    tracker: AttentionTracker,
    preview: SlotSender<Frame>,
    events: FifoSender<AttentionEvent>,
    /// Consecutive skipped iterations, used to keep transient failures quiet.
    failure_streak: u32,
}

impl AttentionMonitor {
    pub fn new(
        config: FocusConfig,
        camera: Box<dyn FrameSource>,
        classifier: Box<dyn Classifier>,
        preview: SlotSender<Frame>,
        events: FifoSender<AttentionEvent>,
    ) -> Self {
        let tracker = AttentionTracker::new(config.tolerance_frames, config.escalation_window());
        Self {
            config,
            camera,
            classifier,
            tracker,
            preview,
            events,
            failure_streak: 0,
        }
    }

    /// Starts the monitor on its own thread.
    ///
    /// The classifier and camera are opened on that thread; if either fails the
    /// task ends with the error and the caller learns about it by reaping the
    /// returned handle.
    pub fn spawn(
        config: FocusConfig,
        camera: Opener<Box<dyn FrameSource>>,
        classifier: Opener<Box<dyn Classifier>>,
        preview: SlotSender<Frame>,
        events: FifoSender<AttentionEvent>,
    ) -> Result<TaskHandle, FocusError> {
        let stop = StopSignal::new();
        let token = stop.token();
        TaskHandle::spawn(FeedKind::AttentionMonitor, stop, move || {
            info!("loading classifier");
            let classifier = classifier().inspect_err(|e| error!("classifier failed to load: {e}"))?;
            let camera = camera().inspect_err(|e| error!("camera failed to open: {e}"))?;
            info!("attention monitor ready");

            let mut monitor = AttentionMonitor::new(config, camera, classifier, preview, events);
            monitor.run(&token)
        })
    }

    /// Runs until `stop` is raised or the event consumer disappears.
    pub fn run(&mut self, stop: &StopToken) -> Result<(), FocusError> {
        while !stop.is_stopped() {
            match self.step() {
                Step::Processed => thread::sleep(self.config.monitor_pacing()),
                Step::Skipped => thread::sleep(self.config.retry_delay()),
                Step::Disconnected => {
                    info!("event consumer gone, attention monitor exiting");
                    break;
                }
            }
        }
        debug!("attention monitor stopped");
        Ok(())
    }

    /// Performs one acquire / classify / track iteration.
    pub fn step(&mut self) -> Step {
        let frame = match self.camera.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.skip(None),
            Err(e) => return self.skip(Some(e)),
        };

        let detections = match self.classifier.classify(&frame) {
            Ok(detections) => detections,
            Err(e) => return self.skip(Some(e)),
        };
        self.failure_streak = 0;

        let threshold = self.config.confidence_threshold;
        let preview = frame.annotated_preview(
            self.config.preview_width,
            self.config.preview_height,
            &detections,
            threshold,
        );
        drop(frame);
        self.preview.publish(preview);

        let reason = DistractionReason::from_detections(&detections, threshold);
        match self.tracker.observe(reason, Instant::now()) {
            Some(event) => {
                debug!("attention event: {event:?}");
                if self.events.send(event) {
                    Step::Processed
                } else {
                    Step::Disconnected
                }
            }
            None => Step::Processed,
        }
    }

    pub fn tracker(&self) -> &AttentionTracker {
        &self.tracker
    }

    fn skip(&mut self, error: Option<FocusError>) -> Step {
        self.failure_streak = self.failure_streak.saturating_add(1);
        match error {
            Some(e) if self.failure_streak == 1 => warn!("skipping frame: {e}"),
            Some(e) => debug!("skipping frame: {e}"),
            None => debug!("no frame ready"),
        }
        Step::Skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::channels::{fifo_channel, slot_channel, FifoReceiver, SlotReceiver};
    use crate::core_modules::detection::{BoundingBox, Detection, Label};
    use crate::core_modules::attention::MonitorState;
    use std::collections::VecDeque;

    /// Camera that replays a fixed list of reads.
    struct ScriptedCamera {
        reads: VecDeque<Result<Option<Frame>, FocusError>>,
    }

    impl FrameSource for ScriptedCamera {
        fn next_frame(&mut self) -> Result<Option<Frame>, FocusError> {
            self.reads
                .pop_front()
                .unwrap_or_else(|| Ok(Some(Frame::filled(64, 48, [0, 0, 0]))))
        }
    }

    /// Classifier that replays a fixed list of results, then reports an empty room.
    struct ReplayClassifier {
        results: VecDeque<Result<Vec<Detection>, FocusError>>,
    }

    impl Classifier for ReplayClassifier {
        fn classify(&mut self, _frame: &Frame) -> Result<Vec<Detection>, FocusError> {
            self.results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn pilot() -> Vec<Detection> {
        vec![Detection::new(Label::Presence, 0.9, BoundingBox::new(4, 4, 40, 40))]
    }

    fn monitor_with(
        camera: ScriptedCamera,
        classifier: ReplayClassifier,
    ) -> (AttentionMonitor, SlotReceiver<Frame>, FifoReceiver<AttentionEvent>) {
        let (preview_tx, preview_rx) = slot_channel();
        let (events_tx, events_rx) = fifo_channel();
        let monitor = AttentionMonitor::new(
            FocusConfig::default(),
            Box::new(camera),
            Box::new(classifier),
            preview_tx,
            events_tx,
        );
        (monitor, preview_rx, events_rx)
    }

    #[test]
    fn missing_frames_do_not_touch_counter() {
        let camera = ScriptedCamera {
            reads: VecDeque::from(vec![
                Ok(None),
                Err(FocusError::Capture("usb hiccup".into())),
                Ok(Some(Frame::filled(64, 48, [0, 0, 0]))),
            ]),
        };
        let classifier = ReplayClassifier { results: VecDeque::new() };
        let (mut monitor, _preview, _events) = monitor_with(camera, classifier);

        assert_eq!(monitor.step(), Step::Skipped);
        assert_eq!(monitor.step(), Step::Skipped);
        assert_eq!(monitor.tracker().distracted_frames(), 0);
        assert_eq!(monitor.step(), Step::Processed);
        assert_eq!(monitor.tracker().distracted_frames(), 1);
    }

    #[test]
    fn classifier_failure_is_skipped() {
        let camera = ScriptedCamera { reads: VecDeque::new() };
        let classifier = ReplayClassifier {
            results: VecDeque::from(vec![Err(FocusError::Classification("model busy".into()))]),
        };
        let (mut monitor, preview, _events) = monitor_with(camera, classifier);

        assert_eq!(monitor.step(), Step::Skipped);
        assert!(preview.take().is_none());
        assert_eq!(monitor.tracker().distracted_frames(), 0);
    }

    #[test]
    fn every_processed_frame_refreshes_preview() {
        let camera = ScriptedCamera { reads: VecDeque::new() };
        let classifier = ReplayClassifier {
            results: VecDeque::from(vec![Ok(pilot()), Ok(pilot())]),
        };
        let (mut monitor, preview, _events) = monitor_with(camera, classifier);

        monitor.step();
        monitor.step();

        let frame = preview.take().expect("preview published");
        assert_eq!((frame.width(), frame.height()), (240, 180));
        assert!(preview.take().is_none());
    }

    #[test]
    fn eleven_absent_frames_emit_first_warning() {
        let camera = ScriptedCamera { reads: VecDeque::new() };
        let classifier = ReplayClassifier { results: VecDeque::new() };
        let (mut monitor, _preview, mut events) = monitor_with(camera, classifier);

        for _ in 0..10 {
            monitor.step();
        }
        assert!(events.try_next().is_none());

        monitor.step();
        assert_eq!(
            events.try_next(),
            Some(AttentionEvent::Warning {
                seconds_remaining: 15,
                reason: DistractionReason::PilotAbsence
            })
        );
        assert!(matches!(monitor.tracker().state(), MonitorState::Warning { .. }));
    }

    #[test]
    fn dropped_consumer_disconnects() {
        let camera = ScriptedCamera { reads: VecDeque::new() };
        let classifier = ReplayClassifier { results: VecDeque::new() };
        let (mut monitor, _preview, events) = monitor_with(camera, classifier);
        drop(events);

        let steps: Vec<Step> = (0..11).map(|_| monitor.step()).collect();
        assert_eq!(steps.last(), Some(&Step::Disconnected));
    }

    #[test]
    fn spawned_monitor_reports_camera_failure() {
        let (preview_tx, _preview_rx) = slot_channel();
        let (events_tx, _events_rx) = fifo_channel();
        let handle = AttentionMonitor::spawn(
            FocusConfig::default(),
            Box::new(|| -> Result<Box<dyn FrameSource>, FocusError> {
                Err(FocusError::CameraUnavailable("index 0".into()))
            }),
            Box::new(|| Ok(Box::new(ReplayClassifier { results: VecDeque::new() }) as Box<dyn Classifier>)),
            preview_tx,
            events_tx,
        )
        .unwrap();

        assert!(matches!(handle.join(), Err(FocusError::CameraUnavailable(_))));
    }

    #[test]
    fn spawned_monitor_stops_on_request() {
        let (preview_tx, preview_rx) = slot_channel();
        let (events_tx, _events_rx) = fifo_channel();
        let handle = AttentionMonitor::spawn(
            FocusConfig {
                monitor_pacing_ms: 1,
                ..FocusConfig::default()
            },
            Box::new(|| {
                Ok(Box::new(ScriptedCamera { reads: VecDeque::new() }) as Box<dyn FrameSource>)
            }),
            Box::new(|| {
                Ok(Box::new(ReplayClassifier {
                    results: VecDeque::from(vec![Ok(pilot())]),
                }) as Box<dyn Classifier>)
            }),
            preview_tx,
            events_tx,
        )
        .unwrap();

        while preview_rx.take().is_none() {
            thread::sleep(std::time::Duration::from_millis(1));
        }
        handle.stop();
        assert!(handle.join().is_ok());
    }
}
