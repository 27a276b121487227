// THEORY:
// Device-free frame producers and a scripted classifier. These stand in for a
// webcam, a video file and an object-detection model when none is available, and
// give tests and demos a deterministic flight.

use crate::core_modules::detection::{BoundingBox, Classifier, Detection, Label};
use crate::core_modules::frame::{Frame, FrameSource, LoopMedia};
use crate::error::FocusError;
use image::{Rgb, RgbImage};
use log::info;
use std::path::Path;
use std::thread;
use std::time::Duration;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// A camera that returns the same frame at a fixed interval.
pub struct SyntheticCamera {
    frame: Frame,
    interval: Duration,
}

impl SyntheticCamera {
    pub fn new(frame: Frame, interval: Duration) -> Self {
        Self { frame, interval }
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, FocusError> {
        thread::sleep(self.interval);
        Ok(Some(self.frame.clone()))
    }
}

/// An in-memory clip, loaded from a directory of still images or generated.
pub struct ImageSequence {
    frames: Vec<Frame>,
    position: usize,
    fps: Option<f64>,
}

impl ImageSequence {
    pub fn from_frames(frames: Vec<Frame>, fps: Option<f64>) -> Self {
        Self {
            frames,
            position: 0,
            fps,
        }
    }

    /// Loads every image in `dir`, ordered by file name.
    pub fn open_dir(dir: impl AsRef<Path>, fps: Option<f64>) -> Result<Self, FocusError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(FocusError::MediaUnavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        paths.sort();

        let frames = paths
            .iter()
            .map(|path| Ok(Frame::new(image::open(path)?.to_rgb8())))
            .collect::<Result<Vec<_>, FocusError>>()?;
        info!("loaded {} background frames from {}", frames.len(), dir.display());
        Ok(Self::from_frames(frames, fps))
    }

    /// A generated sky: a vertical blue gradient with a bright band drifting across.
    pub fn sky(width: u32, height: u32, count: u32) -> Self {
        let count = count.max(1);
        let frames = (0..count)
            .map(|index| {
                let band = (index * width / count) as i64;
                Frame::new(RgbImage::from_fn(width, height, |x, y| {
                    let depth = (y * 120 / height.max(1)) as u8;
                    if (x as i64 - band).abs() < (width / 16).max(1) as i64 && y < height / 3 {
                        Rgb([235, 235, 245])
                    } else {
                        Rgb([40 + depth / 2, 90 + depth, 200])
                    }
                }))
            })
            .collect();
        Self::from_frames(frames, Some(30.0))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LoopMedia for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>, FocusError> {
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<(), FocusError> {
        self.position = 0;
        Ok(())
    }

    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }
}

/// What the scripted classifier "sees" during one stretch of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    /// The pilot is in view with nothing in hand.
    Present,
    /// The pilot is in view holding a phone.
    Phone,
    /// Nobody is in view.
    Absent,
}

impl Scene {
    fn parse(name: &str) -> Result<Self, FocusError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "present" | "pilot" => Ok(Scene::Present),
            "phone" => Ok(Scene::Phone),
            "absent" | "empty" => Ok(Scene::Absent),
            other => Err(FocusError::InvalidScript(format!("unknown scene `{other}`"))),
        }
    }

    fn detections(&self) -> Vec<Detection> {
        let pilot = Detection::new(Label::Presence, 0.9, BoundingBox::new(60, 40, 260, 230));
        match self {
            Scene::Present => vec![pilot],
            Scene::Phone => vec![
                pilot,
                Detection::new(Label::HandheldDevice, 0.7, BoundingBox::new(150, 150, 190, 210)),
            ],
            Scene::Absent => Vec::new(),
        }
    }
}

/// A classifier that replays a looping script of scenes, ignoring the frame.
///
/// Scripts look like `present:200,phone:60,absent:400`: each entry is a scene
/// and the number of frames it lasts.
#[derive(Debug, Clone)]
pub struct ScriptedClassifier {
    script: Vec<(Scene, u32)>,
    entry: usize,
    frames_in_entry: u32,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<(Scene, u32)>) -> Result<Self, FocusError> {
        if script.iter().all(|(_, frames)| *frames == 0) {
            return Err(FocusError::InvalidScript("script has no frames".into()));
        }
        Ok(Self {
            script,
            entry: 0,
            frames_in_entry: 0,
        })
    }

    pub fn parse(script: &str) -> Result<Self, FocusError> {
        let entries = script
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| {
                let (scene, frames) = entry.split_once(':').ok_or_else(|| {
                    FocusError::InvalidScript(format!("`{entry}` is not `scene:frames`"))
                })?;
                let frames = frames.trim().parse::<u32>().map_err(|_| {
                    FocusError::InvalidScript(format!("`{frames}` is not a frame count"))
                })?;
                Ok((Scene::parse(scene)?, frames))
            })
            .collect::<Result<Vec<_>, FocusError>>()?;
        Self::new(entries)
    }

    fn current_scene(&mut self) -> Scene {
        while self.frames_in_entry >= self.script[self.entry].1 {
            self.entry = (self.entry + 1) % self.script.len();
            self.frames_in_entry = 0;
        }
        self.frames_in_entry += 1;
        self.script[self.entry].0
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&mut self, _frame: &Frame) -> Result<Vec<Detection>, FocusError> {
        Ok(self.current_scene().detections())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::detection::DistractionReason;
    use pretty_assertions::assert_eq;

    fn reasons(classifier: &mut ScriptedClassifier, frames: usize) -> Vec<Option<DistractionReason>> {
        let frame = Frame::filled(8, 8, [0, 0, 0]);
        (0..frames)
            .map(|_| {
                let detections = classifier.classify(&frame).unwrap();
                DistractionReason::from_detections(&detections, 0.4)
            })
            .collect()
    }

    #[test]
    fn script_plays_in_order_and_loops() {
        let mut classifier = ScriptedClassifier::parse("present:2, phone:1 ,absent:1").unwrap();
        assert_eq!(
            reasons(&mut classifier, 6),
            vec![
                None,
                None,
                Some(DistractionReason::PhoneDetected),
                Some(DistractionReason::PilotAbsence),
                None,
                None,
            ]
        );
    }

    #[test]
    fn zero_length_entries_are_skipped() {
        let mut classifier = ScriptedClassifier::parse("phone:0,absent:1").unwrap();
        assert_eq!(
            reasons(&mut classifier, 2),
            vec![Some(DistractionReason::PilotAbsence); 2]
        );
    }

    #[test]
    fn malformed_scripts_are_rejected() {
        for script in ["", "present", "present:x", "dancing:3", "phone:0"] {
            assert!(
                matches!(ScriptedClassifier::parse(script), Err(FocusError::InvalidScript(_))),
                "{script}"
            );
        }
    }

    #[test]
    fn sky_loops_through_generated_frames() {
        let mut sky = ImageSequence::sky(64, 36, 4);
        assert_eq!(sky.len(), 4);
        for _ in 0..4 {
            assert!(sky.next_frame().unwrap().is_some());
        }
        assert!(sky.next_frame().unwrap().is_none());
        sky.rewind().unwrap();
        assert!(sky.next_frame().unwrap().is_some());
    }

    #[test]
    fn open_dir_loads_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("b.png", 200u8), ("a.png", 100u8)] {
            RgbImage::from_pixel(4, 4, Rgb([shade, 0, 0]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut sequence = ImageSequence::open_dir(dir.path(), None).unwrap();

        assert_eq!(sequence.len(), 2);
        let first = sequence.next_frame().unwrap().unwrap();
        assert_eq!(first.image().get_pixel(0, 0)[0], 100);
    }

    #[test]
    fn open_dir_rejects_missing_directory() {
        assert!(matches!(
            ImageSequence::open_dir("/definitely/not/here", None),
            Err(FocusError::MediaUnavailable(_))
        ));
    }
}
