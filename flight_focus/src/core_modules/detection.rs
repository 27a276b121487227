// THEORY:
// The `detection` module is the boundary between the opaque object classifier and
// the attention logic. The classifier speaks in class names and boxes; the engine
// only cares about two semantic facts per frame: is the pilot in view, and is a
// handheld device in view. `DistractionReason::from_detections` collapses a frame's
// detection set into at most one reason, applying the confidence floor itself
// rather than trusting the classifier to have done so.

use crate::core_modules::frame::Frame;
use crate::error::FocusError;
use std::fmt;

/// The semantic classes the attention logic reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Presence,
    HandheldDevice,
    Other,
}

impl Label {
    /// Maps a COCO-style class name onto a label.
    pub fn from_class_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "person" => Label::Presence,
            "cell phone" | "mobile phone" => Label::HandheldDevice,
            _ => Label::Other,
        }
    }
}

/// An axis-aligned box in pixel coordinates, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn scaled(&self, scale_x: f32, scale_y: f32) -> Self {
        Self::new(
            (self.x0 as f32 * scale_x) as u32,
            (self.y0 as f32 * scale_y) as u32,
            (self.x1 as f32 * scale_x) as u32,
            (self.y1 as f32 * scale_y) as u32,
        )
    }
}

/// One labeled box reported by the classifier for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: Label,
    /// Classifier confidence in [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: Label, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }
}

/// Black-box object classifier.
///
/// Implementations should return an empty set for frames they cannot make
/// sense of; `Err` is reserved for failures of the classifier itself, which
/// the monitor treats as a skipped frame.
pub trait Classifier {
    fn classify(&mut self, frame: &Frame) -> Result<Vec<Detection>, FocusError>;
}

/// Why a frame counts as distracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistractionReason {
    PhoneDetected,
    PilotAbsence,
}

impl DistractionReason {
    /// Derives the distraction reason for one frame, or `None` for a safe frame.
    ///
    /// A handheld device wins over an absent pilot when both hold.
    pub fn from_detections(detections: &[Detection], threshold: f32) -> Option<Self> {
        let seen = |label: Label| {
            detections
                .iter()
                .any(|d| d.label == label && d.confidence >= threshold)
        };

        if seen(Label::HandheldDevice) {
            Some(DistractionReason::PhoneDetected)
        } else if !seen(Label::Presence) {
            Some(DistractionReason::PilotAbsence)
        } else {
            None
        }
    }
}

impl fmt::Display for DistractionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistractionReason::PhoneDetected => write!(f, "PHONE DETECTED"),
            DistractionReason::PilotAbsence => write!(f, "PILOT ABSENCE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: Label, confidence: f32) -> Detection {
        Detection::new(label, confidence, BoundingBox::default())
    }

    #[test]
    fn pilot_alone_is_safe() {
        let detections = vec![detection(Label::Presence, 0.8)];
        assert_eq!(DistractionReason::from_detections(&detections, 0.4), None);
    }

    #[test]
    fn empty_frame_is_absence() {
        assert_eq!(
            DistractionReason::from_detections(&[], 0.4),
            Some(DistractionReason::PilotAbsence)
        );
    }

    #[test]
    fn phone_wins_over_absence() {
        let detections = vec![detection(Label::HandheldDevice, 0.6)];
        assert_eq!(
            DistractionReason::from_detections(&detections, 0.4),
            Some(DistractionReason::PhoneDetected)
        );
    }

    #[test]
    fn phone_next_to_pilot_is_distraction() {
        let detections = vec![detection(Label::Presence, 0.9), detection(Label::HandheldDevice, 0.5)];
        assert_eq!(
            DistractionReason::from_detections(&detections, 0.4),
            Some(DistractionReason::PhoneDetected)
        );
    }

    #[test]
    fn threshold_is_enforced_by_caller() {
        let detections = vec![detection(Label::Presence, 0.3), detection(Label::HandheldDevice, 0.39)];
        assert_eq!(
            DistractionReason::from_detections(&detections, 0.4),
            Some(DistractionReason::PilotAbsence)
        );
    }

    #[test]
    fn class_names_map_to_labels() {
        assert_eq!(Label::from_class_name("person"), Label::Presence);
        assert_eq!(Label::from_class_name("cell phone"), Label::HandheldDevice);
        assert_eq!(Label::from_class_name("Mobile Phone"), Label::HandheldDevice);
        assert_eq!(Label::from_class_name("dog"), Label::Other);
    }

    #[test]
    fn bounding_box_normalizes_corners() {
        let bbox = BoundingBox::new(10, 20, 5, 2);
        assert_eq!(bbox, BoundingBox { x0: 5, y0: 2, x1: 10, y1: 20 });
    }
}
