// THEORY:
// Real hardware for the flight runner, built on OpenCV. Everything here converts
// at the boundary: OpenCV `Mat`s become `flight_focus::Frame`s as soon as they are
// read, and OpenCV errors become `FocusError`s, so nothing past this module knows
// OpenCV exists.
//
// Key architectural principles:
// 1.  **Webcam**: a `FrameSource`. An empty read is "not ready yet", not an error.
// 2.  **VideoFile**: a `LoopMedia`. End of file is reported as `Ok(None)`; looping is
//     the feed's job, done by seeking back to frame zero.
// 3.  **YoloDetector**: a `Classifier` over a YOLOv8 ONNX export. The input blob is
//     built from the RGB frame directly, and the raw `[1, 84, 8400]` output is
//     decoded, filtered to the two labels the monitor cares about and de-duplicated
//     with non-maximum suppression.

use flight_focus::{
    BoundingBox, Classifier, Detection, FocusError, Frame, FrameSource, Label, LoopMedia,
};
use image::imageops::{self, FilterType};
use log::{debug, info};
use opencv::{
    core::{self, Mat, Rect, Scalar, Vector},
    dnn, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

fn capture_err(e: opencv::Error) -> FocusError {
    FocusError::Capture(e.to_string())
}

/// Converts a BGR `Mat` into an RGB frame. Empty mats yield `None`.
fn mat_to_frame(bgr: &Mat) -> Result<Option<Frame>, FocusError> {
    if bgr.empty() {
        return Ok(None);
    }
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(capture_err)?;
    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let data = rgb.data_bytes().map_err(capture_err)?.to_vec();
    Frame::from_raw(width, height, data)
        .map(Some)
        .ok_or_else(|| FocusError::Capture(format!("unexpected {width}x{height} buffer size")))
}

/// A camera opened by device index.
pub struct Webcam {
    capture: VideoCapture,
    buffer: Mat,
}

impl Webcam {
    pub fn open(index: i32) -> Result<Self, FocusError> {
        let unavailable = |reason: String| FocusError::CameraUnavailable(format!("camera {index}: {reason}"));
        let capture =
            VideoCapture::new(index, videoio::CAP_ANY).map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("could not be opened".into()));
        }
        info!("camera {index} opened");
        Ok(Self {
            capture,
            buffer: Mat::default(),
        })
    }
}

impl FrameSource for Webcam {
    fn next_frame(&mut self) -> Result<Option<Frame>, FocusError> {
        if !self.capture.read(&mut self.buffer).map_err(capture_err)? {
            return Ok(None);
        }
        mat_to_frame(&self.buffer)
    }
}

/// A video file played as looping background.
pub struct VideoFile {
    capture: VideoCapture,
    buffer: Mat,
}

impl VideoFile {
    pub fn open(path: &str) -> Result<Self, FocusError> {
        let unavailable = |reason: String| FocusError::MediaUnavailable(format!("{path}: {reason}"));
        let capture = VideoCapture::from_file(path, videoio::CAP_ANY)
            .map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("could not be opened".into()));
        }
        Ok(Self {
            capture,
            buffer: Mat::default(),
        })
    }
}

impl LoopMedia for VideoFile {
    fn next_frame(&mut self) -> Result<Option<Frame>, FocusError> {
        if !self.capture.read(&mut self.buffer).map_err(capture_err)? {
            return Ok(None);
        }
        mat_to_frame(&self.buffer)
    }

    fn rewind(&mut self) -> Result<(), FocusError> {
        self.capture
            .set(videoio::CAP_PROP_POS_FRAMES, 0.0)
            .map_err(capture_err)?;
        Ok(())
    }

    fn frame_rate(&self) -> Option<f64> {
        self.capture.get(videoio::CAP_PROP_FPS).ok()
    }
}

const INPUT_SIZE: u32 = 640;
/// Rows in the YOLOv8 output: 4 box coordinates followed by 80 COCO class scores.
const OUTPUT_ROWS: usize = 84;
const PERSON_CLASS: usize = 0;
const CELL_PHONE_CLASS: usize = 67;
/// Candidates below this score never reach NMS. The monitor applies its own,
/// usually higher, threshold afterwards.
const MIN_SCORE: f32 = 0.25;
const NMS_IOU: f32 = 0.45;

/// YOLOv8 object detector loaded from an ONNX file.
pub struct YoloDetector {
    net: dnn::Net,
    blob: Mat,
}

impl YoloDetector {
    pub fn load(model_path: &str) -> Result<Self, FocusError> {
        let net = dnn::read_net_from_onnx(model_path)
            .map_err(|e| FocusError::ClassifierUnavailable(format!("{model_path}: {e}")))?;
        let side = INPUT_SIZE as i32;
        let blob = Mat::new_nd_with_default(&[1, 3, side, side], core::CV_32F, Scalar::all(0.0))
            .map_err(|e| FocusError::ClassifierUnavailable(e.to_string()))?;
        info!("detector loaded from {model_path}");
        Ok(Self { net, blob })
    }

    /// Writes the frame into the NCHW input blob, stretched to the input size and
    /// scaled to `[0, 1]`.
    fn fill_blob(&mut self, frame: &Frame) -> Result<(), FocusError> {
        let resized = imageops::resize(frame.image(), INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
        let blob = self.blob.data_typed_mut::<f32>().map_err(classify_err)?;
        for (i, pixel) in resized.pixels().enumerate() {
            for channel in 0..3 {
                blob[channel * plane + i] = f32::from(pixel[channel]) / 255.0;
            }
        }
        Ok(())
    }

    fn decode(output: &[f32], frame: &Frame) -> Result<Vec<Detection>, FocusError> {
        let anchors = output.len() / OUTPUT_ROWS;
        let sx = frame.width() as f32 / INPUT_SIZE as f32;
        let sy = frame.height() as f32 / INPUT_SIZE as f32;
        let at = |row: usize, anchor: usize| output[row * anchors + anchor];

        let mut candidates = Vec::new();
        let mut boxes = Vector::<Rect>::new();
        let mut scores = Vector::<f32>::new();
        for anchor in 0..anchors {
            for (class, label) in [(PERSON_CLASS, Label::Presence), (CELL_PHONE_CLASS, Label::HandheldDevice)] {
                let score = at(4 + class, anchor);
                if score < MIN_SCORE {
                    continue;
                }
                let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
                let x0 = ((cx - w / 2.0) * sx).max(0.0);
                let y0 = ((cy - h / 2.0) * sy).max(0.0);
                let (bw, bh) = (w * sx, h * sy);
                boxes.push(Rect::new(x0 as i32, y0 as i32, bw as i32, bh as i32));
                scores.push(score);
                candidates.push((label, score));
            }
        }

        let mut keep = Vector::<i32>::new();
        dnn::nms_boxes(&boxes, &scores, MIN_SCORE, NMS_IOU, &mut keep, 1.0, 0).map_err(classify_err)?;

        let (max_x, max_y) = (frame.width().saturating_sub(1), frame.height().saturating_sub(1));
        let mut detections = Vec::with_capacity(keep.len());
        for index in keep {
            let index = index as usize;
            let rect = boxes.get(index).map_err(classify_err)?;
            let (label, score) = candidates[index];
            let bbox = BoundingBox::new(
                (rect.x as u32).min(max_x),
                (rect.y as u32).min(max_y),
                ((rect.x + rect.width) as u32).min(max_x),
                ((rect.y + rect.height) as u32).min(max_y),
            );
            detections.push(Detection::new(label, score, bbox));
        }
        Ok(detections)
    }
}

fn classify_err(e: opencv::Error) -> FocusError {
    FocusError::Classification(e.to_string())
}

impl Classifier for YoloDetector {
    fn classify(&mut self, frame: &Frame) -> Result<Vec<Detection>, FocusError> {
        self.fill_blob(frame)?;
        self.net
            .set_input(&self.blob, "", 1.0, Scalar::default())
            .map_err(classify_err)?;
        let output = self.net.forward_single("").map_err(classify_err)?;
        let data = output.data_typed::<f32>().map_err(classify_err)?;
        if data.len() % OUTPUT_ROWS != 0 {
            return Err(FocusError::Classification(format!(
                "unexpected detector output of {} values",
                data.len()
            )));
        }
        let detections = Self::decode(data, frame)?;
        debug!("{} detections", detections.len());
        Ok(detections)
    }
}
