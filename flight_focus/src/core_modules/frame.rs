// THEORY:
// The `frame` module defines the unit of data that flows through every channel in
// the engine. A `Frame` is an owned RGB image: once a producer hands it to a
// channel it is never touched again, and the single consumer on the other side
// receives it by value. Nothing in the engine mutates a frame after publication.
//
// Key architectural principles:
// 1.  **Ownership Transfer**: Frames move, they are not shared. The camera thread
//     creates one, derives a small preview copy for the operator tile, and lets
//     the original drop once classification is done.
// 2.  **Source Abstraction**: The two frame producers the engine knows about are
//     expressed as traits. `FrameSource` is a live device that may simply have
//     nothing ready yet; `LoopMedia` is a finite clip that can be rewound. The
//     engine never knows whether it is talking to a webcam, a video file or a
//     synthetic generator.

use crate::core_modules::detection::{BoundingBox, Detection, Label};
use crate::error::FocusError;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

const PRESENCE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DEVICE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// An immutable RGB picture produced by a camera or a media clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Wraps a tightly packed RGB buffer. Returns `None` when the buffer length
    /// does not match `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    /// A frame where every pixel has the same color.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Downsizes the frame for the preview tile.
    pub fn preview(&self, width: u32, height: u32) -> Frame {
        Frame::new(imageops::resize(&self.image, width, height, FilterType::Triangle))
    }

    /// Downsizes the frame and outlines the relevant detections on the result:
    /// green for the pilot, red for a handheld device. `Other` labels and
    /// detections under `threshold` are not drawn.
    pub fn annotated_preview(
        &self,
        width: u32,
        height: u32,
        detections: &[Detection],
        threshold: f32,
    ) -> Frame {
        let mut preview = self.preview(width, height);
        if self.width() == 0 || self.height() == 0 {
            return preview;
        }
        let scale_x = width as f32 / self.width() as f32;
        let scale_y = height as f32 / self.height() as f32;

        for detection in detections.iter().filter(|d| d.confidence >= threshold) {
            let color = match detection.label {
                Label::Presence => PRESENCE_COLOR,
                Label::HandheldDevice => DEVICE_COLOR,
                Label::Other => continue,
            };
            let scaled = detection.bbox.scaled(scale_x, scale_y);
            draw_outline(&mut preview.image, &scaled, color);
        }
        preview
    }
}

/// Draws a one pixel wide rectangle, clipped to the image bounds.
fn draw_outline(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || bbox.x0 >= width || bbox.y0 >= height {
        return;
    }
    let x1 = bbox.x1.min(width - 1);
    let y1 = bbox.y1.min(height - 1);

    for x in bbox.x0..=x1 {
        image.put_pixel(x, bbox.y0, color);
        image.put_pixel(x, y1, color);
    }
    for y in bbox.y0..=y1 {
        image.put_pixel(bbox.x0, y, color);
        image.put_pixel(x1, y, color);
    }
}

/// A live camera-like device.
pub trait FrameSource {
    /// Blocks until a frame is available or the device times out.
    /// `Ok(None)` means nothing was ready; callers retry.
    fn next_frame(&mut self) -> Result<Option<Frame>, FocusError>;
}

/// A finite clip that can be replayed from the beginning.
pub trait LoopMedia {
    /// Returns the next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, FocusError>;

    /// Seeks back to the first frame.
    fn rewind(&mut self) -> Result<(), FocusError>;

    /// The declared frame rate of the clip, if it has one.
    fn frame_rate(&self) -> Option<f64>;
}
