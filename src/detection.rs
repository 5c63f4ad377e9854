//! Common functionality for object detection.
//!
//! The functionality defined in this module (and submodules) is shared by the face and pose
//! detectors.

pub mod nms;
pub mod ssd;

use crate::image::{draw, AsImageView, AsImageViewMut, Color, ImageView, ImageViewMut, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::rect::Rect;
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// Trait implemented by neural networks that detect objects in an input image.
pub trait Network: Send + Sync + 'static {
    /// Returns the [`Cnn`] to use for detection.
    fn cnn(&self) -> &Cnn;

    /// Extracts all detections with confidence above `threshold` from the network's output.
    ///
    /// Keypoint and detection positions are expected to be in the coordinate system of the
    /// network's input.
    ///
    /// Returns an error if the outputs don't have the shape the network is expected to produce.
    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()>;
}

/// A generic object detector.
///
/// This type wraps a [`Network`] for object detection, runs non-maximum suppression on its
/// output, and maps the results back into the coordinates of the input image.
pub struct Detector {
    network: Box<dyn Network>,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
    thresh: f32,
    nms: NonMaxSuppression,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Vec::new(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Sets the minimum confidence a detection needs to be reported.
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.thresh
    }

    /// Runs the detector on `image`.
    ///
    /// Returned detections are in the coordinate system of `image`, ordered by descending
    /// confidence.
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detect_impl(image.as_view())
    }

    fn detect_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let Some(aspect) = input_res.aspect_ratio() else {
            anyhow::bail!("detection network has empty input resolution {}", input_res);
        };
        if image.rect().is_empty() {
            return Ok(&self.detections);
        }

        // If the input image's aspect ratio doesn't match the CNN's input, create an oversized view
        // that does.
        let rect = image.rect().grow_to_fit_aspect(aspect);
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract.time(|| {
            self.network
                .extract(&outputs, self.thresh, &mut self.detections)
        })?;

        self.t_nms.time(|| self.nms.process(&mut self.detections));

        // Map all coordinates back into the input image.
        let scale = rect.width() / input_res.width() as f32;
        for det in &mut self.detections {
            det.map_coords(scale, rect.x(), rect.y());
        }

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value, and a
/// possibly empty set of located keypoints.
///
/// The confidence value lies between 0.0 and 1.0, which is achieved by passing the raw network
/// output through [`crate::num::sigmoid`]. It is used as a weight when performing non-maximum
/// suppression with [`nms::SuppressionMode::Average`].
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Scales all coordinates by `scale`, then moves them by `(x, y)`.
    fn map_coords(&mut self, scale: f32, x: f32, y: f32) {
        let (xc, yc) = self.rect.center();
        self.rect = Rect::from_center(
            xc * scale + x,
            yc * scale + y,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            kp.x = kp.x * scale + x;
            kp.y = kp.y * scale + y;
        }
    }

    /// Draws the bounding rectangle, keypoints and confidence of this detection.
    pub fn draw<I: AsImageViewMut>(&self, image: &mut I) {
        self.draw_impl(&mut image.as_view_mut());
    }

    fn draw_impl(&self, image: &mut ImageViewMut<'_>) {
        draw::rect(image, self.bounding_rect()).color(Color::from_rgb8(170, 0, 0));
        for kp in self.keypoints() {
            draw::marker(image, kp.x() as _, kp.y() as _);
        }

        let color = match self.confidence() {
            c if c >= 0.8 => Color::GREEN,
            c if c >= 0.4 => Color::YELLOW,
            _ => Color::RED,
        };
        let rect = self.bounding_rect();
        draw::text(
            image,
            rect.x_center() as i32,
            (rect.y() + rect.height()) as i32,
            &format!("conf={:.01}", self.confidence()),
        )
        .align_top()
        .color(color);
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the specific detector and on its index in the keypoint
/// list. The pose detector uses them to place the region tracked by the landmark network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
