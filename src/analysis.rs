//! The per-frame analysis loop.
//!
//! Every frame goes through the same steps:
//!
//! 1. The frame is counted.
//! 2. Faces are detected. Each face is cropped out of the frame and its emotion is classified.
//!    Confident readings are tallied and labeled on the frame, the rest count as anomalies.
//! 3. The body pose is tracked. When a pose is found, it is drawn and checked for raised arms.

use anyhow::Context;

use crate::body::arm::is_arm_raised;
use crate::body::detection::{body_roi, PoseNetwork};
use crate::body::landmark::{LandmarkResult, PoseLandmarkNetwork, NUM_LANDMARKS};
use crate::config::{Config, FaceRange};
use crate::detection::{Detection, Detector};
use crate::face::detection::{FullRangeNetwork, ShortRangeNetwork};
use crate::face::emotion::{EmotionClassifier, EmotionNetwork, EmotionReading};
use crate::filter::ema::Ema;
use crate::gui;
use crate::image::{draw, Color, Image, ImageView, Resolution};
use crate::iter::zip_exact;
use crate::landmark::{Estimator, LandmarkFilter, LandmarkTracker};
use crate::rect::Rect;
use crate::report::{Report, Tally, Verdict};
use crate::timer::{FpsCounter, Timer};
use crate::video::{VideoFile, VideoSink};

/// Padding added around the pose detector's body region before landmark tracking starts.
const POSE_ROI_PADDING: f32 = 0.15;

/// Vertical distance between a face's top edge and its emotion label.
const LABEL_OFFSET: i32 = 10;

/// Runs all models on video frames and keeps the [`Tally`].
pub struct Analyzer {
    face_detector: Detector,
    classifier: EmotionClassifier,
    pose_detector: Detector,
    pose_tracker: LandmarkTracker<LandmarkResult>,
    emotion_threshold: f32,
    tally: Tally,
}

impl Analyzer {
    /// Loads all networks from the model directory named in `config`.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let models = &config.models;
        log::debug!("loading models from {}", models.display());

        let mut face_detector = match config.face_range {
            FaceRange::Short => Detector::new(ShortRangeNetwork::load(models)?),
            FaceRange::Full => Detector::new(FullRangeNetwork::load(models)?),
        };
        face_detector.set_threshold(config.face_confidence);

        let classifier = EmotionClassifier::new(EmotionNetwork::load(models)?);
        let pose_detector = Detector::new(PoseNetwork::load(models)?);

        let mut estimator = Estimator::new(PoseLandmarkNetwork::load(models, config.pose_model)?);
        if let Some(alpha) = config.smoothing {
            estimator.set_filter(LandmarkFilter::new(Ema::new(alpha), NUM_LANDMARKS));
        }
        let pose_tracker = LandmarkTracker::new(estimator)?;

        Ok(Self {
            face_detector,
            classifier,
            pose_detector,
            pose_tracker,
            emotion_threshold: config.emotion_threshold,
            tally: Tally::new(),
        })
    }

    /// Analyzes one frame and draws the results onto it.
    pub fn process(&mut self, image: &mut Image) -> anyhow::Result<()> {
        let Self {
            face_detector,
            classifier,
            pose_detector,
            pose_tracker,
            emotion_threshold,
            tally,
        } = self;

        analyze_frame(tally, image, |tally, image| {
            let faces = face_detector.detect(&*image)?;
            record_faces(tally, image, faces, *emotion_threshold, |face| {
                classifier.classify(&face)
            })?;
            track_pose(pose_detector, pose_tracker, tally, image)
        })
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn into_tally(self) -> Tally {
        self.tally
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.face_detector
            .timers()
            .chain(self.classifier.timers())
            .chain(self.pose_detector.timers())
            .chain(self.pose_tracker.timers())
    }
}

/// Counts `image` as a new frame, then runs the analysis `steps` on it.
fn analyze_frame<F>(tally: &mut Tally, image: &mut Image, steps: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut Tally, &mut Image) -> anyhow::Result<()>,
{
    tally.record_frame();
    steps(tally, image)
}

/// Classifies, tallies and draws the faces detected in a frame.
///
/// Every face is classified before anything is drawn, so that annotations of one face never end
/// up in the crop of another. Faces without a usable crop are drawn, but `classify` is not called
/// for them and their verdict is `None`.
fn record_faces<F>(
    tally: &mut Tally,
    image: &mut Image,
    faces: &[Detection],
    threshold: f32,
    mut classify: F,
) -> anyhow::Result<Vec<Option<Verdict>>>
where
    F: FnMut(ImageView<'_>) -> anyhow::Result<EmotionReading>,
{
    let mut readings = Vec::with_capacity(faces.len());
    for det in faces {
        let reading = match face_crop(det, image.resolution()) {
            Some(rect) => Some(classify(image.view(rect))?),
            None => {
                log::trace!("skipping face at frame edge: {:?}", det.bounding_rect());
                None
            }
        };
        readings.push(reading);
    }

    let mut verdicts = Vec::with_capacity(faces.len());
    for (det, reading) in zip_exact(faces, readings) {
        det.draw(image);
        let verdict = reading
            .map(|reading| record_face(tally, image, det.bounding_rect(), &reading, threshold));
        verdicts.push(verdict);
    }
    Ok(verdicts)
}

/// Tracks the body pose in `image`, seeding the tracker from `detector` when it has lost the
/// person.
fn track_pose(
    detector: &mut Detector,
    tracker: &mut LandmarkTracker<LandmarkResult>,
    tally: &mut Tally,
    image: &mut Image,
) -> anyhow::Result<()> {
    if tracker.roi().is_none() {
        // Detections are sorted by confidence, so the first one is the most likely person.
        let detections = detector.detect(&*image)?;
        if let Some(roi) = detections.first().and_then(|det| body_roi(det, POSE_ROI_PADDING)) {
            tracker.set_roi(roi);
        }
    }

    let pose = tracker.track(&*image)?.map(|res| res.estimate());
    record_pose(tally, image, pose);
    Ok(())
}

/// Returns the part of the frame to classify for a detected face.
///
/// Returns `None` for faces reaching past the left or top edge, and for faces whose crop is empty
/// after clamping to the frame.
fn face_crop(det: &Detection, frame: Resolution) -> Option<Rect> {
    let rect = det.bounding_rect();
    if rect.x().trunc() < 0.0 || rect.y().trunc() < 0.0 {
        return None;
    }
    let rect = rect.clamp_to(frame.width(), frame.height());
    (!rect.is_empty()).then_some(rect)
}

/// Tallies the emotion of one face and labels the face if the reading was confident enough.
fn record_face(
    tally: &mut Tally,
    image: &mut Image,
    face: Rect,
    reading: &EmotionReading,
    threshold: f32,
) -> Verdict {
    let verdict = tally.record_emotion(reading, threshold);
    if let Verdict::Tallied(emotion) = verdict {
        draw::text(
            image,
            face.x() as i32,
            face.y() as i32 - LABEL_OFFSET,
            emotion.name(),
        )
        .align_left()
        .align_bottom()
        .color(Color::GREEN);
    }
    verdict
}

/// Draws a tracked pose and feeds its arm state into the tally.
///
/// Frames without a pose leave the arm state untouched. Returns whether a new arm movement started.
fn record_pose(tally: &mut Tally, image: &mut Image, pose: Option<&LandmarkResult>) -> bool {
    let Some(pose) = pose else {
        return false;
    };

    pose.draw(image);
    let started = tally.record_pose(is_arm_raised(pose));

    let label = format!("Movimentos dos bracos: {}", tally.arm_movements());
    draw::text(image, 10, 30, &label)
        .align_left()
        .align_bottom()
        .large()
        .color(Color::WHITE);
    started
}

/// Analyzes the whole video named in `config` and returns the report.
///
/// Stops early when `q` is pressed in the preview window. The report then covers the frames read
/// up to that point.
pub fn run(config: &Config) -> anyhow::Result<Report> {
    let mut video = VideoFile::open(&config.video)?;
    let mut analyzer = Analyzer::new(config)?;
    let mut sink: Option<VideoSink> = None;

    let mut fps = FpsCounter::new("analysis");
    while let Some(mut frame) = video.read()? {
        analyzer.process(&mut frame)?;

        if let Some(path) = &config.output {
            if sink.is_none() {
                sink = Some(VideoSink::create(path, video.fps(), frame.resolution())?);
            }
            if let Some(sink) = &mut sink {
                sink.write(&frame)
                    .with_context(|| format!("failed to write frame to '{}'", path.display()))?;
            }
        }

        if !config.headless && gui::show_image(&config.window_title, &frame)?.is_quit() {
            log::info!("stopped by user after {} frames", analyzer.tally().frames());
            break;
        }

        fps.tick_with(
            analyzer
                .timers()
                .chain(video.timers())
                .chain(sink.iter().flat_map(|sink| sink.timers())),
        );
    }

    if !config.headless {
        gui::close_windows()?;
    }

    let tally = analyzer.into_tally();
    log::info!(
        "analyzed {} frames: {} anomalies, {} arm movements, {} tallied faces",
        tally.frames(),
        tally.anomalies(),
        tally.arm_movements(),
        tally.histogram().total(),
    );
    Ok(Report::from(tally))
}
