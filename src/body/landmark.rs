//! Body pose landmark prediction.
//!
//! Uses the BlazePose GHUM landmark networks, which estimate 33 pose landmarks and 6 auxiliary
//! landmarks from a crop around a single person.

use std::{fmt, path::Path, str::FromStr};

use anyhow::Context;

use crate::image::{draw, AsImageViewMut, Color, ImageViewMut};
use crate::landmark::{Estimate, Landmark, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

/// Number of pose landmarks (see [`LandmarkIdx`]).
pub const NUM_POSE_LANDMARKS: usize = 33;

/// Number of auxiliary landmarks, used by the network itself to track the region of interest.
pub const NUM_AUX_LANDMARKS: usize = 6;

/// Total number of landmarks produced per estimate.
pub const NUM_LANDMARKS: usize = NUM_POSE_LANDMARKS + NUM_AUX_LANDMARKS;

/// Values per landmark in the network output: x, y, z, visibility, presence.
const LANDMARK_VALUES: usize = 5;

/// Result of a pose landmark estimation.
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    pose_presence: f32,
    landmarks: Landmarks,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            pose_presence: 0.0,
            landmarks: Landmarks::new(NUM_LANDMARKS),
        }
    }
}

impl Estimate for LandmarkResult {
    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    #[inline]
    fn confidence(&self) -> f32 {
        self.pose_presence
    }
}

impl LandmarkResult {
    pub fn pose_landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        (0..NUM_POSE_LANDMARKS).map(|i| self.landmarks.get(i))
    }

    pub fn aux_landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        (NUM_POSE_LANDMARKS..NUM_LANDMARKS).map(|i| self.landmarks.get(i))
    }

    pub fn get(&self, i: LandmarkIdx) -> Landmark {
        self.landmarks.get(i as usize)
    }

    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Probability that a person is present in the tracked region.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.pose_presence
    }

    /// Draws the pose skeleton and landmarks.
    pub fn draw<I: AsImageViewMut>(&self, target: &mut I) {
        self.draw_impl(&mut target.as_view_mut());
    }

    fn draw_impl(&self, target: &mut ImageViewMut<'_>) {
        for (a, b) in POSE_CONNECTIONS {
            let a = self.get(*a);
            let b = self.get(*b);
            draw::line(target, a.x() as _, a.y() as _, b.x() as _, b.y() as _)
                .color(Color::WHITE)
                .stroke_width(2);
        }

        for lm in self.pose_landmarks() {
            draw::marker(target, lm.x() as _, lm.y() as _).size(5);
        }
    }
}

/// Names the pose landmarks by their index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

/// Skeleton edges drawn between pose landmarks.
const POSE_CONNECTIONS: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        (Nose, LeftEyeInner),
        (LeftEyeInner, LeftEye),
        (LeftEye, LeftEyeOuter),
        (LeftEyeOuter, LeftEar),
        (Nose, RightEyeInner),
        (RightEyeInner, RightEye),
        (RightEye, RightEyeOuter),
        (RightEyeOuter, RightEar),
        (MouthLeft, MouthRight),
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (LeftWrist, LeftPinky),
        (LeftWrist, LeftIndex),
        (LeftWrist, LeftThumb),
        (LeftPinky, LeftIndex),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (RightWrist, RightPinky),
        (RightWrist, RightIndex),
        (RightWrist, RightThumb),
        (RightPinky, RightIndex),
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        (LeftHip, LeftKnee),
        (LeftKnee, LeftAnkle),
        (LeftAnkle, LeftHeel),
        (LeftHeel, LeftFootIndex),
        (LeftAnkle, LeftFootIndex),
        (RightHip, RightKnee),
        (RightKnee, RightAnkle),
        (RightAnkle, RightHeel),
        (RightHeel, RightFootIndex),
        (RightAnkle, RightFootIndex),
    ]
};

/// Size variant of the pose landmark network.
///
/// Larger networks are more accurate but slower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoseModel {
    Lite,
    Full,
    #[default]
    Heavy,
}

impl PoseModel {
    /// Model file name expected in the model directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            PoseModel::Lite => "pose_landmark_lite.onnx",
            PoseModel::Full => "pose_landmark_full.onnx",
            PoseModel::Heavy => "pose_landmark_heavy.onnx",
        }
    }
}

impl fmt::Display for PoseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoseModel::Lite => "lite",
            PoseModel::Full => "full",
            PoseModel::Heavy => "heavy",
        })
    }
}

impl FromStr for PoseModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lite" => Ok(PoseModel::Lite),
            "full" => Ok(PoseModel::Full),
            "heavy" => Ok(PoseModel::Heavy),
            _ => anyhow::bail!("unknown pose model '{}' (expected lite, full or heavy)", s),
        }
    }
}

/// The pose landmark network.
pub struct PoseLandmarkNetwork {
    cnn: Cnn,
}

impl PoseLandmarkNetwork {
    /// Loads the given [`PoseModel`] variant from `model_dir`.
    pub fn load<P: AsRef<Path>>(model_dir: P, model: PoseModel) -> anyhow::Result<Self> {
        let path = model_dir.as_ref().join(model.file_name());
        // Only the screen landmarks and the pose flag are needed; the segmentation mask, heatmap
        // and world landmarks are not computed.
        let nn = NeuralNetwork::from_path(&path)?
            .with_output_selection([0, 1])
            .load()
            .with_context(|| format!("failed to load pose landmark model '{}'", path.display()))?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?;
        Ok(Self { cnn })
    }
}

impl Network for PoseLandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
        extract(outputs, estimate)
    }
}

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
    anyhow::ensure!(
        outputs.len() >= 2,
        "pose landmark network produced {} outputs, expected 2",
        outputs.len()
    );

    let screen_landmarks = &outputs[0];
    let pose_flag = &outputs[1];
    anyhow::ensure!(
        screen_landmarks.shape() == [1, NUM_LANDMARKS * LANDMARK_VALUES]
            && pose_flag.shape() == [1, 1],
        "unexpected pose landmark output shapes {:?} and {:?}",
        screen_landmarks.shape(),
        pose_flag.shape(),
    );

    estimate.pose_presence = pose_flag.index([0, 0]).as_singular();

    let values = screen_landmarks.index([0]).as_slice();
    for (i, chunk) in values.chunks_exact(LANDMARK_VALUES).enumerate() {
        let &[x, y, z, visibility, presence] = chunk else {
            unreachable!("`chunks_exact` yields chunks of {}", LANDMARK_VALUES);
        };
        estimate.landmarks.set(
            i,
            Landmark::new([x, y, z])
                .with_visibility(sigmoid(visibility))
                .with_presence(sigmoid(presence)),
        );
    }

    Ok(())
}
