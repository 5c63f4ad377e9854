//! Face detection module.
//!
//! This uses one of the "BlazeFace" neural networks also used in MediaPipe's [Face Detection]
//! module.
//!
//! [Face Detection]: https://google.github.io/mediapipe/solutions/face_detection

use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;

use crate::detection::{
    ssd::{Anchor, Anchors, LayerInfo},
    Detection, Keypoint, Network,
};
use crate::image::Resolution;
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;
use crate::rect::Rect;

/// Number of values the network outputs per anchor: a box and 6 keypoints.
const BOX_PARAMS: usize = 16;

/// Keypoints computed by the face detection networks, in network output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKeypoint {
    LeftEye = 0,
    RightEye = 1,
    Nose = 2,
    Mouth = 3,
    LeftEar = 4,
    RightEar = 5,
}

fn load_cnn(path: &Path) -> anyhow::Result<Cnn> {
    let nn = NeuralNetwork::from_path(path)?
        .load()
        .with_context(|| format!("failed to load face detection model '{}'", path.display()))?;
    Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(-1.0..=1.0))
}

/// A small and efficient face detection network, best for faces in <2m of the camera.
pub struct ShortRangeNetwork {
    cnn: Cnn,
}

impl ShortRangeNetwork {
    /// Model file name expected in the model directory.
    pub const MODEL_FILE: &'static str = "face_detection_short_range.onnx";

    /// Loads the network from [`Self::MODEL_FILE`] in `model_dir`.
    pub fn load<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        Ok(Self {
            cnn: load_cnn(&model_dir.as_ref().join(Self::MODEL_FILE))?,
        })
    }
}

impl Network for ShortRangeNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        thresh: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        static ANCHORS: Lazy<Anchors> =
            Lazy::new(|| Anchors::calculate(&[LayerInfo::new(2, 16, 16), LayerInfo::new(6, 8, 8)]));

        extract_outputs(
            self.cnn.input_resolution(),
            &ANCHORS,
            outputs,
            thresh,
            detections,
        )
    }
}

/// A larger detection network with a greater detection range (up to about 5m), but slower
/// inference speed.
pub struct FullRangeNetwork {
    cnn: Cnn,
}

impl FullRangeNetwork {
    /// Model file name expected in the model directory.
    pub const MODEL_FILE: &'static str = "face_detection_full_range.onnx";

    /// Loads the network from [`Self::MODEL_FILE`] in `model_dir`.
    pub fn load<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        Ok(Self {
            cnn: load_cnn(&model_dir.as_ref().join(Self::MODEL_FILE))?,
        })
    }
}

impl Network for FullRangeNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        thresh: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        static ANCHORS: Lazy<Anchors> =
            Lazy::new(|| Anchors::calculate(&[LayerInfo::new(1, 48, 48)]));

        extract_outputs(
            self.cnn.input_resolution(),
            &ANCHORS,
            outputs,
            thresh,
            detections,
        )
    }
}

fn extract_outputs(
    input_res: Resolution,
    anchors: &Anchors,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        outputs.len() >= 2,
        "face detection network produced {} outputs, expected 2",
        outputs.len()
    );

    let num_anchors = anchors.anchor_count();
    let boxes = &outputs[0];
    let confidences = &outputs[1];
    anyhow::ensure!(
        boxes.shape() == [1, num_anchors, BOX_PARAMS] && confidences.shape() == [1, num_anchors, 1],
        "unexpected face detection output shapes {:?} and {:?} for {} anchors",
        boxes.shape(),
        confidences.shape(),
        num_anchors,
    );

    for (index, view) in confidences.index([0]).iter().enumerate() {
        let conf = sigmoid(view.as_slice()[0]);
        if conf < thresh {
            continue;
        }

        let tensor_view = boxes.index([0, index]);
        detections.push(extract_detection(
            &anchors[index],
            input_res,
            tensor_view.as_slice(),
            conf,
        ));
    }

    Ok(())
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let input_w = input_res.width() as f32;
    let input_h = input_res.height() as f32;
    let (anchor_x, anchor_y) = (anchor.x_center() * input_w, anchor.y_center() * input_h);

    let rect = Rect::from_center(
        box_params[0] + anchor_x,
        box_params[1] + anchor_y,
        box_params[2],
        box_params[3],
    );
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| Keypoint::new(xy[0] + anchor_x, xy[1] + anchor_y))
        .collect();

    Detection::with_keypoints(confidence, rect, keypoints)
}
