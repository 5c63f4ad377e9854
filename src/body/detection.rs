//! Human body detection.
//!
//! The BlazePose detector finds people in a frame. Its keypoints are only used to place the region
//! that the [landmark network](super::landmark) tracks afterwards.

use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;

use crate::detection::{
    ssd::{Anchor, Anchors, LayerInfo},
    Detection, Network,
};
use crate::image::Resolution;
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;
use crate::rect::Rect;

/// Number of values the network outputs per anchor: a box and 4 keypoints.
const BOX_PARAMS: usize = 12;

/// Body pose detection network.
///
/// Use with [`Detector`](crate::detection::Detector).
///
/// This network detects human bodies and computes several keypoints documented in [`Keypoint`].
pub struct PoseNetwork {
    cnn: Cnn,
}

impl PoseNetwork {
    /// Model file name expected in the model directory.
    pub const MODEL_FILE: &'static str = "pose_detection.onnx";

    /// Loads the network from [`Self::MODEL_FILE`] in `model_dir`.
    pub fn load<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        let path = model_dir.as_ref().join(Self::MODEL_FILE);
        let nn = NeuralNetwork::from_path(&path)?
            .load()
            .with_context(|| format!("failed to load pose detection model '{}'", path.display()))?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(-1.0..=1.0))?;
        Ok(Self { cnn })
    }
}

impl Network for PoseNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        static ANCHORS: Lazy<Anchors> = Lazy::new(|| {
            Anchors::calculate(&[
                LayerInfo::new(2, 28, 28),
                LayerInfo::new(2, 14, 14),
                LayerInfo::new(6, 7, 7),
            ])
        });

        extract_outputs(
            self.cnn.input_resolution(),
            &ANCHORS,
            outputs,
            threshold,
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
        "pose detection network produced {} outputs, expected 2",
        outputs.len()
    );

    let num_anchors = anchors.anchor_count();
    let boxes = &outputs[0];
    let confidences = &outputs[1];
    anyhow::ensure!(
        boxes.shape() == [1, num_anchors, BOX_PARAMS] && confidences.shape() == [1, num_anchors, 1],
        "unexpected pose detection output shapes {:?} and {:?}",
        boxes.shape(),
        confidences.shape(),
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
    let anchor_x = anchor.x_center() * input_res.width() as f32;
    let anchor_y = anchor.y_center() * input_res.height() as f32;

    let rect = Rect::from_center(
        box_params[0] + anchor_x,
        box_params[1] + anchor_y,
        box_params[2],
        box_params[3],
    );
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| crate::detection::Keypoint::new(xy[0] + anchor_x, xy[1] + anchor_y))
        .collect();

    Detection::with_keypoints(confidence, rect, keypoints)
}

/// Keypoints estimated by the detection network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Keypoint {
    /// Center of the hips.
    Hips = 0,
    /// A point above the head; together with the hips, it spans the whole body.
    BodyTop = 1,
}

/// Computes the region of interest to seed the landmark tracker with.
///
/// The region is a square centered on the hips, with the distance from the hips to the top of the
/// body as its half-size, plus `padding` (relative to its size) on each side.
pub fn body_roi(detection: &Detection, padding: f32) -> Option<Rect> {
    let hips = detection.keypoints().get(Keypoint::Hips as usize)?;
    let top = detection.keypoints().get(Keypoint::BodyTop as usize)?;
    let radius = (top.x() - hips.x()).hypot(top.y() - hips.y());
    let rect = Rect::from_center(hips.x(), hips.y(), radius * 2.0, radius * 2.0).grow_rel(padding);
    (!rect.is_empty()).then_some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Keypoint as Kp;
    use crate::nn::tensor::Tensor;

    #[test]
    fn extracts_keypoints() {
        let anchors = Anchors::calculate(&[LayerInfo::new(1, 2, 2)]);
        let boxes = Tensor::from_array_shape_fn([1, 4, BOX_PARAMS], |[_, _, p]| match p {
            2 | 3 => 10.0,
            // body top keypoint 5 pixels above the anchor
            7 => -5.0,
            _ => 0.0,
        });
        let confidences = Tensor::from_array_shape_fn([1, 4, 1], |[_, i, _]| {
            if i == 3 {
                4.0
            } else {
                -4.0
            }
        });
        let outputs: Outputs = [boxes, confidences].into_iter().collect();

        let mut detections = Vec::new();
        extract_outputs(Resolution::new(64, 64), &anchors, &outputs, 0.5, &mut detections).unwrap();
        assert_eq!(detections.len(), 1);

        let keypoints = detections[0].keypoints();
        assert_eq!(keypoints.len(), 4);
        assert_eq!(keypoints[Keypoint::Hips as usize], Kp::new(48.0, 48.0));
        assert_eq!(keypoints[Keypoint::BodyTop as usize], Kp::new(48.0, 43.0));
    }

    #[test]
    fn roi_centered_on_hips() {
        let det = Detection::with_keypoints(
            0.9,
            Rect::from_center(50.0, 50.0, 40.0, 80.0),
            vec![Kp::new(50.0, 60.0), Kp::new(50.0, 20.0)],
        );
        let roi = body_roi(&det, 0.0).unwrap();
        assert_eq!(roi, Rect::from_center(50.0, 60.0, 80.0, 80.0));

        let padded = body_roi(&det, 0.25).unwrap();
        assert_eq!(padded, Rect::from_center(50.0, 60.0, 120.0, 120.0));
    }

    #[test]
    fn roi_skips_degenerate_detections() {
        let det = Detection::with_keypoints(
            0.9,
            Rect::from_center(50.0, 50.0, 40.0, 80.0),
            vec![Kp::new(50.0, 60.0), Kp::new(50.0, 60.0)],
        );
        assert!(body_roi(&det, 0.15).is_none());
    }

    #[test]
    fn roi_requires_keypoints() {
        let det = Detection::new(0.9, Rect::from_center(50.0, 50.0, 40.0, 80.0));
        assert!(body_roi(&det, 0.15).is_none());
    }
}
