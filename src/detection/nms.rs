//! Non-Maximum Suppression and Averaging.
//!
//! SSD networks produce many overlapping detections for a single face or body. Non-Maximum
//! Suppression (NMS) filters these duplicates out, leaving a single detection per object.
//!
//! Two variants are implemented, selected with [`SuppressionMode`]: classic suppression that drops
//! overlapping detections with lower confidence ([`SuppressionMode::Remove`]), and Non-Maximum
//! Averaging ([`SuppressionMode::Average`]) that merges overlapping detections into their
//! confidence-weighted average. Averaging reduces jitter between frames and is the default.

use crate::{iter::zip_exact, num::TotalF32, rect::Rect};

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    avg_buf: Vec<Detection>,
    mode: SuppressionMode,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a new non-maximum suppressor using [`SuppressionMode::Average`] and
    /// [`Self::DEFAULT_IOU_THRESH`].
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            avg_buf: Vec::new(),
            mode: SuppressionMode::Average,
        }
    }

    /// Sets the intersection-over-union threshold to consider two detections as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    /// Sets the suppression mode.
    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Performs non-maximum suppression on `detections`, in place.
    ///
    /// Afterwards, `detections` holds the surviving (or averaged) detections in order of
    /// descending confidence.
    pub fn process(&mut self, detections: &mut Vec<Detection>) {
        let mut out = Vec::with_capacity(detections.len());

        // Sort by ascending confidence, so that popping yields the highest confidence first.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            let iou_thresh = self.iou_thresh;
            match self.mode {
                SuppressionMode::Remove => {
                    detections.retain(|other| {
                        seed.bounding_rect().iou(&other.bounding_rect()) < iou_thresh
                    });
                    out.push(seed);
                }
                SuppressionMode::Average => {
                    self.avg_buf.clear();
                    let avg_buf = &mut self.avg_buf;
                    detections.retain(|other| {
                        let overlaps = seed.bounding_rect().iou(&other.bounding_rect()) >= iou_thresh;
                        if overlaps {
                            avg_buf.push(other.clone());
                        }
                        !overlaps
                    });
                    avg_buf.push(seed);

                    out.push(weighted_average(avg_buf));
                }
            }
        }

        *detections = out;
    }
}

/// Averages `detections`, weighted by their confidence.
///
/// The result keeps the highest confidence of the group, which is the last element.
fn weighted_average(detections: &[Detection]) -> Detection {
    let seed = &detections[detections.len() - 1];
    let mut keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    let (mut x, mut y, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let mut divisor = 0.0;

    for det in detections {
        let factor = det.confidence();
        divisor += factor;
        for (acc, kp) in zip_exact(keypoints.iter_mut(), det.keypoints()) {
            acc.x += kp.x * factor;
            acc.y += kp.y * factor;
        }

        let rect = det.bounding_rect();
        x += rect.x_center() * factor;
        y += rect.y_center() * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;
    }

    for kp in &mut keypoints {
        kp.x /= divisor;
        kp.y /= divisor;
    }

    Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(x / divisor, y / divisor, w / divisor, h / divisor),
        keypoints,
    )
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Describes how [`NonMaxSuppression`] should deal with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SuppressionMode {
    /// Remove overlapping detections, only retain the detection with highest confidence score.
    Remove,

    /// Compute a confidence-weighted average of overlapping detections.
    Average,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let mut detections = vec![
            Detection::new(0.55, rect.scale(1.5)),
            Detection::new(0.6, rect),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 0.6);
        assert_eq!(d.bounding_rect(), rect);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let mut detections = vec![
            Detection::new(0.7, Rect::from_center(0.0, 0.0, 1.0, 1.0)),
            Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0)),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 0.9);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(0.0);

        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let mut detections = vec![
            Detection::with_keypoints(1.0, rect, vec![Keypoint::new(0.0, 0.0)]),
            Detection::with_keypoints(0.5, rect.scale(4.0), vec![Keypoint::new(3.0, 6.0)]),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 1.0);
        assert_eq!(d.bounding_rect(), Rect::from_center(-1.0, 3.0, 2.0, 2.0));
        assert_eq!(d.keypoints()[0].x(), 1.0);
        assert_eq!(d.keypoints()[0].y(), 2.0);
    }

    #[test]
    fn empty_input() {
        let mut detections = Vec::new();
        NonMaxSuppression::new().process(&mut detections);
        assert!(detections.is_empty());
    }
}
