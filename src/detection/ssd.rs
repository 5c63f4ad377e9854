//! Anchor generation for Single Shot MultiBox Detectors (SSDs).
//!
//! Only the anchor layout used by the face and pose detectors is supported: every anchor sits at
//! the center of a feature map cell and has a fixed, unit size.

use std::ops::Index;

use crate::image::Resolution;

/// An anchor of an SSD network.
///
/// Coordinates are relative to the network input and range from 0 to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
#[derive(Debug)]
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Must be non-zero.
    boxes_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// # Parameters
    ///
    /// - `boxes_per_cell`: the number of boxes associated with each cell in this feature map.
    /// - `width`/`height`: size of this layer's feature map, in output cells.
    pub fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert_ne!(boxes_per_cell, 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The full list of anchors of an SSD network, in network output order.
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    /// Computes the anchors of a network from its output layers.
    ///
    /// Cells are visited row by row. All boxes of a cell share the same anchor.
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();

        for layer in layers {
            let height = layer.resolution.height();
            let width = layer.resolution.width();

            for y in 0..height {
                for x in 0..width {
                    let x_center = (x as f32 + 0.5) / width as f32;
                    let y_center = (y as f32 + 0.5) / height as f32;
                    anchors.extend(
                        (0..layer.boxes_per_cell).map(|_| Anchor { x_center, y_center }),
                    );
                }
            }
        }

        log::trace!("computed {} SSD anchors for {:?}", anchors.len(), layers);
        Self { anchors }
    }

    /// Returns the total number of SSD anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_counts() {
        let short_range = Anchors::calculate(&[LayerInfo::new(2, 16, 16), LayerInfo::new(6, 8, 8)]);
        assert_eq!(short_range.anchor_count(), 896);

        let pose = Anchors::calculate(&[
            LayerInfo::new(2, 28, 28),
            LayerInfo::new(2, 14, 14),
            LayerInfo::new(6, 7, 7),
        ]);
        assert_eq!(pose.anchor_count(), 2254);
    }

    #[test]
    fn anchor_positions() {
        let anchors = Anchors::calculate(&[LayerInfo::new(2, 2, 1)]);
        assert_eq!(anchors.anchor_count(), 4);
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(anchors[0].x_center(), 0.25);
        assert_eq!(anchors[2].x_center(), 0.75);
        assert_eq!(anchors[3].y_center(), 0.5);
    }
}
