//! Rectangle type.
//!
//! Rectangles are used for image views, detections and landmark regions of interest. They use
//! floating-point coordinates, since neural network outputs are not pixel-aligned.

use std::fmt;

use crate::image::AspectRatio;

/// An axis-aligned rectangle.
///
/// Rectangles are allowed to have zero height and/or width. Negative dimensions are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Computes the (axis-aligned) bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = (f32, f32)>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let (x, y) = iter.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (x, x, y, y);

        for (x, y) in iter {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        Some(Self::span_inner(x_min, y_min, x_max, y_max))
    }

    fn span_inner(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        assert!(x_min <= x_max, "x_min={}, x_max={}", x_min, x_max);
        assert!(y_min <= y_max, "y_min={}, y_max={}", y_min, y_max);
        Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    /// Scales the width and height of this [`Rect`] by the given amount.
    ///
    /// The center position of the [`Rect`] remains the same.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
            ..*self
        }
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    ///
    /// `amount` is the relative amount of the rectangles width and height to add to each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self {
            width: self.width + self.width * amount * 2.0,
            height: self.height + self.height * amount * 2.0,
            ..*self
        }
    }

    /// Symmetrically extends one dimension of `self` so that the resulting rectangle has the given
    /// aspect ratio.
    ///
    /// # Panics
    ///
    /// This method will panic if `self` has a width or height of 0.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        assert!(
            self.width > 0.0 && self.height > 0.0,
            "cannot fit aspect ratio of empty rectangle {:?}",
            self
        );

        let mut res = *self;
        let target_width = self.height * target_aspect.as_f32();
        if target_width >= self.width {
            res.width = target_width;
        } else {
            res.height = self.width / target_aspect.as_f32();
        }

        res
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x_center - self.width * 0.5
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y_center - self.height * 0.5
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x_center, self.y_center)
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Returns the area covered by `self`.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[must_use]
    pub fn move_by(&self, x: f32, y: f32) -> Rect {
        Rect {
            x_center: self.x_center + x,
            y_center: self.y_center + y,
            ..*self
        }
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x().max(other.x());
        let y_min = self.y().max(other.y());
        let x_max = (self.x() + self.width()).min(other.x() + other.width());
        let y_max = (self.y() + self.height()).min(other.y() + other.height());
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Rect::span_inner(x_min, y_min, x_max, y_max))
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |rect| rect.area());
        let union = self.area() + other.area() - intersection;
        intersection / union
    }

    /// Clamps `self` to the pixel grid of an image of size `width x height`.
    ///
    /// The top-left corner and the size are truncated to whole pixels first. The result may be
    /// empty if `self` lies fully outside of the image.
    #[must_use]
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let (w, h) = (width as f32, height as f32);
        let x_min = self.x().trunc().clamp(0.0, w);
        let y_min = self.y().trunc().clamp(0.0, h);
        let x_max = (self.x().trunc() + self.width().trunc()).clamp(x_min, w);
        let y_max = (self.y().trunc() + self.height().trunc()).clamp(y_min, h);
        Rect::span_inner(x_min, y_min, x_max, y_max)
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x_center, self.y_center, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding() {
        let rect = Rect::bounding([(1.0, 2.0), (-1.0, 5.0), (0.0, 3.0)]).unwrap();
        assert_eq!(rect, Rect::from_top_left(-1.0, 2.0, 2.0, 3.0));
        assert!(Rect::bounding([]).is_none());
    }

    #[test]
    fn iou() {
        let a = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);
        assert_eq!(a.iou(&a), 1.0);

        let b = Rect::from_top_left(1.0, 0.0, 2.0, 2.0);
        assert_eq!(a.iou(&b), 2.0 / 6.0);

        let far = Rect::from_top_left(10.0, 10.0, 1.0, 1.0);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn grow() {
        let rect = Rect::from_center(0.0, 0.0, 2.0, 1.0);
        assert_eq!(rect.grow_rel(0.5), Rect::from_center(0.0, 0.0, 4.0, 2.0));

        let square = rect.grow_to_fit_aspect(AspectRatio::new(1, 1).unwrap());
        assert_eq!(square, Rect::from_center(0.0, 0.0, 2.0, 2.0));
    }

    #[test]
    fn clamp() {
        let inside = Rect::from_top_left(1.5, 2.0, 3.9, 4.0).clamp_to(100, 100);
        assert_eq!(inside, Rect::from_top_left(1.0, 2.0, 3.0, 4.0));

        let partial = Rect::from_top_left(-5.0, -5.0, 10.0, 10.0).clamp_to(4, 4);
        assert_eq!(partial, Rect::from_top_left(0.0, 0.0, 4.0, 4.0));

        let outside = Rect::from_top_left(20.0, 20.0, 5.0, 5.0).clamp_to(10, 10);
        assert!(outside.is_empty());
    }
}
