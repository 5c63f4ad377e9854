//! Common code for visual landmark estimation and tracking.

use std::iter;

use crate::image::{AsImageView, AspectRatio, ImageView, Resolution};
use crate::iter::zip_exact;
use crate::rect::Rect;
use crate::{
    filter::Filter,
    nn::{Cnn, Outputs},
    timer::Timer,
};

type Position = [f32; 3];

/// A fixed-size list of landmarks.
#[derive(Debug, Clone)]
pub struct Landmarks {
    positions: Box<[Position]>,
    visibility: Option<Box<[f32]>>,
    presence: Option<Box<[f32]>>,
}

impl Landmarks {
    /// Creates a new [`Landmarks`] collection containing `len` preallocated landmarks.
    ///
    /// All landmarks will start with all coordinates at `0.0`.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0, 0.0, 0.0]; len].into_boxed_slice(),
            visibility: None,
            presence: None,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        (0..self.positions.len()).map(|i| self.get(i))
    }

    pub fn get(&self, index: usize) -> Landmark {
        Landmark {
            pos: self.positions[index],
            visibility: self.visibility.as_ref().map(|vis| vis[index]),
            presence: self.presence.as_ref().map(|pres| pres[index]),
        }
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        let len = self.positions.len();
        self.positions[index] = landmark.pos;
        if let Some(vis) = landmark.visibility {
            self.visibility.get_or_insert_with(|| vec![0.0; len].into())[index] = vis;
        }
        if let Some(pres) = landmark.presence {
            self.presence.get_or_insert_with(|| vec![0.0; len].into())[index] = pres;
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions_mut() {
            *pos = f(*pos);
        }
    }
}

/// A landmark in 3D space.
///
/// X and Y are in image coordinates; Z is the network's relative depth estimate.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark {
    pos: Position,
    visibility: Option<f32>,
    presence: Option<f32>,
}

impl Landmark {
    pub fn new(position: Position) -> Self {
        Self {
            pos: position,
            visibility: None,
            presence: None,
        }
    }

    pub fn with_visibility(self, visibility: f32) -> Self {
        Self {
            visibility: Some(visibility),
            ..self
        }
    }

    pub fn with_presence(self, presence: f32) -> Self {
        Self {
            presence: Some(presence),
            ..self
        }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.pos
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }

    /// Probability that the landmark is visible (not occluded), if the network estimates it.
    #[inline]
    pub fn visibility(&self) -> Option<f32> {
        self.visibility
    }

    /// Probability that the landmark is inside the frame, if the network estimates it.
    #[inline]
    pub fn presence(&self) -> Option<f32> {
        self.presence
    }
}

/// Batch-filter for landmarks.
///
/// This should be applied to the unadjusted landmarks output by the neural network, otherwise the
/// filter parameters require tuning that depends on the input image size.
pub struct LandmarkFilter {
    filter: Box<dyn FnMut(&mut Landmarks) + Send>,
}

/// The default [`LandmarkFilter`] does not perform any filtering.
impl Default for LandmarkFilter {
    fn default() -> Self {
        Self {
            filter: Box::new(|_| ()),
        }
    }
}

impl LandmarkFilter {
    /// Creates a new landmark filter.
    ///
    /// # Parameters
    ///
    /// - `filter` is the set of filter parameters to use.
    /// - `num_landmarks` is the number of landmarks that will be filtered with this filter in each
    ///   batch.
    pub fn new<F: Filter<f32> + Send + 'static>(filter: F, num_landmarks: usize) -> Self
    where
        F::State: Send,
    {
        let mut states = iter::repeat_with(<[F::State; 3]>::default)
            .take(num_landmarks)
            .collect::<Vec<_>>();

        Self {
            filter: Box::new(move |landmarks| {
                for (lm, state) in zip_exact(landmarks.positions_mut(), &mut states) {
                    for (coord, state) in zip_exact(lm, state) {
                        *coord = filter.filter(state, *coord);
                    }
                }
            }),
        }
    }

    /// Filters a list of landmarks in-place.
    ///
    /// # Panics
    ///
    /// This method panics if `landmarks` does not have exactly as many entries as were specified in
    /// the `num_landmarks` parameter in the call to [`LandmarkFilter::new`].
    pub fn filter(&mut self, landmarks: &mut Landmarks) {
        (self.filter)(landmarks);
    }
}

/// Trait for landmark estimation results returned by [`Estimator::estimate`].
pub trait Estimate: Send + Sync + 'static {
    /// Returns the predicted [`Landmarks`].
    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// Confidence value indicating whether the tracked object is in view.
    ///
    /// By convention, this is in range 0.0 to 1.0, with anything above 0.5 indicating that the
    /// object is probably still in view. [`LandmarkTracker`] uses it to decide when tracking is
    /// lost.
    fn confidence(&self) -> f32;
}

/// Trait implemented by wrapper types around neural networks that estimate landmarks.
pub trait Network: Send + Sync + 'static {
    /// Type representing the predicted landmarks.
    type Output: Estimate;

    /// Returns the [`Cnn`] to use for landmark estimation.
    fn cnn(&self) -> &Cnn;

    /// Extracts the network outputs and writes them to `estimate`.
    ///
    /// The landmark positions are expected to be in the coordinate system of the network's input.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) -> anyhow::Result<()>;
}

/// Neural-network based landmark estimator.
///
/// This estimator processes an input image and yields an [`Estimate`] of type `E`, containing the
/// derived [`Landmarks`] and other data (depending on the network).
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
    t_filter: Timer,
    filter: LandmarkFilter,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_filter: Timer::new("filter"),
            filter: LandmarkFilter::default(),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    /// Returns the expected input resolution of the internal neural network.
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Returns profiling timers for this landmark estimator.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_filter].into_iter()
    }

    /// Sets the [`LandmarkFilter`] to apply to all landmark positions.
    ///
    /// The filter will be applied after inference, but before adjusting landmark coordinates back
    /// to the input image's coordinates. Only use this when feeding consecutive video frames.
    pub fn set_filter(&mut self, filter: LandmarkFilter) {
        self.filter = filter;
    }

    /// Performs landmark estimation on `image`, returning the [`Estimate`].
    ///
    /// If the aspect ratio of `image` does not match the aspect ratio of the network's input, an
    /// enlarged [`ImageView`] of the right aspect ratio is created first. Pixels outside of the
    /// underlying image read as transparent black.
    pub fn estimate<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&mut E> {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&mut E> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let Some(aspect) = input_res.aspect_ratio() else {
            anyhow::bail!("landmark network has empty input resolution {}", input_res);
        };
        anyhow::ensure!(
            !image.rect().is_empty(),
            "cannot estimate landmarks in empty image {:?}",
            image
        );

        let rect = image.rect().grow_to_fit_aspect(aspect);
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate))?;

        // The filter runs in network coordinates, so its parameters don't depend on image size.
        self.t_filter
            .time(|| self.filter.filter(self.estimate.landmarks_mut()));

        // Map landmark coordinates back into the input image.
        let scale = rect.width() / input_res.width() as f32;
        for pos in self.estimate.landmarks_mut().positions_mut() {
            *pos = pos.map(|t| t * scale);
            pos[0] += rect.x();
            pos[1] += rect.y();
        }

        Ok(&mut self.estimate)
    }
}

/// Tracks a region of interest (RoI) across subsequent frames by tracking the movement of estimated
/// landmarks.
///
/// Once seeded with a region of interest, the tracker will adjust its RoI based on the bounding
/// rectangle of the estimated landmarks. When the [`Estimate::confidence`] drops below the loss
/// threshold, the RoI is cleared and has to be seeded again, typically from a detector.
pub struct LandmarkTracker<E: Estimate> {
    aspect_ratio: AspectRatio,
    estimator: Estimator<E>,
    roi: Option<Rect>,
    loss_thresh: f32,
    roi_padding: f32,
}

impl<E: Estimate> LandmarkTracker<E> {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    pub const DEFAULT_ROI_PADDING: f32 = 0.3;

    /// Creates a new [`LandmarkTracker`].
    pub fn new(estimator: Estimator<E>) -> anyhow::Result<Self> {
        let input_res = estimator.input_resolution();
        let aspect_ratio = input_res.aspect_ratio().ok_or_else(|| {
            anyhow::anyhow!("landmark network has empty input resolution {}", input_res)
        })?;
        Ok(Self {
            aspect_ratio,
            estimator,
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
            roi_padding: Self::DEFAULT_ROI_PADDING,
        })
    }

    /// Returns profiling timers of the internal [`Estimator`].
    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.estimator.timers()
    }

    /// Returns the current region of interest.
    ///
    /// If no region of interest is being tracked, or tracking was lost, returns [`None`].
    pub fn roi(&self) -> Option<Rect> {
        self.roi
    }

    /// Sets the region of interest.
    ///
    /// Note that this does not apply RoI padding. The rectangle is used as-is.
    pub fn set_roi(&mut self, roi: Rect) {
        self.roi = Some(roi);
    }

    /// Performs landmark tracking on `full_image`.
    ///
    /// If no RoI is set, this returns `Ok(None)`. [`LandmarkTracker::set_roi`] must be called to
    /// start tracking, and again to restart it after it was lost.
    ///
    /// If the estimator indicates that tracking is lost, the RoI is cleared and `Ok(None)` is
    /// returned. Otherwise, the RoI is updated to the padded bounding rectangle of all landmarks.
    ///
    /// The returned [`TrackingResult`] grants access to the estimated landmarks, using `full_image`
    /// coordinates.
    pub fn track<V>(&mut self, full_image: &V) -> anyhow::Result<Option<TrackingResult<'_, E>>>
    where
        V: AsImageView,
    {
        self.track_impl(full_image.as_view())
    }

    fn track_impl(
        &mut self,
        full_image: ImageView<'_>,
    ) -> anyhow::Result<Option<TrackingResult<'_, E>>> {
        let Some(roi) = self.roi else {
            return Ok(None);
        };
        if roi.is_empty() {
            self.roi = None;
            return Ok(None);
        }

        let view_rect = roi.grow_to_fit_aspect(self.aspect_ratio);
        let view = full_image.view(view_rect);
        let estimate = self.estimator.estimate(&view)?;
        if estimate.confidence() < self.loss_thresh {
            log::trace!(
                "LandmarkTracker: confidence {}, loss threshold {} -> LOST",
                estimate.confidence(),
                self.loss_thresh,
            );

            self.roi = None;
            return Ok(None);
        }

        // Map all landmarks to the image coordinate system.
        estimate
            .landmarks_mut()
            .map_positions(|[x, y, z]| [x + view_rect.x(), y + view_rect.y(), z]);

        let updated_roi = Rect::bounding(estimate.landmarks_mut().iter().map(|lm| (lm.x(), lm.y())))
            .filter(|rect| !rect.is_empty());
        self.roi = updated_roi.map(|rect| rect.grow_rel(self.roi_padding));

        Ok(Some(TrackingResult {
            view_rect,
            estimate,
        }))
    }
}

/// The result returned by [`LandmarkTracker::track`].
pub struct TrackingResult<'a, E: Estimate> {
    view_rect: Rect,
    estimate: &'a E,
}

impl<'a, E: Estimate> TrackingResult<'a, E> {
    /// Returns the rectangle inside the full image passed to [`LandmarkTracker::track`] that was
    /// used to compute the landmarks.
    pub fn view_rect(&self) -> Rect {
        self.view_rect
    }

    /// Returns the estimation result, including landmarks.
    ///
    /// Landmark coordinates are in terms of the full image passed to [`LandmarkTracker::track`].
    pub fn estimate(&self) -> &'a E {
        self.estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ema::Ema;

    #[test]
    fn landmarks_set_get() {
        let mut landmarks = Landmarks::new(3);
        assert_eq!(landmarks.get(1).visibility(), None);

        landmarks.set(1, Landmark::new([1.0, 2.0, 3.0]).with_visibility(0.25));
        let lm = landmarks.get(1);
        assert_eq!(lm.position(), [1.0, 2.0, 3.0]);
        assert_eq!(lm.visibility(), Some(0.25));
        assert_eq!(lm.presence(), None);
        assert_eq!(landmarks.get(0).visibility(), Some(0.0));
        assert_eq!(landmarks.iter().count(), 3);
    }

    #[test]
    fn filter_smooths_positions() {
        let mut filter = LandmarkFilter::new(Ema::new(0.5), 1);
        let mut landmarks = Landmarks::new(1);

        landmarks.set(0, Landmark::new([0.0, 0.0, 0.0]));
        filter.filter(&mut landmarks);
        assert_eq!(landmarks.get(0).position(), [0.0, 0.0, 0.0]);

        landmarks.set(0, Landmark::new([10.0, 20.0, 0.0]));
        filter.filter(&mut landmarks);
        assert_eq!(landmarks.get(0).position(), [5.0, 10.0, 0.0]);
    }

    #[test]
    fn default_filter_passes_through() {
        let mut landmarks = Landmarks::new(2);
        landmarks.set(1, Landmark::new([4.0, 5.0, 6.0]));
        LandmarkFilter::default().filter(&mut landmarks);
        assert_eq!(landmarks.get(1).position(), [4.0, 5.0, 6.0]);
    }
}
