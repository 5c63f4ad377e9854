//! Arm raise detection.
//!
//! An arm counts as raised when its elbow is higher on screen than the eye on the same side of
//! the body. Since Y points down in image coordinates, that means the elbow's Y coordinate is
//! smaller than the eye's.

use super::landmark::{LandmarkIdx, LandmarkResult};

/// Returns whether either arm of `pose` is raised.
pub fn is_arm_raised(pose: &LandmarkResult) -> bool {
    let raised = |elbow: LandmarkIdx, eye: LandmarkIdx| pose.get(elbow).y() < pose.get(eye).y();
    raised(LandmarkIdx::LeftElbow, LandmarkIdx::LeftEye)
        || raised(LandmarkIdx::RightElbow, LandmarkIdx::RightEye)
}

/// Counts arm raises.
///
/// A raise is counted once, when the arms go from "not raised" to "raised". Holding an arm up
/// across many frames counts as a single movement.
#[derive(Debug, Clone, Default)]
pub struct ArmMovementCounter {
    raised: bool,
    count: u64,
}

impl ArmMovementCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the arm state of the next frame that contains a pose.
    ///
    /// Returns `true` if this frame started a new raise.
    pub fn update(&mut self, raised: bool) -> bool {
        let started = raised && !self.raised;
        if started {
            self.count += 1;
        }
        self.raised = raised;
        started
    }

    /// Whether the arms were raised in the last frame passed to [`Self::update`].
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::landmark::tests::pose;

    #[test]
    fn elbow_above_eye() {
        use LandmarkIdx::*;

        let resting = pose(50.0, 50.0, &[(LeftEye, 40.0, 20.0), (RightEye, 60.0, 20.0)]);
        assert!(!is_arm_raised(&resting));

        let left = pose(50.0, 50.0, &[(LeftEye, 40.0, 20.0), (LeftElbow, 30.0, 10.0)]);
        assert!(is_arm_raised(&left));

        let right = pose(50.0, 50.0, &[(RightEye, 60.0, 20.0), (RightElbow, 70.0, 19.0)]);
        assert!(is_arm_raised(&right));

        // Both at the same height is not "above".
        let level = pose(50.0, 20.0, &[]);
        assert!(!is_arm_raised(&level));
    }

    #[test]
    fn sides_are_not_mixed() {
        use LandmarkIdx::*;

        // The left elbow is above the right eye, but not above the left eye.
        let pose = pose(
            50.0,
            50.0,
            &[(LeftEye, 40.0, 10.0), (RightEye, 60.0, 30.0), (LeftElbow, 30.0, 20.0)],
        );
        assert!(!is_arm_raised(&pose));
    }

    #[test]
    fn counts_rising_edges() {
        let mut counter = ArmMovementCounter::new();
        let frames = [false, true, true, false, true, false, false, true];
        let started: Vec<_> = frames.iter().map(|&raised| counter.update(raised)).collect();

        assert_eq!(
            started,
            [false, true, false, false, true, false, false, true]
        );
        assert_eq!(counter.count(), 3);
        assert!(counter.is_raised());
    }

    #[test]
    fn held_raise_counts_once() {
        let mut counter = ArmMovementCounter::new();
        for _ in 0..100 {
            counter.update(true);
        }
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn random_sequences() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..50 {
            let frames: Vec<bool> = (0..rng.usize(0..64)).map(|_| rng.bool()).collect();

            let mut counter = ArmMovementCounter::new();
            for &raised in &frames {
                counter.update(raised);
            }

            let mut prev = false;
            let mut expected = 0;
            for &raised in &frames {
                if raised && !prev {
                    expected += 1;
                }
                prev = raised;
            }
            assert_eq!(counter.count(), expected, "{:?}", frames);
        }
    }
}
