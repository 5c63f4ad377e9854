//! Exponential moving average, used to smooth pose landmarks across frames.

use super::Filter;

/// Exponential moving average over a stream of `f32` values.
///
/// `alpha` is the weight of each new value, so `1.0` disables smoothing and values near `0.0`
/// make landmarks lag far behind the person.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
}

impl Ema {
    /// # Panics
    ///
    /// Panics if `alpha` lies outside `0.0..=1.0`.
    pub fn new(alpha: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&alpha),
            "smoothing factor must be in 0.0..=1.0, got {alpha}"
        );
        Self { alpha }
    }
}

/// Per-landmark state of an [`Ema`]: the last smoothed value, if any.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmaState(Option<f32>);

impl Filter<f32> for Ema {
    type State = EmaState;

    fn filter(&self, state: &mut Self::State, value: f32) -> f32 {
        // The first value passes through unchanged.
        let smoothed = state
            .0
            .map_or(value, |prev| prev + self.alpha * (value - prev));
        state.0 = Some(smoothed);
        smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SimpleFilter;

    #[test]
    fn smooths_towards_new_values() {
        let mut filter = SimpleFilter::new(Ema::new(0.5));
        assert_eq!(filter.filter(1.0), 1.0);
        assert_eq!(filter.filter(2.0), 1.5);
        assert_eq!(filter.filter(2.0), 1.75);
        assert_eq!(filter.filter(1.75), 1.75);
    }

    #[test]
    fn alpha_one_disables_smoothing() {
        let mut filter = SimpleFilter::new(Ema::new(1.0));
        for value in [3.0, -2.0, 10.0] {
            assert_eq!(filter.filter(value), value);
        }
    }

    #[test]
    #[should_panic(expected = "smoothing factor")]
    fn rejects_alpha_above_one() {
        Ema::new(1.5);
    }
}
