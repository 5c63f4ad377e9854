//! Data filtering and smoothing.

pub mod ema;

/// A filter for values of type `V`.
///
/// The filter parameters live in the implementor, while the per-signal history lives in a separate
/// [`Filter::State`]. That way a single filter can smooth many independent values, like the
/// coordinates of a set of landmarks.
pub trait Filter<V> {
    /// Per-signal filter state.
    type State: Default;

    /// Feeds `value` into the filter, returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}

/// Bundles a [`Filter`] with the state for a single signal.
pub struct SimpleFilter<F: Filter<V>, V> {
    filter: F,
    state: F::State,
}

impl<F: Filter<V>, V> SimpleFilter<F, V> {
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            state: F::State::default(),
        }
    }

    pub fn filter(&mut self, value: V) -> V {
        self.filter.filter(&mut self.state, value)
    }
}
