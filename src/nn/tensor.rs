//! Tensor API.
//!
//! Tensors are the inputs and outputs of neural networks. Here they carry video frames into the
//! networks and detections, landmarks and emotion scores out of them.
//!
//! A Tensor is nothing more than an N-dimensional array of `f32`s.

use std::fmt;

use crate::iter::zip_exact;
use tinyvec::TinyVec;

/// Shape and strides of a tensor, stored back to back.
#[derive(Clone)]
struct Layout(TinyVec<[usize; 8]>);

impl Layout {
    fn from_shape(shape: &[usize]) -> Self {
        let mut vec = TinyVec::from(shape);
        vec.extend(shape.iter().map(|_| 0));

        let mut stride = 1;
        for (out, size) in zip_exact(
            vec[shape.len()..].iter_mut().rev(),
            shape.iter().copied().rev(),
        ) {
            *out = stride;
            stride *= size;
        }

        Self(vec)
    }

    fn shape(&self) -> &[usize] {
        &self.0[..self.0.len() / 2]
    }

    fn elements(&self) -> usize {
        self.shape().iter().product()
    }

    fn strides(&self) -> &[usize] {
        &self.0[self.0.len() / 2..]
    }

    fn remove_prefix(&self, num: usize) -> Layout {
        assert!(num <= self.shape().len());

        let mut vec = TinyVec::with_capacity(2 * (self.shape().len() - num));
        vec.extend(self.shape()[num..].iter().copied());
        vec.extend(self.strides()[num..].iter().copied());
        Layout(vec)
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.shape()).finish()
    }
}

/// Advances a multi-dimensional index in row-major order.
///
/// Returns `false` once every index of `shape` has been visited.
fn advance_index(index: &mut [usize], shape: &[usize]) -> bool {
    for (next, &size) in zip_exact(index.iter_mut(), shape.iter()).rev() {
        if *next + 1 == size {
            *next = 0;
        } else {
            *next += 1;
            return true;
        }
    }

    false
}

/// A dynamically sized tensor of `f32`s.
///
/// # Construction
///
/// Tensors are created from a shape and a closure ([`Tensor::from_array_shape_fn`]), from an
/// iterator ([`Tensor::from_iter`]), or from arrays of values via [`From`].
///
/// # Data Access
///
/// [`Tensor::index`] creates a [`TensorView`] that refers to a suffix of the tensor's dimensions.
/// One-dimensional data is accessed with `as_slice`, zero-dimensional data with `as_singular`.
#[derive(Clone)]
pub struct Tensor {
    layout: Layout,
    data: Box<[f32]>,
}

/// A borrowed view into a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    layout: Layout,
    data: &'a [f32],
}

impl Tensor {
    /// Creates an `N`-dimensional tensor of the given shape by calling `f` for each element.
    ///
    /// This will invoke `f` with successive indices to fill, starting with `[0, ..., 0, 0]`, then
    /// `[0, ..., 0, 1]` and so on.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let layout = Layout::from_shape(&shape);
        let mut data = Vec::with_capacity(layout.elements());
        if layout.elements() != 0 {
            let mut index = [0; N];
            loop {
                data.push(f(index));
                if !advance_index(&mut index, &shape) {
                    break;
                }
            }
        }

        Self {
            layout,
            data: data.into_boxed_slice(),
        }
    }

    /// Creates a tensor of the given shape by pulling elements from an iterator.
    ///
    /// # Panics
    ///
    /// `iter` must yield exactly as many elements as specified by `shape` (by multiplying all of
    /// its entries), otherwise this method will panic.
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let layout = Layout::from_shape(shape);
        let data: Box<_> = iter.into_iter().collect();
        assert_eq!(
            data.len(),
            layout.elements(),
            "tensor of shape {:?} needs {} elements",
            shape,
            layout.elements(),
        );
        Self { layout, data }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        let data = tract.as_slice::<f32>()?;
        Ok(Self::from_iter(tract.shape(), data.iter().copied()))
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        Ok(tract_onnx::prelude::Tensor::from_shape(
            self.shape(),
            &self.data,
        )?)
    }

    /// Returns the shape of this tensor.
    ///
    /// A tensor's shape is the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Returns the number of dimensions of this tensor.
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Indexes a prefix of the tensor's dimensions with `indices`.
    ///
    /// Indexing a tensor of shape `[2, 3, 4, 5]` with `[a, b]` returns a view of shape `[4, 5]`.
    /// Indexing with zero indices returns a view of the whole tensor.
    ///
    /// # Panics
    ///
    /// This method will panic if `indices` has more entries than `self` has dimensions, or if any
    /// index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.as_view().index(indices)
    }

    fn as_view(&self) -> TensorView<'_> {
        TensorView {
            layout: self.layout.clone(),
            data: &self.data,
        }
    }

    /// Returns the values stored in a 1-dimensional tensor as a slice.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor of shape {:?} as slice",
            self.shape()
        );
        &self.data
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Tensor::from_array_shape_fn([N], |[i]| arr[i])
    }
}

impl<'d> TensorView<'d> {
    /// Returns the shape of this tensor view.
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Returns the number of dimensions of this tensor view.
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Indexes a prefix of the tensor view's dimensions with `indices`.
    ///
    /// # Panics
    ///
    /// This method will panic if `indices` has more entries than `self` has dimensions, or if any
    /// index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'d> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor of shape {:?} with {:?}",
            self.shape(),
            indices
        );

        let mut data = self.data;
        for ((&length, &stride), index) in self
            .layout
            .shape()
            .iter()
            .zip(self.layout.strides())
            .zip(indices)
        {
            assert!(
                index < length,
                "attempted to index tensor of shape {:?} with {:?}",
                self.shape(),
                indices
            );
            data = &data[index * stride..(index + 1) * stride];
        }
        TensorView {
            layout: self.layout.remove_prefix(N),
            data,
        }
    }

    /// Iterates over the outermost dimension of this tensor view.
    ///
    /// # Panics
    ///
    /// `self` must have at least one dimension, otherwise this method will panic.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'d>> + '_ {
        assert!(
            self.rank() > 0,
            "attempted to iterate over 0-dimensional tensor view"
        );
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    /// Returns the values stored in a 1-dimensional view as a slice.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &'d [f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor view of shape {:?} as slice",
            self.shape()
        );
        self.data
    }

    /// Returns the value stored in a 0-dimensional view.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions, otherwise this method will panic.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access view of shape {:?} as singular element",
            self.shape(),
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.layout)
            .finish()
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("shape", &self.layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_order() {
        let expected = [
            [0, 0, 0],
            [0, 0, 1],
            [0, 0, 2],
            [0, 1, 0],
            [0, 1, 1],
            [0, 1, 2],
        ];

        let mut iter = expected.into_iter();
        let tensor = Tensor::from_array_shape_fn([1, 2, 3], |index| {
            assert_eq!(iter.next(), Some(index));
            0.0
        });
        assert_eq!(iter.next(), None);
        assert_eq!(tensor.rank(), 3);
        assert_eq!(tensor.shape(), &[1, 2, 3]);
    }

    #[test]
    fn empty() {
        let tensor = Tensor::from_array_shape_fn([1, 2, 0, 3], |idx| unreachable!("{idx:?}"));
        assert_eq!(tensor.shape(), &[1, 2, 0, 3]);

        let view = tensor.index([0, 1]);
        assert_eq!(view.shape(), &[0, 3]);
        assert_eq!(view.iter().count(), 0);
    }

    #[test]
    fn index_nested() {
        // shaped like a classifier output: one batch of 4 scores
        let tensor = Tensor::from_iter(&[1, 4], [0.0, 1.0, 2.0, 3.0]);
        let scores = tensor.index([0]);
        assert_eq!(scores.shape(), &[4]);
        assert_eq!(scores.as_slice(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(tensor.index([0, 2]).as_singular(), 2.0);
        assert_eq!(scores.index([3]).as_singular(), 3.0);
    }

    #[test]
    fn index_rows() {
        let iter = [[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]].into_iter().flatten();
        let tensor = Tensor::from_iter(&[1, 3, 2], iter);

        let rows = tensor
            .index([0])
            .iter()
            .map(|row| row.as_slice().to_vec())
            .collect::<Vec<_>>();
        assert_eq!(rows, [[0.0f32, 1.0], [2.0, 3.0], [4.0, 5.0]]);
    }

    #[test]
    #[should_panic(expected = "attempted to index")]
    fn index_out_of_bounds() {
        let tensor = Tensor::from([1.0, 2.0]);
        tensor.index([2]);
    }

    #[test]
    #[should_panic(expected = "needs 4 elements")]
    fn from_iter_wrong_length() {
        Tensor::from_iter(&[2, 2], [1.0]);
    }
}
