//! Neural Network inference.
//!
//! Networks are loaded from ONNX files and run on the CPU with [`tract_onnx`].

pub mod tensor;

use crate::image::{AsImageView, Color, ImageView, Resolution};
use tensor::Tensor;
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    image_map: Arc<dyn Fn(ImageView<'_>) -> Tensor + Send + Sync>,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`]. The input may have 3 color channels (RGB) or a single channel, which is
    /// fed the luminance of each pixel.
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let (input_res, channels) = Self::get_input_format(&nn, shape)?;
        let (h, w) = (input_res.height() as usize, input_res.width() as usize);

        fn sample(view: &ImageView<'_>, u: f32, v: f32) -> Color {
            let x = (u * view.width() as f32) as u32;
            let y = (v * view.height() as f32) as u32;
            view.get(x, y)
        }

        // Box a closure that maps the whole input image to a tensor. That way we avoid dynamic
        // dispatch for every pixel.
        let image_map: Arc<dyn Fn(ImageView<'_>) -> _ + Send + Sync> = match (shape, channels) {
            (CnnInputShape::NCHW, Channels::Rgb) => Arc::new(move |view| {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| {
                    color_mapper.map(sample(&view, x as f32 / w as f32, y as f32 / h as f32))[c]
                })
            }),
            (CnnInputShape::NHWC, Channels::Rgb) => Arc::new(move |view| {
                Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| {
                    color_mapper.map(sample(&view, x as f32 / w as f32, y as f32 / h as f32))[c]
                })
            }),
            (CnnInputShape::NCHW, Channels::Luminance) => Arc::new(move |view| {
                Tensor::from_array_shape_fn([1, 1, h, w], |[_, _, y, x]| {
                    color_mapper
                        .map_luminance(sample(&view, x as f32 / w as f32, y as f32 / h as f32))
                })
            }),
            (CnnInputShape::NHWC, Channels::Luminance) => Arc::new(move |view| {
                Tensor::from_array_shape_fn([1, h, w, 1], |[_, y, x, _]| {
                    color_mapper
                        .map_luminance(sample(&view, x as f32 / w as f32, y as f32 / h as f32))
                })
            }),
        };

        Ok(Self {
            nn,
            input_res,
            image_map,
        })
    }

    fn get_input_format(
        nn: &NeuralNetwork,
        shape: CnnInputShape,
    ) -> anyhow::Result<(Resolution, Channels)> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let input_info = nn.input_info(0)?;
        let tensor_shape = input_info.shape();

        let (w, h, c) = match (shape, tensor_shape) {
            (CnnInputShape::NCHW, &[1, c, h, w]) | (CnnInputShape::NHWC, &[1, h, w, c]) => {
                (w, h, c)
            }
            _ => {
                anyhow::bail!(
                    "invalid model input shape for {:?} CNN: {:?}",
                    shape,
                    tensor_shape,
                );
            }
        };
        let channels = match c {
            1 => Channels::Luminance,
            3 => Channels::Rgb,
            _ => anyhow::bail!("unsupported number of CNN input channels: {}", c),
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok((Resolution::new(w, h), channels))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on an input image, returning the estimated outputs.
    ///
    /// The input image will be sampled to create the network's input tensor. If the image's aspect
    /// ratio does not match the network's input aspect ratio, the image will be stretched.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&self, image: ImageView<'_>) -> anyhow::Result<Outputs> {
        let tensor = (self.image_map)(image);

        self.nn.estimate(&Inputs::from(tensor))
    }
}

#[derive(Clone, Copy, Debug)]
enum Channels {
    Rgb,
    Luminance,
}

/// Maps 8-bit sRGB colors to the value range a network expects.
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// The returned object can be passed directly to [`Cnn::new`] as its color map.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start, "empty color range {:?}", target_range);

        Self { target_range }
    }

    fn adjust(&self, value: f32) -> f32 {
        let start = *self.target_range.start();
        let end = *self.target_range.end();
        value * ((end - start) / 255.0) + start
    }

    fn map(&self, color: Color) -> [f32; 3] {
        [color.r(), color.g(), color.b()].map(|col| self.adjust(col as f32))
    }

    fn map_luminance(&self, color: Color) -> f32 {
        self.adjust(color.luminance())
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, fixed at 1.
/// - `C` is the number of color channels, 3 for RGB inputs or 1 for grayscale inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive] // shouldn't be matched on by user code
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// Neural network loader.
pub struct Loader {
    model_data: Vec<u8>,
    outputs: Option<Vec<usize>>,
}

impl Loader {
    fn new(model_data: Vec<u8>) -> Self {
        Self {
            model_data,
            outputs: None,
        }
    }

    /// Only compute the specified outputs during inference.
    ///
    /// This takes a list of [`usize`]s corresponding to network output indices. When called, the
    /// [`Outputs`] returned from [`NeuralNetwork::estimate`] will only contain the chosen output
    /// tensors, in the given order.
    ///
    /// # Example
    ///
    /// The pose landmark network computes 5 output tensors by default: `A`, `B`, `C`, `D`, and
    /// `E`. Passing `[0, 1]` to [`Loader::with_output_selection`] makes the loaded network only
    /// compute and return `A` and `B`.
    pub fn with_output_selection<O>(mut self, outputs: O) -> Self
    where
        O: Into<Vec<usize>>,
    {
        self.outputs = Some(outputs.into());
        self
    }

    /// Loads and optimizes the network.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, if
    /// the network uses unimplemented operations, or if a selected output does not exist.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*self.model_data)?
            .into_optimized()?;
        let outputs = graph.output_outlets()?;
        let selected_outputs = match self.outputs {
            Some(indices) => indices
                .iter()
                .map(|&i| {
                    outputs.get(i).copied().ok_or_else(|| {
                        anyhow::anyhow!(
                            "output {} selected, but network only has {} outputs",
                            i,
                            outputs.len(),
                        )
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => outputs.to_vec(),
        };
        let model = SimplePlan::new_for_outputs(graph, &selected_outputs)?;

        Ok(NeuralNetwork(Arc::new(model)))
    }
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Loader> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Loader> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path).map_err(|e| {
            anyhow::anyhow!("failed to read model file '{}': {}", path.display(), e)
        })?;
        log::debug!("read {} bytes from {}", model_data.len(), path.display());
        Ok(Loader::new(model_data))
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the shape of the input node at `index`.
    pub fn input_info(&self, index: usize) -> anyhow::Result<NodeInfo<'_>> {
        let model = self.0.model();
        let fact = model.input_fact(index)?;
        let node = model.input_outlets()?[index].node;
        NodeInfo::new(fact, &model.node(node).name)
    }

    /// Runs the network on a set of [`Inputs`], returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let tract_inputs = inputs
            .iter()
            .map(|t| Ok(TValue::from_const(Arc::new(t.to_tract()?))))
            .collect::<anyhow::Result<TVec<_>>>()?;
        let outputs = self.0.run(tract_inputs)?;
        let inner = outputs
            .iter()
            .map(|tract| Tensor::from_tract(tract))
            .collect::<anyhow::Result<_>>()?;

        Ok(Outputs { inner })
    }
}

/// Information about a neural network input node.
#[derive(Debug)]
pub struct NodeInfo<'a> {
    shape: &'a [usize],
}

impl<'a> NodeInfo<'a> {
    fn new(fact: &'a TypedFact, name: &str) -> anyhow::Result<Self> {
        let shape = fact
            .shape
            .as_concrete()
            .ok_or_else(|| anyhow::anyhow!("node '{}' has a symbolic shape", name))?;
        Ok(Self { shape })
    }

    /// Returns the tensor shape for this node.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.shape
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over the output tensors.
    pub fn iter(&self) -> std::slice::Iter<'_, Tensor> {
        self.inner.iter()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

impl<'a> IntoIterator for &'a Outputs {
    type Item = &'a Tensor;
    type IntoIter = std::slice::Iter<'a, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Assembles network outputs by hand, for feeding synthetic results to extraction code.
impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// List of input tensors for neural network inference.
#[derive(Debug)]
pub struct Inputs {
    inner: TVec<Tensor>,
}

impl Inputs {
    /// Returns the number of input tensors stored in `self`.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl From<Tensor> for Inputs {
    fn from(t: Tensor) -> Self {
        Self { inner: tvec![t] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(1.0..=2.0);
        assert_eq!(mapper.map(Color::BLACK), [1.0, 1.0, 1.0]);
        assert_eq!(mapper.map(Color::WHITE), [2.0, 2.0, 2.0]);
    }

    #[test]
    fn color_mapper_luminance() {
        let mapper = ColorMapper::linear(0.0..=255.0);
        assert_eq!(mapper.map_luminance(Color::BLACK), 0.0);
        approx::assert_relative_eq!(mapper.map_luminance(Color::WHITE), 255.0, epsilon = 1e-3);
        approx::assert_relative_eq!(
            mapper.map_luminance(Color::from_rgb8(100, 100, 100)),
            100.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn rejects_non_onnx_paths() {
        let err = NeuralNetwork::from_path("models/network.tflite")
            .err()
            .expect("non-ONNX path accepted");
        assert!(err.to_string().contains("`.onnx` extension"), "{err}");
    }

    #[test]
    fn missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = NeuralNetwork::from_path(dir.path().join("missing.onnx"))
            .err()
            .expect("missing file accepted");
        assert!(err.to_string().contains("missing.onnx"), "{err}");
    }

    #[test]
    fn outputs_from_tensors() {
        let outputs: Outputs = [Tensor::from([1.0, 2.0]), Tensor::from([3.0])]
            .into_iter()
            .collect();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[1].as_slice(), &[3.0]);
        assert_eq!(outputs.iter().map(|t| t.shape()[0]).sum::<usize>(), 3);
    }
}
