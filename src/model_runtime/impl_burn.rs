use crate::error::{ModelError, RuntimeError};
use crate::model_runtime::checkpoint::load_checkpoint;
use crate::model_runtime::interface::{ActivationMap, Gradient, ModelRuntime};
use crate::model_runtime::layers::{select_spatial_layer, Layer};
use crate::model_runtime::network::{ChestXrayNet, Features, NetworkConfig};
use crate::model_runtime::preprocess::{resize_image_to_tensor, PixelScaling};
use burn::backend::{Autodiff, NdArray};
use burn::prelude::Backend;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use image::DynamicImage;
use ndarray::Array3;
use std::path::Path;
use tracing::info;

pub type DefaultBackend = Autodiff<NdArray<f32>>;

/// Classifier backed by a burn network on an autodiff backend, so the
/// gradient pass can differentiate through the head.
pub struct ModelRuntimeBurn<B: AutodiffBackend = DefaultBackend> {
    model: ChestXrayNet<B>,
    layers: Vec<Layer>,
    spatial_index: usize,
    input_size: u32,
    scaling: PixelScaling,
    device: B::Device,
}

impl<B: AutodiffBackend> ModelRuntimeBurn<B> {
    pub fn load(
        path: &Path,
        network: &NetworkConfig,
        scaling: PixelScaling,
        device: B::Device,
    ) -> Result<Self, ModelError> {
        network.validate()?;
        let model = ChestXrayNet::new(network, &device);
        let model = load_checkpoint(model, path, &device)?;
        info!(path = %path.display(), "model weights loaded");
        Self::from_model(model, network, scaling, device)
    }

    pub fn from_model(
        model: ChestXrayNet<B>,
        network: &NetworkConfig,
        scaling: PixelScaling,
        device: B::Device,
    ) -> Result<Self, ModelError> {
        network.validate()?;
        model.check_shapes(network)?;

        let layers = network.layers();
        let spatial_index = select_spatial_layer(&layers)?;
        info!(
            layer = %layers[spatial_index].name,
            shape = ?layers[spatial_index].output_shape,
            "selected spatial layer for class activation maps"
        );

        let input_size = u32::try_from(network.input_size).map_err(|_| {
            ModelError::InvalidArchitecture(format!("input_size {} too large", network.input_size))
        })?;

        Ok(Self {
            model,
            layers,
            spatial_index,
            input_size,
            scaling,
            device,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn input(&self, image: &DynamicImage) -> Tensor<B, 4> {
        resize_image_to_tensor(image, self.input_size, self.scaling, &self.device)
    }

    fn output_layer_name(&self) -> &str {
        self.layers.last().map(|l| l.name.as_str()).unwrap_or("output")
    }
}

impl<B: AutodiffBackend> ModelRuntime for ModelRuntimeBurn<B> {
    fn forward(&self, image: &DynamicImage) -> Result<f32, RuntimeError> {
        let output = self
            .model
            .run(&self.layers, Features::Spatial(self.input(image)))?;
        let Features::Flat(score) = output else {
            return Err(RuntimeError::layer_input(self.output_layer_name(), "flat"));
        };
        first_finite(score)
    }

    fn activations_and_gradient(
        &self,
        image: &DynamicImage,
    ) -> Result<(ActivationMap, Gradient), RuntimeError> {
        let (head, tail) = self.layers.split_at(self.spatial_index + 1);
        let layer_name = self.spatial_layer_name().to_string();

        let Features::Spatial(activations) =
            self.model.run(head, Features::Spatial(self.input(image)))?
        else {
            return Err(RuntimeError::layer_input(layer_name, "spatial"));
        };

        // Cut the graph at the spatial layer so the gradient lands on it.
        let activations = activations.detach().require_grad();

        let Features::Flat(score) = self
            .model
            .run(tail, Features::Spatial(activations.clone()))?
        else {
            return Err(RuntimeError::layer_input(self.output_layer_name(), "flat"));
        };

        let gradients = score.sum().backward();
        let gradient = activations
            .grad(&gradients)
            .ok_or(RuntimeError::MissingGradient(layer_name))?;

        Ok((to_hwc(activations.inner())?, to_hwc(gradient)?))
    }

    fn spatial_layer_name(&self) -> &str {
        &self.layers[self.spatial_index].name
    }
}

fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, RuntimeError> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| RuntimeError::Tensor(format!("{e:?}")))
}

fn first_finite<B: Backend>(score: Tensor<B, 2>) -> Result<f32, RuntimeError> {
    let score = tensor_values(score)?
        .first()
        .copied()
        .ok_or_else(|| RuntimeError::Tensor("empty model output".to_string()))?;
    if !score.is_finite() {
        return Err(RuntimeError::NonFiniteScore(score));
    }
    Ok(score)
}

/// `[1, c, h, w]` tensor to a `[h, w, c]` array.
fn to_hwc<B: Backend>(tensor: Tensor<B, 4>) -> Result<Array3<f32>, RuntimeError> {
    let [_, channels, height, width] = tensor.dims();
    let values = tensor_values(tensor)?;
    Ok(Array3::from_shape_fn(
        (height, width, channels),
        |(y, x, c)| values[(c * height + y) * width + x],
    ))
}
