//! The chest X-ray classifier: a Keras-style stack of conv blocks followed by
//! a dense head with a single sigmoid unit.

use crate::error::{ModelError, RuntimeError};
use crate::model_runtime::layers::{Layer, LayerKind};
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::Backend;
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::module::max_pool2d;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

const INPUT_CHANNELS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Square input resolution the image is resized to.
    pub input_size: usize,
    /// Output channels of each conv block; every block halves the resolution.
    pub conv_channels: Vec<usize>,
    pub kernel_size: usize,
    pub hidden_units: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_size: 64,
            conv_channels: vec![32, 64],
            kernel_size: 3,
            hidden_units: 128,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.kernel_size % 2 == 0 {
            return Err(ModelError::InvalidArchitecture(format!(
                "kernel_size must be odd, got {}",
                self.kernel_size
            )));
        }
        if self.hidden_units == 0 || self.conv_channels.contains(&0) {
            return Err(ModelError::InvalidArchitecture(
                "layer widths must be positive".to_string(),
            ));
        }
        if self.input_size >> self.conv_channels.len() == 0 {
            return Err(ModelError::InvalidArchitecture(format!(
                "input_size {} is too small for {} pooling stages",
                self.input_size,
                self.conv_channels.len()
            )));
        }
        Ok(())
    }

    /// The layer sequence in forward order, with per-sample output shapes.
    pub fn layers(&self) -> Vec<Layer> {
        let mut layers = Vec::with_capacity(self.conv_channels.len() * 2 + 3);
        let mut size = self.input_size;
        let mut channels = INPUT_CHANNELS;

        for (slot, &out) in self.conv_channels.iter().enumerate() {
            channels = out;
            layers.push(Layer {
                name: keras_name("conv2d", slot),
                kind: LayerKind::Conv2d { slot },
                output_shape: vec![size, size, channels],
            });

            size /= 2;
            layers.push(Layer {
                name: keras_name("max_pooling2d", slot),
                kind: LayerKind::MaxPool2d,
                output_shape: vec![size, size, channels],
            });
        }

        layers.push(Layer {
            name: "flatten".to_string(),
            kind: LayerKind::Flatten,
            output_shape: vec![size * size * channels],
        });
        layers.push(Layer {
            name: "dense".to_string(),
            kind: LayerKind::Dense,
            output_shape: vec![self.hidden_units],
        });
        layers.push(Layer {
            name: "dense_1".to_string(),
            kind: LayerKind::Output,
            output_shape: vec![1],
        });

        layers
    }

    fn flattened_len(&self) -> usize {
        let size = self.input_size >> self.conv_channels.len();
        let channels = self.conv_channels.last().copied().unwrap_or(INPUT_CHANNELS);
        size * size * channels
    }
}

fn keras_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}_{index}")
    }
}

/// Intermediate value flowing between layers.
#[derive(Debug)]
pub enum Features<B: Backend> {
    /// `[batch, channels, height, width]`
    Spatial(Tensor<B, 4>),
    /// `[batch, features]`
    Flat(Tensor<B, 2>),
}

#[derive(Debug, Module)]
pub struct ChestXrayNet<B: Backend> {
    convs: Vec<Conv2d<B>>,
    hidden: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> ChestXrayNet<B> {
    /// Creates a network with freshly initialized weights. Real weights are
    /// loaded on top of it from a checkpoint.
    pub fn new(config: &NetworkConfig, device: &B::Device) -> Self {
        let mut in_channels = INPUT_CHANNELS;
        let convs = config
            .conv_channels
            .iter()
            .map(|&out| {
                let conv = Conv2dConfig::new(
                    [in_channels, out],
                    [config.kernel_size, config.kernel_size],
                )
                .with_padding(PaddingConfig2d::Same)
                .init(device);
                in_channels = out;
                conv
            })
            .collect();

        let hidden = LinearConfig::new(config.flattened_len(), config.hidden_units).init(device);
        let output = LinearConfig::new(config.hidden_units, 1).init(device);

        Self {
            convs,
            hidden,
            output,
        }
    }

    pub fn apply(&self, layer: &Layer, input: Features<B>) -> Result<Features<B>, RuntimeError> {
        match (layer.kind, input) {
            (LayerKind::Conv2d { slot }, Features::Spatial(x)) => {
                let conv = self
                    .convs
                    .get(slot)
                    .ok_or_else(|| RuntimeError::layer_input(&layer.name, "a loaded convolution"))?;
                Ok(Features::Spatial(relu(conv.forward(x))))
            }
            (LayerKind::MaxPool2d, Features::Spatial(x)) => Ok(Features::Spatial(max_pool2d(
                x,
                [2, 2],
                [2, 2],
                [0, 0],
                [1, 1],
            ))),
            (LayerKind::Flatten, Features::Spatial(x)) => Ok(Features::Flat(x.flatten(1, 3))),
            (LayerKind::Dense, Features::Flat(x)) => {
                Ok(Features::Flat(relu(self.hidden.forward(x))))
            }
            (LayerKind::Output, Features::Flat(x)) => {
                Ok(Features::Flat(sigmoid(self.output.forward(x))))
            }
            (LayerKind::Dense | LayerKind::Output, Features::Spatial(_)) => {
                Err(RuntimeError::layer_input(&layer.name, "flat"))
            }
            (_, Features::Flat(_)) => Err(RuntimeError::layer_input(&layer.name, "spatial")),
        }
    }

    /// Runs `layers` in order starting from `input`.
    pub fn run(&self, layers: &[Layer], input: Features<B>) -> Result<Features<B>, RuntimeError> {
        layers
            .iter()
            .try_fold(input, |features, layer| self.apply(layer, features))
    }

    /// Checks loaded parameter shapes against the configured architecture.
    pub fn check_shapes(&self, config: &NetworkConfig) -> Result<(), ModelError> {
        if self.convs.len() != config.conv_channels.len() {
            return Err(ModelError::incompatible_shape(
                format!("{} conv blocks", config.conv_channels.len()),
                format!("{} conv blocks", self.convs.len()),
            ));
        }

        let mut in_channels = INPUT_CHANNELS;
        for (conv, &out) in self.convs.iter().zip(&config.conv_channels) {
            let expected = [out, in_channels, config.kernel_size, config.kernel_size];
            let actual = conv.weight.val().dims();
            if actual != expected {
                return Err(ModelError::incompatible_shape(
                    format!("{expected:?}"),
                    format!("{actual:?}"),
                ));
            }
            in_channels = out;
        }

        for (linear, expected) in [
            (&self.hidden, [config.flattened_len(), config.hidden_units]),
            (&self.output, [config.hidden_units, 1]),
        ] {
            let actual = linear.weight.val().dims();
            if actual != expected {
                return Err(ModelError::incompatible_shape(
                    format!("{expected:?}"),
                    format!("{actual:?}"),
                ));
            }
        }

        Ok(())
    }
}
