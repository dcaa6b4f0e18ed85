use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// 2D convolution followed by ReLU.
    Conv2d { slot: usize },
    MaxPool2d,
    Flatten,
    /// Fully connected layer followed by ReLU.
    Dense,
    /// Single-unit fully connected layer followed by sigmoid.
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub kind: LayerKind,
    /// Per-sample output shape, channels last: `[h, w, c]` or `[n]`.
    pub output_shape: Vec<usize>,
}

impl Layer {
    pub fn is_spatial(&self) -> bool {
        self.output_shape.len() == 3
    }
}

/// Picks the layer the class activation map is computed from: scanning from
/// the output toward the input, the first layer whose output is a
/// `(height, width, channels)` map.
///
/// This is a heuristic that holds for conv-then-dense stacks like the ones
/// [`crate::model_runtime::network::NetworkConfig`] describes. Architectures
/// with spatial layers after a flatten, or with several branches, are not
/// covered.
pub fn select_spatial_layer(layers: &[Layer]) -> Result<usize, ModelError> {
    layers
        .iter()
        .rposition(Layer::is_spatial)
        .ok_or(ModelError::NoSpatialLayer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, kind: LayerKind, shape: &[usize]) -> Layer {
        Layer {
            name: name.to_string(),
            kind,
            output_shape: shape.to_vec(),
        }
    }

    #[test]
    fn picks_last_spatial_layer() {
        let layers = vec![
            layer("conv2d", LayerKind::Conv2d { slot: 0 }, &[64, 64, 32]),
            layer("max_pooling2d", LayerKind::MaxPool2d, &[32, 32, 32]),
            layer("conv2d_1", LayerKind::Conv2d { slot: 1 }, &[32, 32, 64]),
            layer("max_pooling2d_1", LayerKind::MaxPool2d, &[16, 16, 64]),
            layer("flatten", LayerKind::Flatten, &[16384]),
            layer("dense", LayerKind::Dense, &[128]),
            layer("dense_1", LayerKind::Output, &[1]),
        ];

        let index = select_spatial_layer(&layers).unwrap();
        assert_eq!(layers[index].name, "max_pooling2d_1");
    }

    #[test]
    fn flat_only_model_has_no_spatial_layer() {
        let layers = vec![
            layer("flatten", LayerKind::Flatten, &[12288]),
            layer("dense", LayerKind::Dense, &[128]),
            layer("dense_1", LayerKind::Output, &[1]),
        ];

        assert!(matches!(
            select_spatial_layer(&layers),
            Err(ModelError::NoSpatialLayer)
        ));
    }

    #[test]
    fn empty_model_has_no_spatial_layer() {
        assert!(select_spatial_layer(&[]).is_err());
    }
}
