use crate::error::RuntimeError;
use image::DynamicImage;
use ndarray::Array3;

/// Output of the chosen spatial layer, laid out `[height, width, channels]`.
pub type ActivationMap = Array3<f32>;

/// Gradient of the scalar score with respect to an [`ActivationMap`]; same shape.
pub type Gradient = Array3<f32>;

/// A loaded binary classifier.
///
/// Implementations need not be safe for concurrent use; callers share one
/// behind a `Mutex` or give each worker its own instance.
pub trait ModelRuntime: Send {
    /// Sigmoid output in `[0, 1]`. Same image and weights give the same score.
    fn forward(&self, image: &DynamicImage) -> Result<f32, RuntimeError>;

    /// Activations of the selected spatial layer and the gradient of the
    /// score with respect to them.
    fn activations_and_gradient(
        &self,
        image: &DynamicImage,
    ) -> Result<(ActivationMap, Gradient), RuntimeError>;

    /// Name of the layer the gradient pass reads from.
    fn spatial_layer_name(&self) -> &str;
}
