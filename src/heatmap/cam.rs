use crate::error::HeatmapError;
use crate::model_runtime::interface::{ActivationMap, Gradient};
use ndarray::{Array1, Array2, Axis};

/// Spatial mean of the gradient, one weight per channel.
pub fn channel_weights(gradient: &Gradient) -> Array1<f32> {
    let (height, width, channels) = gradient.dim();
    if height * width == 0 {
        return Array1::zeros(channels);
    }
    gradient.sum_axis(Axis(0)).sum_axis(Axis(0)) / (height * width) as f32
}

/// Weighted channel sum at every spatial location, at the layer's resolution.
pub fn class_activation_map(
    activations: &ActivationMap,
    gradient: &Gradient,
) -> Result<Array2<f32>, HeatmapError> {
    if activations.shape() != gradient.shape() {
        return Err(HeatmapError::ShapeMismatch {
            activations: activations.shape().to_vec(),
            gradient: gradient.shape().to_vec(),
        });
    }
    if activations.is_empty() {
        return Err(HeatmapError::Empty);
    }

    let weights = channel_weights(gradient);
    Ok(activations.map_axis(Axis(2), |pixel| pixel.dot(&weights)))
}

/// Drops negative evidence and scales into `[0, 1]`. A grid with no positive
/// value (or a non-finite peak) comes back all zeros.
pub fn normalize(cam: &Array2<f32>) -> Array2<f32> {
    // f32::max discards NaN
    let rectified = cam.mapv(|v| v.max(0.0));
    let peak = rectified.iter().copied().fold(0.0_f32, f32::max);
    if peak <= 0.0 || !peak.is_finite() {
        return Array2::zeros(cam.raw_dim());
    }
    rectified.mapv(|v| (v / peak).clamp(0.0, 1.0))
}
