use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};
use image::{imageops, DynamicImage};
use serde::{Deserialize, Serialize};

/// How 8-bit pixel values are scaled before they reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelScaling {
    /// 0..=255, as the classifier was trained.
    #[default]
    Raw,
    /// 0..=1
    Unit,
    /// -1..=1
    Symmetric,
}

impl PixelScaling {
    pub fn apply(self, value: u8) -> f32 {
        let value = f32::from(value);
        match self {
            PixelScaling::Raw => value,
            PixelScaling::Unit => value / 255.0,
            PixelScaling::Symmetric => value / 127.5 - 1.0,
        }
    }
}

/// Stretches to exactly `size`×`size`. No letterboxing, so heatmap coordinates
/// map straight back onto the stretched original.
pub fn resize_image(image: &DynamicImage, size: u32) -> DynamicImage {
    image.resize_exact(size, size, imageops::FilterType::Triangle)
}

/// RGB planes in `[channel, y, x]` order.
pub fn image_to_chw(image: &DynamicImage, scaling: PixelScaling) -> Vec<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let plane = width * height;
    let mut values = vec![0.0; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * width + x as usize;
        for c in 0..3 {
            values[c * plane + offset] = scaling.apply(pixel[c]);
        }
    }

    values
}

/// Resizes and converts to a `[1, 3, size, size]` tensor.
pub fn resize_image_to_tensor<B: Backend>(
    image: &DynamicImage,
    size: u32,
    scaling: PixelScaling,
    device: &B::Device,
) -> Tensor<B, 4> {
    let resized = resize_image(image, size);
    let values = image_to_chw(&resized, scaling);
    let side = size as usize;
    Tensor::from_data(TensorData::new(values, [1, 3, side, side]), device)
}
