use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::Array2;

/// Smoothly upsamples a `[0, 1]` grid to `size`×`size`. The result is
/// clamped back into `[0, 1]`.
pub fn resize_grid(grid: &Array2<f32>, size: u32) -> Array2<f32> {
    let (height, width) = grid.dim();
    let source: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            Luma([grid[[y as usize, x as usize]]])
        });
    let resized = imageops::resize(&source, size, size, FilterType::Triangle);

    let side = size as usize;
    Array2::from_shape_fn((side, side), |(y, x)| {
        resized.get_pixel(x as u32, y as u32)[0].clamp(0.0, 1.0)
    })
}

/// Per-channel `original_weight × original + heatmap_weight × heatmap`,
/// rounded and clamped to 0..=255. Both images must share dimensions.
pub fn blend(
    original: &RgbImage,
    heatmap: &RgbImage,
    original_weight: f32,
    heatmap_weight: f32,
) -> RgbImage {
    RgbImage::from_fn(original.width(), original.height(), |x, y| {
        let a = original.get_pixel(x, y);
        let b = heatmap.get_pixel(x, y);
        let mix = |c: usize| {
            (original_weight * f32::from(a[c]) + heatmap_weight * f32::from(b[c]))
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Rgb([mix(0), mix(1), mix(2)])
    })
}
