use image::{Rgb, RgbImage};
use ndarray::Array2;

/// `[0, 1]` intensity to an 8-bit level, truncating the fraction.
pub fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

fn channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// JET: dark blue at 0 through cyan and yellow to dark red at 255.
pub fn jet(level: u8) -> Rgb<u8> {
    let t = f32::from(level) / 255.0;
    let ramp = |offset: f32| channel(1.5 - (4.0 * t - offset).abs());
    Rgb([ramp(3.0), ramp(2.0), ramp(1.0)])
}

pub fn colorize(heatmap: &Array2<f32>) -> RgbImage {
    let (height, width) = heatmap.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        jet(quantize(heatmap[[y as usize, x as usize]]))
    })
}
