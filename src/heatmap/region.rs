use crate::heatmap::colormap::quantize;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const OUTER_BORDER: Rgb<u8> = Rgb([255, 0, 0]);
const INNER_BORDER: Rgb<u8> = Rgb([255, 255, 255]);

/// Bounding box in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalientRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 255 where `trunc(v × 255) > threshold`, 0 elsewhere.
pub fn hot_mask(heatmap: &Array2<f32>, threshold: u8) -> GrayImage {
    let (height, width) = heatmap.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        if quantize(heatmap[[y as usize, x as usize]]) > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[derive(Debug)]
struct Component {
    area: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

/// Bounding box of the largest 8-connected hot component. Equal areas go to
/// the component reached first in raster order.
pub fn extract_salient_region(heatmap: &Array2<f32>, threshold: u8) -> Option<SalientRegion> {
    let mask = hot_mask(heatmap, threshold);
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut order: HashMap<u32, usize> = HashMap::new();
    let mut components: Vec<Component> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let index = *order.entry(label).or_insert_with(|| {
            components.push(Component {
                area: 0,
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            });
            components.len() - 1
        });
        let c = &mut components[index];
        c.area += 1;
        c.min_x = c.min_x.min(x);
        c.min_y = c.min_y.min(y);
        c.max_x = c.max_x.max(x);
        c.max_y = c.max_y.max(y);
    }

    let largest = components
        .iter()
        .fold(None::<&Component>, |best, c| match best {
            Some(b) if b.area >= c.area => Some(b),
            _ => Some(c),
        })?;

    Some(SalientRegion {
        x: largest.min_x,
        y: largest.min_y,
        width: largest.max_x - largest.min_x + 1,
        height: largest.max_y - largest.min_y + 1,
    })
}

/// Outer red border `thickness` pixels wide, centered on the box edge, with a
/// one-pixel white border on top of it. Anything outside the image is clipped.
pub fn draw_region(image: &mut RgbImage, region: SalientRegion, thickness: u32) {
    let thickness = thickness as i32;
    let half = thickness / 2;
    for offset in -half..thickness - half {
        draw_ring(image, region, offset, OUTER_BORDER);
    }
    draw_ring(image, region, 0, INNER_BORDER);
}

/// Rectangle grown outward by `offset` pixels on every side.
fn draw_ring(image: &mut RgbImage, region: SalientRegion, offset: i32, color: Rgb<u8>) {
    let width = region.width as i32 + 2 * offset;
    let height = region.height as i32 + 2 * offset;
    if width <= 0 || height <= 0 {
        return;
    }
    let rect = Rect::at(region.x as i32 - offset, region.y as i32 - offset)
        .of_size(width as u32, height as u32);
    draw_hollow_rect_mut(image, rect, color);
}
