use crate::error::HeatmapError;
use crate::heatmap::cam::{class_activation_map, normalize};
use crate::heatmap::colormap::colorize;
use crate::heatmap::overlay::{blend, resize_grid};
use crate::heatmap::region::{draw_region, extract_salient_region, SalientRegion};
use crate::model_runtime::interface::{ActivationMap, Gradient};
use crate::model_runtime::preprocess::resize_image;
use image::{DynamicImage, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Side of the square canvas the original and the heatmap are drawn on.
    pub canvas_size: u32,
    pub original_weight: f32,
    pub heatmap_weight: f32,
    /// 8-bit level a heatmap pixel must exceed to count as hot.
    pub hot_threshold: u8,
    pub border_thickness: u32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            canvas_size: 256,
            original_weight: 0.6,
            heatmap_weight: 0.4,
            hot_threshold: 180,
            border_thickness: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Explanation {
    /// The original stretched onto the canvas, before blending.
    pub canvas: RgbImage,
    /// Normalized heatmap at canvas resolution, values in `[0, 1]`.
    pub heatmap: Array2<f32>,
    /// Original blended with the colorized heatmap, region drawn when present.
    pub overlay: RgbImage,
    pub region: Option<SalientRegion>,
}

#[derive(Debug, Clone, Default)]
pub struct HeatmapEngine {
    config: HeatmapConfig,
}

impl HeatmapEngine {
    pub fn new(config: HeatmapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    /// The original stretched onto the canvas.
    pub fn canvas(&self, original: &DynamicImage) -> RgbImage {
        resize_image(original, self.config.canvas_size).to_rgb8()
    }

    pub fn explain(
        &self,
        original: &DynamicImage,
        activations: &ActivationMap,
        gradient: &Gradient,
    ) -> Result<Explanation, HeatmapError> {
        let cam = class_activation_map(activations, gradient)?;
        let heatmap = resize_grid(&normalize(&cam), self.config.canvas_size);

        let canvas = self.canvas(original);
        let mut overlay = blend(
            &canvas,
            &colorize(&heatmap),
            self.config.original_weight,
            self.config.heatmap_weight,
        );

        let region = extract_salient_region(&heatmap, self.config.hot_threshold);
        if let Some(region) = region {
            draw_region(&mut overlay, region, self.config.border_thickness);
        }

        Ok(Explanation {
            canvas,
            heatmap,
            overlay,
            region,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::colormap::jet;
    use crate::model_runtime::impl_fake::ModelRuntimeFake;
    use crate::model_runtime::interface::ModelRuntime;
    use image::Rgb;
    use ndarray::Array3;

    fn gray(size: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(size, size, Rgb([100, 100, 100])))
    }

    fn small_engine() -> HeatmapEngine {
        HeatmapEngine::new(HeatmapConfig {
            canvas_size: 64,
            ..HeatmapConfig::default()
        })
    }

    #[test]
    fn explanation_has_canvas_resolution_and_region() {
        let image = gray(300);
        let (activations, gradient) = ModelRuntimeFake::with_score(0.9)
            .activations_and_gradient(&image)
            .unwrap();

        let explanation = small_engine()
            .explain(&image, &activations, &gradient)
            .unwrap();

        assert_eq!(explanation.heatmap.dim(), (64, 64));
        assert_eq!(explanation.overlay.dimensions(), (64, 64));
        assert_eq!(explanation.canvas, small_engine().canvas(&image));
        assert!(explanation.heatmap.iter().all(|v| (0.0..=1.0).contains(v)));

        let region = explanation.region.expect("blob should produce a region");
        assert!(region.x + region.width <= 64 && region.y + region.height <= 64);
        // the blob sits in the upper right quarter
        assert!(region.x > 32 && region.y < 32);
        assert_eq!(*explanation.overlay.get_pixel(region.x, region.y), Rgb([255, 255, 255]));
    }

    #[test]
    fn zero_gradient_gives_plain_blend_without_region() {
        let image = gray(32);
        let activations = Array3::from_elem((4, 4, 2), 1.0);
        let gradient = Array3::zeros((4, 4, 2));

        let explanation = small_engine()
            .explain(&image, &activations, &gradient)
            .unwrap();

        assert!(explanation.region.is_none());
        assert!(explanation.heatmap.iter().all(|&v| v == 0.0));

        let cold = jet(0);
        let expected = Rgb([
            (0.6_f32 * 100.0 + 0.4 * f32::from(cold[0])).round() as u8,
            (0.6_f32 * 100.0 + 0.4 * f32::from(cold[1])).round() as u8,
            (0.6_f32 * 100.0 + 0.4 * f32::from(cold[2])).round() as u8,
        ]);
        assert!(explanation.overlay.pixels().all(|p| *p == expected));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let activations = Array3::zeros((4, 4, 2));
        let gradient = Array3::zeros((2, 2, 2));
        let result = small_engine().explain(&gray(8), &activations, &gradient);
        assert!(matches!(result, Err(HeatmapError::ShapeMismatch { .. })));
    }
}
