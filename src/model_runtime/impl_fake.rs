use crate::error::RuntimeError;
use crate::model_runtime::interface::{ActivationMap, Gradient, ModelRuntime};
use image::DynamicImage;
use ndarray::Array3;
use rand::distr::{uniform, Distribution, Uniform};
use std::thread;
use std::time::Duration;
use tracing::debug;

const GRID: usize = 8;
const CHANNELS: usize = 4;

#[derive(Debug, Clone)]
enum Score {
    Fixed(f32),
    Random(Uniform<f32>),
}

/// Stand-in classifier. Its activation maps carry a single bright blob so the
/// heatmap pipeline always has a region to find.
#[derive(Debug, Clone)]
pub struct ModelRuntimeFake {
    score: Score,
    delay: Option<Duration>,
    slow_on_size: Option<((u32, u32), Duration)>,
    panic_on_size: Option<(u32, u32)>,
}

impl ModelRuntimeFake {
    pub fn with_score(score: f32) -> Self {
        Self {
            score: Score::Fixed(score),
            delay: None,
            slow_on_size: None,
            panic_on_size: None,
        }
    }

    /// Draws a fresh score on every call, so `forward` is not deterministic.
    pub fn random() -> Result<Self, uniform::Error> {
        Ok(Self {
            score: Score::Random(Uniform::new_inclusive(0.0, 1.0)?),
            delay: None,
            slow_on_size: None,
            panic_on_size: None,
        })
    }

    /// Sleeps before every forward pass.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleeps for `delay` only before forward passes on `width`×`height`
    /// images.
    pub fn slow_on_size(mut self, width: u32, height: u32, delay: Duration) -> Self {
        self.slow_on_size = Some(((width, height), delay));
        self
    }

    /// Panics when handed an image of exactly `width`×`height`.
    pub fn panicking_on_size(mut self, width: u32, height: u32) -> Self {
        self.panic_on_size = Some((width, height));
        self
    }
}

impl ModelRuntime for ModelRuntimeFake {
    fn forward(&self, image: &DynamicImage) -> Result<f32, RuntimeError> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let size = (image.width(), image.height());
        if let Some((slow, delay)) = self.slow_on_size {
            if slow == size {
                thread::sleep(delay);
            }
        }
        if self.panic_on_size == Some(size) {
            panic!("fake runtime refuses {}x{} images", image.width(), image.height());
        }

        let score = match &self.score {
            Score::Fixed(score) => *score,
            Score::Random(dist) => dist.sample(&mut rand::rng()),
        };
        debug!(score, "fake forward pass");
        Ok(score)
    }

    fn activations_and_gradient(
        &self,
        _image: &DynamicImage,
    ) -> Result<(ActivationMap, Gradient), RuntimeError> {
        let (center_y, center_x) = (GRID as f32 / 4.0, GRID as f32 * 3.0 / 4.0);
        let activations = Array3::from_shape_fn((GRID, GRID, CHANNELS), |(y, x, c)| {
            let distance = (y as f32 - center_y).hypot(x as f32 - center_x);
            (1.0 - distance / 2.5).max(0.0) * (c + 1) as f32
        });
        let gradient = Array3::from_elem((GRID, GRID, CHANNELS), 0.25);
        Ok((activations, gradient))
    }

    fn spatial_layer_name(&self) -> &str {
        "fake_spatial"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    #[test]
    fn fixed_score_is_returned_as_is() {
        let runtime = ModelRuntimeFake::with_score(0.82);
        assert_eq!(runtime.forward(&image(4, 4)).unwrap(), 0.82);
    }

    #[test]
    fn random_scores_stay_in_unit_interval() {
        let runtime = ModelRuntimeFake::random().unwrap();
        for _ in 0..100 {
            let score = runtime.forward(&image(4, 4)).unwrap();
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn activations_peak_at_the_blob() {
        let runtime = ModelRuntimeFake::with_score(0.5);
        let (activations, gradient) = runtime.activations_and_gradient(&image(4, 4)).unwrap();

        assert_eq!(activations.shape(), gradient.shape());
        assert_eq!(activations[[2, 6, 0]], 1.0);
        assert_eq!(activations[[7, 0, 0]], 0.0);
    }

    #[test]
    #[should_panic]
    fn panics_on_configured_size() {
        let runtime = ModelRuntimeFake::with_score(0.5).panicking_on_size(3, 5);
        let _ = runtime.forward(&image(3, 5));
    }
}
