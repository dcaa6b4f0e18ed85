use crate::batch::BatchCoordinator;
use crate::config::Config;
use crate::diagnoser::Diagnoser;
use crate::heatmap::engine::HeatmapEngine;
use crate::image_codec::{impl_image_rs::ImageCodecImageRs, interface::ImageCodec};
use crate::model_runtime::{impl_fake::ModelRuntimeFake, interface::ModelRuntime};
use crate::storage::impl_in_memory::{ArtifactStoreInMemory, RecordStoreInMemory};
use image::{Rgb, RgbImage};
use std::sync::{Arc, Mutex};

pub struct Fixture {
    pub config: Config,
    pub codec: Arc<ImageCodecImageRs>,
    pub records: Arc<RecordStoreInMemory>,
    pub artifacts: Arc<ArtifactStoreInMemory>,
    pub coordinator: BatchCoordinator,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_runtime(ModelRuntimeFake::with_score(0.82))
    }

    pub fn with_runtime(runtime: impl ModelRuntime + 'static) -> Self {
        let mut config = Config::default();
        config.heatmap.canvas_size = 32;
        config.utc_offset_minutes = 60;
        config.item_timeout_ms = Some(10_000);

        let codec = Arc::new(ImageCodecImageRs::new());
        let records = Arc::new(RecordStoreInMemory::new());
        let artifacts = Arc::new(ArtifactStoreInMemory::new());
        let diagnoser = Diagnoser::new(
            Arc::new(Mutex::new(runtime)),
            HeatmapEngine::new(config.heatmap.clone()),
        );
        let coordinator = BatchCoordinator::new(
            diagnoser,
            codec.clone(),
            records.clone(),
            artifacts.clone(),
        )
        .with_item_timeout(config.item_timeout())
        .with_timezone(config.timezone());

        Self {
            config,
            codec,
            records,
            artifacts,
            coordinator,
        }
    }
}

/// A PNG-encoded diagonal gradient.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let level = ((x + y) * 255 / (width + height).max(1)) as u8;
        Rgb([level, level, level])
    });
    ImageCodecImageRs::new()
        .encode(&image)
        .expect("fixture image should encode")
}
