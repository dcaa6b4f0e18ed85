use crate::analytics::DEFAULT_HISTOGRAM_EDGES;
use crate::error::ConfigError;
use crate::heatmap::engine::HeatmapConfig;
use crate::model_runtime::preprocess::PixelScaling;
use crate::model_runtime::network::NetworkConfig;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_path: PathBuf,
    pub network: NetworkConfig,
    pub pixel_scaling: PixelScaling,
    pub heatmap: HeatmapConfig,
    pub histogram_edges: Vec<f64>,
    /// Per-item budget inside a batch. `None` waits indefinitely.
    pub item_timeout_ms: Option<u64>,
    pub records_path: PathBuf,
    pub artifacts_dir: PathBuf,
    pub utc_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/classifier.bin"),
            network: NetworkConfig::default(),
            pixel_scaling: PixelScaling::default(),
            heatmap: HeatmapConfig::default(),
            histogram_edges: DEFAULT_HISTOGRAM_EDGES.to_vec(),
            item_timeout_ms: Some(30_000),
            records_path: PathBuf::from("data/predictions.jsonl"),
            artifacts_dir: PathBuf::from("data/uploads"),
            utc_offset_minutes: 0,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let heatmap = &self.heatmap;
        for (name, weight) in [
            ("original_weight", heatmap.original_weight),
            ("heatmap_weight", heatmap.heatmap_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::Invalid(format!(
                    "heatmap.{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        if heatmap.canvas_size == 0 {
            return Err(ConfigError::Invalid("heatmap.canvas_size must be > 0".into()));
        }
        if self.network.input_size == 0 {
            return Err(ConfigError::Invalid("network.input_size must be > 0".into()));
        }

        let edges = &self.histogram_edges;
        if edges.is_empty() {
            return Err(ConfigError::Invalid("histogram_edges must not be empty".into()));
        }
        if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::Invalid(
                "histogram_edges must be strictly ascending".into(),
            ));
        }
        if edges.last().copied() != Some(100.0) {
            return Err(ConfigError::Invalid("histogram_edges must end at 100".into()));
        }

        if FixedOffset::east_opt(self.utc_offset_minutes * 60).is_none() {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    /// Offset used to stamp new prediction records.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }
}
