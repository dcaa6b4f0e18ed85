//! Chest X-ray pneumonia classification with Grad-CAM explanations, batch
//! processing, and history analytics.

pub mod analytics;
pub mod batch;
pub mod classification;
pub mod config;
pub mod diagnoser;
pub mod error;
pub mod heatmap;
pub mod image_codec;
pub mod model_runtime;
pub mod report;
pub mod storage;

#[cfg(test)]
mod test;
