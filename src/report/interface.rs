use crate::analytics::recent_first;
use crate::classification::Label;
use crate::error::ReportError;
use crate::image_codec::interface::ImageCodec;
use crate::storage::interface::{ArtifactStore, PredictionRecord, RecordStore};
use chrono::{DateTime, FixedOffset};
use image::DynamicImage;
use tracing::warn;

pub const REPORT_TITLE: &str = "PneumoScan – Medical Report";
pub const IMAGE_PLACEHOLDER: &str = "(Unable to load image)";
pub const HEATMAP_PLACEHOLDER: &str = "(Unable to load heatmap)";

const PNEUMONIA_NOTES: [&str; 2] = [
    "Pneumonia detected. Immediate clinical evaluation recommended.",
    "Consider CBC test, Chest CT scan.",
];
const NORMAL_NOTES: [&str; 2] = [
    "No pneumonia detected.",
    "If symptoms persist, consult physician.",
];

#[derive(Debug, Clone)]
pub enum ImageSlot {
    Image(DynamicImage),
    /// Text printed where the image would go.
    Unavailable(&'static str),
}

impl ImageSlot {
    fn load(
        reference: &str,
        artifacts: &dyn ArtifactStore,
        codec: &dyn ImageCodec,
        placeholder: &'static str,
    ) -> Self {
        let loaded = artifacts
            .get(reference)
            .map_err(|e| e.to_string())
            .and_then(|bytes| codec.decode(&bytes).map_err(|e| e.to_string()));
        match loaded {
            Ok(image) => ImageSlot::Image(image),
            Err(reason) => {
                warn!(reference, %reason, "report image unavailable");
                ImageSlot::Unavailable(placeholder)
            }
        }
    }
}

/// The single-page medical report, independent of how it is laid out.
#[derive(Debug, Clone)]
pub struct Report {
    pub generated_at: DateTime<FixedOffset>,
    pub diagnosis: Label,
    pub confidence: f64,
    pub original: ImageSlot,
    pub heatmap: ImageSlot,
}

impl Report {
    /// Never fails: an image that cannot be read or decoded becomes a
    /// placeholder.
    pub fn compose(
        record: &PredictionRecord,
        artifacts: &dyn ArtifactStore,
        codec: &dyn ImageCodec,
        generated_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            generated_at,
            diagnosis: record.label,
            confidence: record.confidence,
            original: ImageSlot::load(&record.image_ref, artifacts, codec, IMAGE_PLACEHOLDER),
            heatmap: ImageSlot::load(&record.heatmap_ref, artifacts, codec, HEATMAP_PLACEHOLDER),
        }
    }

    pub fn title(&self) -> &'static str {
        REPORT_TITLE
    }

    pub fn timestamp_line(&self) -> String {
        format!("Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))
    }

    pub fn diagnosis_line(&self) -> String {
        format!("Diagnosis: {}", self.diagnosis)
    }

    pub fn confidence_line(&self) -> String {
        format!("Confidence: {:.2}%", self.confidence)
    }

    pub fn recommendations(&self) -> [&'static str; 2] {
        match self.diagnosis {
            Label::Pneumonia => PNEUMONIA_NOTES,
            Label::Normal => NORMAL_NOTES,
        }
    }
}

/// Report for the owner's most recent prediction.
pub fn latest_report(
    records: &dyn RecordStore,
    owner_id: &str,
    artifacts: &dyn ArtifactStore,
    codec: &dyn ImageCodec,
    generated_at: DateTime<FixedOffset>,
) -> Result<Report, ReportError> {
    let latest = recent_first(records.query_by_owner(owner_id)?)
        .into_iter()
        .next()
        .ok_or_else(|| ReportError::NoRecords(owner_id.to_string()))?;
    Ok(Report::compose(&latest, artifacts, codec, generated_at))
}

pub trait ReportRenderer {
    fn render(&self, report: &Report) -> Vec<u8>;
}
