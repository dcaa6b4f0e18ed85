use crate::classification::Label;
use crate::error::StoreError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// One persisted classification. Append-only: never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub owner_id: String,
    pub label: Label,
    /// Percentage for the winning label, two decimals.
    pub confidence: f64,
    pub image_ref: String,
    pub heatmap_ref: String,
    pub timestamp: DateTime<FixedOffset>,
}

pub trait RecordStore {
    fn append(&self, record: PredictionRecord) -> Result<(), StoreError>;

    fn query_by_owner(&self, owner_id: &str) -> Result<Vec<PredictionRecord>, StoreError> {
        Ok(self
            .query_all()?
            .into_iter()
            .filter(|record| record.owner_id == owner_id)
            .collect())
    }

    /// Every owner's records. Only for privileged views.
    fn query_all(&self) -> Result<Vec<PredictionRecord>, StoreError>;
}

/// Binary blobs (encoded images) addressed by relative references such as
/// `3f1c…/image_0.png`.
pub trait ArtifactStore {
    /// Stores `bytes` under `name` and returns the reference to read it back.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError>;

    fn get(&self, reference: &str) -> Result<Vec<u8>, StoreError>;
}

/// Accepts only non-empty relative paths made of plain components.
pub fn check_reference(reference: &str) -> Result<&Path, StoreError> {
    let path = Path::new(reference);
    let plain = path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if reference.is_empty() || !plain {
        return Err(StoreError::InvalidName(reference.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_serializes_with_offset_timestamp() {
        let record = PredictionRecord {
            owner_id: "dr-lee".to_string(),
            label: Label::Pneumonia,
            confidence: 82.0,
            image_ref: "b/image_0.png".to_string(),
            heatmap_ref: "b/heatmap_0.png".to_string(),
            timestamp: FixedOffset::east_opt(3600)
                .unwrap()
                .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
                .unwrap(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"label\":\"PNEUMONIA\""));
        assert!(json.contains("2024-01-01T10:00:00+01:00"));

        let back: PredictionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn references_must_be_plain_relative_paths() {
        assert!(check_reference("batch/image_0.png").is_ok());
        assert!(check_reference("").is_err());
        assert!(check_reference("../etc/passwd").is_err());
        assert!(check_reference("/etc/passwd").is_err());
        assert!(check_reference("a/./b").is_ok());
        assert!(check_reference("a/../b").is_err());
    }
}
