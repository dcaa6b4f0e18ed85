use crate::error::StoreError;
use crate::storage::interface::{check_reference, ArtifactStore, PredictionRecord, RecordStore};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct RecordStoreInMemory {
    records: Mutex<Vec<PredictionRecord>>,
}

impl RecordStoreInMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PredictionRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl RecordStore for RecordStoreInMemory {
    fn append(&self, record: PredictionRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    fn query_all(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[derive(Debug, Default)]
pub struct ArtifactStoreInMemory {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl ArtifactStoreInMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for ArtifactStoreInMemory {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        check_reference(name)?;
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        Ok(name.to_string())
    }

    fn get(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::Label;
    use chrono::{DateTime, Utc};

    fn record(owner: &str) -> PredictionRecord {
        PredictionRecord {
            owner_id: owner.to_string(),
            label: Label::Normal,
            confidence: 90.0,
            image_ref: "x/image_0.png".to_string(),
            heatmap_ref: "x/heatmap_0.png".to_string(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH.fixed_offset(),
        }
    }

    #[test]
    fn query_by_owner_filters() {
        let store = RecordStoreInMemory::new();
        store.append(record("a")).unwrap();
        store.append(record("b")).unwrap();
        store.append(record("a")).unwrap();

        assert_eq!(store.query_all().unwrap().len(), 3);
        assert_eq!(store.query_by_owner("a").unwrap().len(), 2);
        assert!(store.query_by_owner("c").unwrap().is_empty());
    }

    #[test]
    fn artifacts_round_trip_and_miss() {
        let store = ArtifactStoreInMemory::new();
        let reference = store.put("batch/image_0.png", b"png").unwrap();

        assert_eq!(store.get(&reference).unwrap(), b"png");
        assert!(matches!(store.get("batch/other.png"), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.put("../escape.png", b"x"),
            Err(StoreError::InvalidName(_))
        ));
        assert_eq!(store.len(), 1);
    }
}
