use crate::classification::ClassificationResult;
use crate::diagnoser::{Diagnoser, Diagnosis};
use crate::error::BatchItemError;
use crate::heatmap::engine::Explanation;
use crate::image_codec::interface::ImageCodec;
use crate::storage::interface::{ArtifactStore, PredictionRecord, RecordStore};
use chrono::{FixedOffset, Offset, Utc};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchSuccess {
    pub result: ClassificationResult,
    pub explanation: Explanation,
    pub record: PredictionRecord,
}

#[derive(Debug)]
pub struct BatchItem {
    /// Position in the input sequence.
    pub index: usize,
    pub outcome: Result<BatchSuccess, BatchItemError>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: Uuid,
    /// One entry per input, in input order.
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &BatchSuccess> {
        self.items.iter().filter_map(|item| item.outcome.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (usize, &BatchItemError)> {
        self.items
            .iter()
            .filter_map(|item| item.outcome.as_ref().err().map(|e| (item.index, e)))
    }
}

pub struct BatchCoordinator {
    diagnoser: Diagnoser,
    codec: Arc<dyn ImageCodec + Send + Sync>,
    records: Arc<dyn RecordStore + Send + Sync>,
    artifacts: Arc<dyn ArtifactStore + Send + Sync>,
    item_timeout: Option<Duration>,
    timezone: FixedOffset,
}

impl BatchCoordinator {
    pub fn new(
        diagnoser: Diagnoser,
        codec: Arc<dyn ImageCodec + Send + Sync>,
        records: Arc<dyn RecordStore + Send + Sync>,
        artifacts: Arc<dyn ArtifactStore + Send + Sync>,
    ) -> Self {
        Self {
            diagnoser,
            codec,
            records,
            artifacts,
            item_timeout: None,
            timezone: Utc.fix(),
        }
    }

    /// Items still running `timeout` after they get hold of the shared
    /// runtime are marked failed. Time spent waiting for the runtime is not
    /// counted. `None` waits for every item.
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Offset record timestamps are written in.
    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    /// Classifies and explains every encoded image for `owner_id`.
    ///
    /// A failing item is reported in place and never stops the batch. Each
    /// successful item stores its two images and appends exactly one record.
    pub fn run_batch(&self, owner_id: &str, images: Vec<Vec<u8>>) -> BatchReport {
        let batch_id = Uuid::new_v4();
        info!(%batch_id, owner = owner_id, items = images.len(), "batch started");

        let items: Vec<BatchItem> = images
            .into_iter()
            .enumerate()
            .map(|(index, bytes)| {
                let outcome = self
                    .process(bytes)
                    .and_then(|diagnosis| self.persist(owner_id, batch_id, index, diagnosis));
                if let Err(e) = &outcome {
                    warn!(%batch_id, index, error = %e, "batch item failed");
                }
                BatchItem { index, outcome }
            })
            .collect();

        let failed = items.iter().filter(|item| item.outcome.is_err()).count();
        info!(%batch_id, succeeded = items.len() - failed, failed, "batch finished");

        BatchReport { batch_id, items }
    }

    /// Runs one item on its own worker; persistence stays on this side.
    fn process(&self, bytes: Vec<u8>) -> Result<Diagnosis, BatchItemError> {
        let (started_sender, started) = mpsc::channel();
        let (done_sender, done) = mpsc::channel();
        let diagnoser = self.diagnoser.clone();
        let codec = self.codec.clone();

        thread::spawn(move || {
            let outcome = codec
                .decode(&bytes)
                .map_err(BatchItemError::Decode)
                .and_then(|image| {
                    let on_acquired = move || {
                        let _ = started_sender.send(());
                    };
                    Ok(diagnoser.diagnose_with(&image, on_acquired)?)
                });
            // The coordinator may have given up on this item already.
            let _ = done_sender.send(outcome);
        });

        // A disconnect here means the worker finished or died without
        // reaching the runtime; `done` tells which.
        let reached_runtime = started.recv().is_ok();

        match self.item_timeout {
            Some(limit) if reached_runtime => done.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => BatchItemError::Timeout(limit),
                RecvTimeoutError::Disconnected => BatchItemError::WorkerPanicked,
            })?,
            _ => done.recv().map_err(|_| BatchItemError::WorkerPanicked)?,
        }
    }

    fn persist(
        &self,
        owner_id: &str,
        batch_id: Uuid,
        index: usize,
        diagnosis: Diagnosis,
    ) -> Result<BatchSuccess, BatchItemError> {
        let image_png = self
            .codec
            .encode(&diagnosis.explanation.canvas)
            .map_err(BatchItemError::Encode)?;
        let heatmap_png = self
            .codec
            .encode(&diagnosis.explanation.overlay)
            .map_err(BatchItemError::Encode)?;

        let image_ref = self
            .artifacts
            .put(&format!("{batch_id}/image_{index}.png"), &image_png)?;
        let heatmap_ref = self
            .artifacts
            .put(&format!("{batch_id}/heatmap_{index}.png"), &heatmap_png)?;

        let record = PredictionRecord {
            owner_id: owner_id.to_string(),
            label: diagnosis.result.label(),
            confidence: diagnosis.result.confidence(),
            image_ref,
            heatmap_ref,
            timestamp: Utc::now().with_timezone(&self.timezone),
        };
        self.records.append(record.clone())?;

        Ok(BatchSuccess {
            result: diagnosis.result,
            explanation: diagnosis.explanation,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::Label;
    use crate::model_runtime::impl_fake::ModelRuntimeFake;
    use crate::test::fixture::{png, Fixture};

    #[test]
    fn failed_item_does_not_stop_the_batch() {
        let f = Fixture::new();
        let images = vec![png(40, 40), b"not an image".to_vec(), png(64, 48)];

        let report = f.coordinator.run_batch("dr-ito", images);

        assert_eq!(report.items.len(), 3);
        let indexes: Vec<usize> = report.items.iter().map(|item| item.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);

        assert!(matches!(
            report.items[1].outcome,
            Err(BatchItemError::Decode(_))
        ));
        for item in [&report.items[0], &report.items[2]] {
            let success = item.outcome.as_ref().unwrap();
            assert_eq!(success.result.label(), Label::Pneumonia);
            assert_eq!(success.explanation.overlay.dimensions(), (32, 32));
        }

        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(report.failed().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
        assert_eq!(f.records.query_all().unwrap().len(), 2);
        assert_eq!(f.artifacts.len(), 4);
    }

    #[test]
    fn records_point_at_stored_artifacts() {
        let f = Fixture::new();
        let report = f.coordinator.run_batch("dr-ito", vec![png(20, 20)]);

        let success = report.succeeded().next().unwrap();
        let record = &success.record;
        assert_eq!(record.owner_id, "dr-ito");
        assert_eq!(record.label, Label::Pneumonia);
        assert_eq!(record.confidence, 82.0);
        assert_eq!(
            record.image_ref,
            format!("{}/image_0.png", report.batch_id)
        );
        assert_eq!(
            record.heatmap_ref,
            format!("{}/heatmap_0.png", report.batch_id)
        );
        assert_eq!(record.timestamp.offset(), &f.config.timezone());

        let stored = f.records.query_by_owner("dr-ito").unwrap();
        assert_eq!(stored, vec![record.clone()]);

        let heatmap = f.codec.decode(&f.artifacts.get(&record.heatmap_ref).unwrap()).unwrap();
        assert_eq!(heatmap.to_rgb8(), success.explanation.overlay);
        let image = f.codec.decode(&f.artifacts.get(&record.image_ref).unwrap()).unwrap();
        assert_eq!(image.to_rgb8(), success.explanation.canvas);
    }

    #[test]
    fn batches_never_share_artifact_names() {
        let f = Fixture::new();
        let first = f.coordinator.run_batch("a", vec![png(8, 8)]);
        let second = f.coordinator.run_batch("a", vec![png(8, 8)]);

        assert_ne!(first.batch_id, second.batch_id);
        assert_eq!(f.artifacts.len(), 4);
    }

    #[test]
    fn slow_item_times_out_without_a_record() {
        let runtime = ModelRuntimeFake::with_score(0.3).with_delay(Duration::from_millis(300));
        let f = Fixture::with_runtime(runtime);
        let coordinator = f.coordinator.with_item_timeout(Some(Duration::from_millis(20)));

        let report = coordinator.run_batch("dr-ito", vec![png(8, 8)]);

        assert!(matches!(
            report.items[0].outcome,
            Err(BatchItemError::Timeout(limit)) if limit == Duration::from_millis(20)
        ));
        assert!(f.records.query_all().unwrap().is_empty());
    }

    #[test]
    fn slow_item_does_not_eat_into_later_budgets() {
        let runtime = ModelRuntimeFake::with_score(0.82).slow_on_size(
            7,
            7,
            Duration::from_millis(800),
        );
        let f = Fixture::with_runtime(runtime);
        let coordinator = f.coordinator.with_item_timeout(Some(Duration::from_millis(200)));

        let report = coordinator.run_batch("dr-ito", vec![png(7, 7), png(9, 9), png(9, 9)]);

        assert!(matches!(
            report.items[0].outcome,
            Err(BatchItemError::Timeout(_))
        ));
        for item in &report.items[1..] {
            let success = item.outcome.as_ref().unwrap();
            assert_eq!(success.result.label(), Label::Pneumonia);
        }
        assert_eq!(f.records.query_all().unwrap().len(), 2);
    }

    #[test]
    fn panicking_worker_is_isolated() {
        let runtime = ModelRuntimeFake::with_score(0.3).panicking_on_size(7, 7);
        let f = Fixture::with_runtime(runtime);

        let report = f.coordinator.run_batch("dr-ito", vec![png(7, 7), png(9, 9)]);

        assert!(matches!(
            report.items[0].outcome,
            Err(BatchItemError::WorkerPanicked)
        ));
        let second = report.items[1].outcome.as_ref().unwrap();
        assert_eq!(second.result.label(), Label::Normal);
        assert_eq!(f.records.query_all().unwrap().len(), 1);
    }

    #[test]
    fn empty_batch_is_empty_report() {
        let f = Fixture::new();
        let report = f.coordinator.run_batch("dr-ito", Vec::new());
        assert!(report.items.is_empty());
        assert!(f.records.query_all().unwrap().is_empty());
    }
}
