//! Aggregates over prediction history for the dashboard and its charts.
//!
//! Everything here is recomputed from the records handed in; nothing is
//! cached between calls.

use crate::classification::{round_to_hundredths, Label};
use crate::storage::interface::PredictionRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Upper bucket edges for confidence percentages.
pub const DEFAULT_HISTOGRAM_EDGES: [f64; 5] = [20.0, 40.0, 60.0, 80.0, 100.0];

/// Both labels always present, zero when unseen.
pub fn counts_by_label(records: &[PredictionRecord]) -> BTreeMap<Label, usize> {
    let mut counts: BTreeMap<Label, usize> = Label::ALL.iter().map(|&l| (l, 0)).collect();
    for record in records {
        *counts.entry(record.label).or_default() += 1;
    }
    counts
}

/// Records per calendar day (`YYYY-MM-DD`), taken in each timestamp's own
/// offset.
pub fn daily_counts(records: &[PredictionRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        let day = record.timestamp.date_naive().format("%Y-%m-%d").to_string();
        *counts.entry(day).or_default() += 1;
    }
    counts
}

/// Index of the first bucket whose upper edge is at least `value`. Values
/// past the last edge, and NaN, land in the last bucket.
pub fn bucket_index(value: f64, edges: &[f64]) -> usize {
    edges
        .iter()
        .position(|&edge| value <= edge)
        .unwrap_or(edges.len().saturating_sub(1))
}

pub fn confidence_histogram(records: &[PredictionRecord], edges: &[f64]) -> Vec<usize> {
    let mut buckets = vec![0; edges.len()];
    if edges.is_empty() {
        return buckets;
    }
    for record in records {
        buckets[bucket_index(record.confidence, edges)] += 1;
    }
    buckets
}

/// Share of NORMAL records as a percentage, two decimals; 0 with no records.
pub fn healthy_percent(records: &[PredictionRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let normal = records.iter().filter(|r| r.label == Label::Normal).count();
    round_to_hundredths(normal as f64 / records.len() as f64 * 100.0)
}

/// Newest first; records with equal timestamps keep their stored order.
pub fn recent_first(mut records: Vec<PredictionRecord>) -> Vec<PredictionRecord> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

/// Bucket captions such as `"0-20"` for the given upper edges.
pub fn bucket_labels(edges: &[f64]) -> Vec<String> {
    let mut lower = 0.0;
    edges
        .iter()
        .map(|&upper| {
            let label = format!("{lower}-{upper}");
            lower = upper;
            label
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub total: usize,
    pub counts: BTreeMap<Label, usize>,
    pub daily: BTreeMap<String, usize>,
    pub histogram: Vec<usize>,
    pub histogram_labels: Vec<String>,
    pub healthy_percent: f64,
}

impl AnalyticsSnapshot {
    pub fn compute(records: &[PredictionRecord], edges: &[f64]) -> Self {
        Self {
            total: records.len(),
            counts: counts_by_label(records),
            daily: daily_counts(records),
            histogram: confidence_histogram(records, edges),
            histogram_labels: bucket_labels(edges),
            healthy_percent: healthy_percent(records),
        }
    }

    pub fn chart_data(&self) -> ChartData {
        let pie = Series {
            labels: Label::ALL.iter().map(|l| display_name(*l).to_string()).collect(),
            data: Label::ALL
                .iter()
                .map(|l| self.counts.get(l).copied().unwrap_or(0))
                .collect(),
        };
        let line = Series {
            labels: self.daily.keys().cloned().collect(),
            data: self.daily.values().copied().collect(),
        };
        let bar = Series {
            labels: self.histogram_labels.clone(),
            data: self.histogram.clone(),
        };
        ChartData { pie, line, bar }
    }
}

fn display_name(label: Label) -> &'static str {
    match label {
        Label::Normal => "Normal",
        Label::Pneumonia => "Pneumonia",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub data: Vec<usize>,
}

/// Chart payloads: label split (pie), records per day (line) and confidence
/// distribution (bar).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub pie: Series,
    pub line: Series,
    pub bar: Series,
}
