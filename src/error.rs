use std::time::Duration;

use thiserror::Error;

/// Failures while loading or configuring the classifier. All of these are
/// fatal at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found: {0}")]
    NotFound(String),

    #[error("unsupported model artifact format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read model artifact {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("model artifact incompatible with architecture: expected {expected}, got {actual}")]
    IncompatibleShape { expected: String, actual: String },

    #[error("model has no layer with a spatial (height, width, channels) output")]
    NoSpatialLayer,

    #[error("invalid network architecture: {0}")]
    InvalidArchitecture(String),
}

impl ModelError {
    pub fn unreadable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn incompatible_shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IncompatibleShape {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Failures of a single inference or gradient pass.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("layer {layer} expected {expected} input")]
    LayerInput { layer: String, expected: &'static str },

    #[error("model produced a non-finite score: {0}")]
    NonFiniteScore(f32),

    #[error("no gradient reached layer {0}")]
    MissingGradient(String),

    #[error("tensor conversion failed: {0}")]
    Tensor(String),
}

impl RuntimeError {
    pub fn layer_input(layer: impl Into<String>, expected: &'static str) -> Self {
        Self::LayerInput {
            layer: layer.into(),
            expected,
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed input bytes.
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum HeatmapError {
    #[error("activation map {activations:?} and gradient {gradient:?} differ in shape")]
    ShapeMismatch {
        activations: Vec<usize>,
        gradient: Vec<usize>,
    },

    #[error("activation map is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum DiagnoseError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Heatmap(#[from] HeatmapError),
}

/// Failure of one item inside a batch. Never aborts the batch.
#[derive(Debug, Error)]
pub enum BatchItemError {
    #[error(transparent)]
    Decode(CodecError),

    #[error(transparent)]
    Diagnose(#[from] DiagnoseError),

    #[error("failed to encode artifact: {0}")]
    Encode(CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("item did not finish within {0:?}")]
    Timeout(Duration),

    #[error("worker panicked while processing the item")]
    WorkerPanicked,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record on line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("invalid artifact name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no prediction records for owner {0}")]
    NoRecords(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_messages_carry_context() {
        let err = ModelError::unreadable("weights.bin", "truncated record");
        assert!(err.to_string().contains("weights.bin"));
        assert!(err.to_string().contains("truncated record"));

        let err = ModelError::incompatible_shape("[32, 3, 3, 3]", "[16, 3, 3, 3]");
        assert!(err.to_string().contains("[32, 3, 3, 3]"));
        assert!(err.to_string().contains("[16, 3, 3, 3]"));
    }

    #[test]
    fn batch_item_error_wraps_store_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: BatchItemError = StoreError::from(io).into();
        assert!(matches!(err, BatchItemError::Store(StoreError::Io(_))));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn timeout_names_the_limit() {
        let err = BatchItemError::Timeout(Duration::from_millis(1500));
        assert!(err.to_string().contains("1.5s"));
    }
}
