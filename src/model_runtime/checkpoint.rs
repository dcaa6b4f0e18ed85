use crate::error::ModelError;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{BinFileRecorder, FullPrecisionSettings, PrettyJsonFileRecorder};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// Burn's binary recorder, full precision.
    Binary,
    /// Burn's pretty JSON recorder, full precision.
    Json,
}

impl CheckpointFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "bin" => Some(Self::Binary),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Loads trained weights into `model`, which supplies the architecture.
pub fn load_checkpoint<B, M>(model: M, path: &Path, device: &B::Device) -> Result<M, ModelError>
where
    B: Backend,
    M: Module<B>,
{
    let display = path.display().to_string();

    if !path.is_file() {
        return Err(ModelError::NotFound(display));
    }

    let format = CheckpointFormat::from_path(path)
        .ok_or_else(|| ModelError::UnsupportedFormat(display.clone()))?;

    match format {
        CheckpointFormat::Binary => {
            let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
            model
                .load_file(path.to_path_buf(), &recorder, device)
                .map_err(|e| ModelError::unreadable(&display, e.to_string()))
        }
        CheckpointFormat::Json => {
            let recorder = PrettyJsonFileRecorder::<FullPrecisionSettings>::new();
            model
                .load_file(path.to_path_buf(), &recorder, device)
                .map_err(|e| ModelError::unreadable(&display, e.to_string()))
        }
    }
}

#[cfg(test)]
pub(crate) fn save_checkpoint<B, M>(model: &M, path: &Path)
where
    B: Backend,
    M: Module<B>,
{
    use burn::record::Recorder;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), path.to_path_buf())
        .expect("checkpoint should save");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_runtime::network::{ChestXrayNet, NetworkConfig};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny() -> NetworkConfig {
        NetworkConfig {
            input_size: 8,
            conv_channels: vec![2],
            kernel_size: 3,
            hidden_units: 4,
        }
    }

    #[test]
    fn format_from_path() {
        assert_eq!(
            CheckpointFormat::from_path(Path::new("model.bin")),
            Some(CheckpointFormat::Binary)
        );
        assert_eq!(
            CheckpointFormat::from_path(Path::new("/weights/model.BIN")),
            Some(CheckpointFormat::Binary)
        );
        assert_eq!(
            CheckpointFormat::from_path(Path::new("model.json")),
            Some(CheckpointFormat::Json)
        );
        assert_eq!(CheckpointFormat::from_path(Path::new("model.h5")), None);
        assert_eq!(CheckpointFormat::from_path(Path::new("model")), None);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let device = Default::default();
        let model = ChestXrayNet::<TestBackend>::new(&tiny(), &device);
        let result = load_checkpoint(model, Path::new("/nonexistent/model.bin"), &device);
        assert!(matches!(result, Err(ModelError::NotFound(_))));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.h5");
        std::fs::write(&path, b"HDF").unwrap();

        let device = Default::default();
        let model = ChestXrayNet::<TestBackend>::new(&tiny(), &device);
        let result = load_checkpoint(model, &path, &device);
        assert!(matches!(result, Err(ModelError::UnsupportedFormat(_))));
    }

    #[test]
    fn saved_weights_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let device = Default::default();

        let trained = ChestXrayNet::<TestBackend>::new(&tiny(), &device);
        save_checkpoint::<TestBackend, _>(&trained, &path);

        let fresh = ChestXrayNet::<TestBackend>::new(&tiny(), &device);
        let loaded = load_checkpoint(fresh, &path, &device).unwrap();
        assert!(loaded.check_shapes(&tiny()).is_ok());
    }
}
