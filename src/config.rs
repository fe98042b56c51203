use crate::{error::RestoreError, task::Task};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

/// Directory the checkpoints are read from when nothing else is configured.
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Execution device for the restoration network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
    /// CUDA accelerator with the given device ordinal.
    Cuda(i32),
}

impl Device {
    /// Returns an error when the device cannot be used by this build.
    pub fn ensure_available(&self) -> Result<(), RestoreError> {
        match self {
            Device::Cpu => Ok(()),
            Device::Cuda(_) if cfg!(feature = "cuda") => Ok(()),
            Device::Cuda(id) => Err(RestoreError::UnsupportedDevice(format!(
                "cuda:{id} requested but the `cuda` feature is not enabled"
            ))),
        }
    }
}

impl FromStr for Device {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|id| id.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| RestoreError::UnsupportedDevice(other.to_string())),
        }
    }
}

/// Fixed task -> checkpoint path mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckpointPaths {
    derain: PathBuf,
    gaussian_denoise: PathBuf,
    real_denoise: PathBuf,
}

impl CheckpointPaths {
    /// Uses each task's default file name inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            derain: dir.join(Task::Derain.checkpoint_file_name()),
            gaussian_denoise: dir.join(Task::GaussianDenoise.checkpoint_file_name()),
            real_denoise: dir.join(Task::RealDenoise.checkpoint_file_name()),
        }
    }

    pub fn path(&self, task: Task) -> &Path {
        match task {
            Task::Derain => &self.derain,
            Task::GaussianDenoise => &self.gaussian_denoise,
            Task::RealDenoise => &self.real_denoise,
        }
    }

    pub fn set(&mut self, task: Task, path: impl Into<PathBuf>) {
        let slot = match task {
            Task::Derain => &mut self.derain,
            Task::GaussianDenoise => &mut self.gaussian_denoise,
            Task::RealDenoise => &mut self.real_denoise,
        };
        *slot = path.into();
    }

    /// Tasks whose checkpoint file does not exist on disk.
    pub fn missing(&self) -> Vec<Task> {
        Task::ALL
            .into_iter()
            .filter(|task| !self.path(*task).is_file())
            .collect()
    }
}

impl Default for CheckpointPaths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_MODELS_DIR)
    }
}

/// Configuration of the inference adapter, fixed at construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineConfig {
    pub device: Device,
    pub checkpoints: CheckpointPaths,
    /// Keep loaded models between requests instead of reloading per request.
    pub cache_models: bool,
    /// Number of intra-op threads for the runtime; `None` lets it decide.
    pub intra_threads: Option<usize>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), RestoreError> {
        self.device.ensure_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_checkpoints_live_in_models_dir() {
        let paths = CheckpointPaths::default();
        assert_eq!(paths.path(Task::Derain), Path::new("models/derain.onnx"));
        assert_eq!(
            paths.path(Task::GaussianDenoise),
            Path::new("models/gauss_denoise.onnx")
        );
        assert_eq!(
            paths.path(Task::RealDenoise),
            Path::new("models/real_denoise.onnx")
        );
    }

    #[test]
    fn overrides_replace_a_single_task() {
        let mut paths = CheckpointPaths::in_dir("/opt/weights");
        paths.set(Task::RealDenoise, "/tmp/sidd.onnx");
        assert_eq!(paths.path(Task::RealDenoise), Path::new("/tmp/sidd.onnx"));
        assert_eq!(
            paths.path(Task::Derain),
            Path::new("/opt/weights/derain.onnx")
        );
    }

    #[test]
    fn missing_lists_absent_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("derain.onnx"), b"stub").unwrap();
        let paths = CheckpointPaths::in_dir(dir.path());
        assert_eq!(paths.missing(), vec![Task::GaussianDenoise, Task::RealDenoise]);
    }

    #[test]
    fn parses_devices() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert!("tpu".parse::<Device>().is_err());
        assert!("cuda:x".parse::<Device>().is_err());
    }

    #[test]
    fn cpu_is_always_available() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn cuda_requires_the_feature() {
        let config = EngineConfig {
            device: Device::Cuda(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RestoreError::UnsupportedDevice(_))
        ));
    }
}
