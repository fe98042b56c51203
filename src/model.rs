use crate::{
    config::{Device, EngineConfig},
    error::RestoreError,
    task::Task,
};
use ndarray::Array4;
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};

/// Input name used when the checkpoint does not declare any.
const DEFAULT_INPUT_NAME: &str = "input";

/// A restoration network that maps a `[1, 3, H, W]` tensor to a tensor of the same shape.
pub trait RestorationModel {
    /// The error type that can be returned during inference.
    type Error: std::error::Error + Into<RestoreError> + Send + Sync + 'static;

    /// Runs a single forward pass.
    fn run(&mut self, input: &Array4<f32>) -> Result<Array4<f32>, Self::Error>;
}

/// Makes the weights for a task available for inference.
pub trait ModelLoader: Send + Sync {
    type Model: RestorationModel + Send;

    fn load(&self, task: Task) -> Result<Self::Model, RestoreError>;
}

/// Loads task checkpoints as ONNX Runtime sessions on the configured device.
#[derive(Clone, Debug)]
pub struct OnnxLoader {
    config: EngineConfig,
}

impl OnnxLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

fn load_error(e: impl std::fmt::Display) -> RestoreError {
    RestoreError::ModelLoad(e.to_string())
}

impl ModelLoader for OnnxLoader {
    type Model = OnnxModel;

    fn load(&self, task: Task) -> Result<OnnxModel, RestoreError> {
        let path = self.config.checkpoints.path(task);
        if !path.is_file() {
            return Err(RestoreError::CheckpointNotFound(path.to_path_buf()));
        }

        log::debug!("Loading {} checkpoint from {}", task, path.display());

        let mut builder = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error)?;

        if let Some(threads) = self.config.intra_threads {
            builder = builder.with_intra_threads(threads).map_err(load_error)?;
        }

        if let Device::Cuda(device_id) = self.config.device {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build()])
                .map_err(load_error)?;
        }

        let session = builder.commit_from_file(path).map_err(load_error)?;

        Ok(OnnxModel { task, session })
    }
}

/// A loaded restoration checkpoint.
pub struct OnnxModel {
    task: Task,
    session: Session,
}

fn inference_error(e: impl std::fmt::Display) -> RestoreError {
    RestoreError::Inference(e.to_string())
}

impl RestorationModel for OnnxModel {
    type Error = RestoreError;

    fn run(&mut self, input: &Array4<f32>) -> Result<Array4<f32>, RestoreError> {
        log::debug!("{} forward pass on {:?}", self.task, input.shape());
        let input = input.as_standard_layout().into_owned();

        let input_name = self
            .session
            .inputs
            .first()
            .map_or_else(|| DEFAULT_INPUT_NAME.to_string(), |i| i.name.clone());

        let input_ref = TensorRef::from_array_view(&input).map_err(inference_error)?;

        let outputs = self
            .session
            .run(ort::inputs![input_name.as_str() => input_ref])
            .map_err(inference_error)?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| RestoreError::Tensor("model produced no output".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e: ort::Error| RestoreError::Tensor(e.to_string()))?;

        let &[batch, channels, height, width] = &shape[..] else {
            return Err(RestoreError::Tensor(format!(
                "expected a 4D output tensor, got {}D",
                shape.len()
            )));
        };

        Array4::from_shape_vec(
            (
                batch as usize,
                channels as usize,
                height as usize,
                width as usize,
            ),
            data.to_vec(),
        )
        .map_err(|e| RestoreError::Tensor(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckpointPaths;

    #[test]
    fn missing_checkpoint_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OnnxLoader::new(EngineConfig {
            checkpoints: CheckpointPaths::in_dir(dir.path()),
            ..Default::default()
        });

        let Err(err) = loader.load(Task::Derain) else {
            panic!("loading from an empty directory succeeded");
        };
        match err {
            RestoreError::CheckpointNotFound(path) => {
                assert_eq!(path, dir.path().join("derain.onnx"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Single `Mul` node scaling a `[1, 3, height, width]` input by 0.5.
    const SCALE_HALF_ONNX: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/scale_half.onnx");

    #[test]
    fn onnx_checkpoint_runs_a_forward_pass() {
        let mut checkpoints = CheckpointPaths::default();
        checkpoints.set(Task::Derain, SCALE_HALF_ONNX);
        let loader = OnnxLoader::new(EngineConfig {
            checkpoints,
            intra_threads: Some(1),
            ..Default::default()
        });

        let mut model = loader.load(Task::Derain).unwrap();
        let input = Array4::from_shape_fn((1, 3, 8, 16), |(_, c, y, x)| {
            (c * 128 + y * 16 + x) as f32 / 384.0
        });
        let output = model.run(&input).unwrap();

        assert_eq!(output.dim(), (1, 3, 8, 16));
        for (out, inp) in output.iter().zip(input.iter()) {
            assert!((out - inp * 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn onnx_model_accepts_non_standard_layout() {
        let mut checkpoints = CheckpointPaths::default();
        checkpoints.set(Task::RealDenoise, SCALE_HALF_ONNX);
        let loader = OnnxLoader::new(EngineConfig {
            checkpoints,
            ..Default::default()
        });

        let mut model = loader.load(Task::RealDenoise).unwrap();
        // transposing height and width yields a column-major view
        let base = Array4::from_shape_fn((1, 3, 16, 8), |(_, c, y, x)| (c + y + x) as f32);
        let input = base.permuted_axes([0, 1, 3, 2]);
        let output = model.run(&input).unwrap();

        assert_eq!(output.dim(), (1, 3, 8, 16));
        assert_eq!(output[[0, 2, 5, 11]], input[[0, 2, 5, 11]] * 0.5);
    }

    #[test]
    fn corrupt_checkpoint_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real_denoise.onnx"), b"not a protobuf").unwrap();
        let loader = OnnxLoader::new(EngineConfig {
            checkpoints: CheckpointPaths::in_dir(dir.path()),
            ..Default::default()
        });

        let Err(err) = loader.load(Task::RealDenoise) else {
            panic!("garbage checkpoint was accepted");
        };
        assert!(matches!(err, RestoreError::ModelLoad(_)));
        assert!(!err.is_client_error());
    }
}
