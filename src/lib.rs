//! Image restoration (derain, Gaussian denoise, real denoise) served over HTTP.
//!
//! The pipeline for one request is linear:
//! decode -> crop to a multiple of 8 -> tensorize -> load model -> infer ->
//! detensorize -> encode.
//!
//! The restoration network is an ONNX checkpoint per [`Task`], loaded through a
//! [`ModelLoader`] and executed by a [`RestorationModel`]. [`RestorationEngine`]
//! drives the pipeline and optionally caches loaded models; [`server::router`]
//! exposes it over HTTP.

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod messages;
pub mod model;
pub mod server;
pub mod task;
pub mod tensor;

pub use codec::Rgb8Image;
pub use config::{CheckpointPaths, Device, EngineConfig};
pub use engine::{RestorationEngine, RestorationOutput, SIZE_MULTIPLE};
pub use error::{ErrorKind, RestoreError};
pub use model::{ModelLoader, OnnxLoader, OnnxModel, RestorationModel};
pub use task::Task;
