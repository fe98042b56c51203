use argh::FromArgs;
use infernum_restore::{
    CheckpointPaths, Device, EngineConfig, OnnxLoader, RestorationEngine, Task,
    config::DEFAULT_MODELS_DIR, server,
};
use std::{path::PathBuf, sync::Arc};

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_BODY_MB: usize = server::DEFAULT_MAX_BODY_BYTES / (1024 * 1024);

#[derive(FromArgs)]
/// Serve image restoration models over HTTP.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// directory holding derain.onnx, gauss_denoise.onnx and real_denoise.onnx
    #[argh(option, default = "PathBuf::from(DEFAULT_MODELS_DIR)")]
    models_dir: PathBuf,

    /// checkpoint for the derain task, overriding the models directory
    #[argh(option)]
    derain_ckpt: Option<PathBuf>,

    /// checkpoint for the gaussian denoise task, overriding the models directory
    #[argh(option)]
    gaussian_denoise_ckpt: Option<PathBuf>,

    /// checkpoint for the real denoise task, overriding the models directory
    #[argh(option)]
    real_denoise_ckpt: Option<PathBuf>,

    /// execution device: cpu, cuda or cuda:<id>
    #[argh(option, default = "Device::Cpu")]
    device: Device,

    /// keep loaded models in memory between requests
    #[argh(switch)]
    cache_models: bool,

    /// number of intra-op threads for inference
    #[argh(option)]
    intra_threads: Option<usize>,

    /// maximum request body size in megabytes
    #[argh(option, default = "DEFAULT_MAX_BODY_MB")]
    max_body_mb: usize,
}

impl ServerArgs {
    fn engine_config(&self) -> EngineConfig {
        let mut checkpoints = CheckpointPaths::in_dir(&self.models_dir);
        let overrides = [
            (Task::Derain, &self.derain_ckpt),
            (Task::GaussianDenoise, &self.gaussian_denoise_ckpt),
            (Task::RealDenoise, &self.real_denoise_ckpt),
        ];
        for (task, path) in overrides {
            if let Some(path) = path {
                checkpoints.set(task, path.clone());
            }
        }

        EngineConfig {
            device: self.device,
            checkpoints,
            cache_models: self.cache_models,
            intra_threads: self.intra_threads,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: ServerArgs = argh::from_env();

    let config = args.engine_config();
    config.validate()?;
    let max_body_bytes = server::body_limit_bytes(args.max_body_mb)?;

    for task in config.checkpoints.missing() {
        log::warn!(
            "No checkpoint for {} at {}; requests for it will fail",
            task,
            config.checkpoints.path(task).display()
        );
    }

    let cache_models = config.cache_models;
    let loader = OnnxLoader::new(config);
    let engine = Arc::new(if cache_models {
        RestorationEngine::with_cache(loader)
    } else {
        RestorationEngine::new(loader)
    });

    let app = server::router(engine, max_body_bytes);

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    log::info!("🚀 Starting the server on {:?}", args.device);
    log::info!("🔥 Listening on: {}", addr);
    log::info!(
        "🧠 Model cache {}",
        if cache_models { "enabled" } else { "disabled" }
    );
    log::info!("🔧 Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
