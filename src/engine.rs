use crate::{
    codec::{self, Rgb8Image},
    error::RestoreError,
    model::{ModelLoader, RestorationModel},
    task::Task,
    tensor,
};
use kornia_image::ImageSize;
use ndarray::Array4;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Both image sides must be divisible by the network's downsampling factor.
pub const SIZE_MULTIPLE: usize = 8;

type SharedModel<M> = Arc<Mutex<M>>;

/// Result of a restoration together with timing information.
pub struct RestorationOutput {
    pub task: Task,
    /// Size of the image as submitted, before cropping.
    pub input_size: ImageSize,
    pub image: Rgb8Image,
    pub duration: Duration,
}

/// Runs the restoration pipeline: crop, tensorize, load, infer, detensorize.
///
/// Without a cache every call loads the checkpoint from disk. With a cache the
/// first call per task loads it and later calls reuse it until invalidated.
pub struct RestorationEngine<L: ModelLoader> {
    loader: L,
    cache: Option<Mutex<HashMap<Task, SharedModel<L::Model>>>>,
}

impl<L: ModelLoader> RestorationEngine<L> {
    /// Creates an engine that reloads the model on every request.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: None,
        }
    }

    /// Creates an engine that keeps one loaded model per task.
    pub fn with_cache(loader: L) -> Self {
        Self {
            loader,
            cache: Some(Mutex::new(HashMap::new())),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Restores `image` with the checkpoint of `task`.
    ///
    /// The returned image has the input dimensions rounded down to a multiple of
    /// [`SIZE_MULTIPLE`].
    pub fn restore(&self, task: Task, image: &Rgb8Image) -> Result<RestorationOutput, RestoreError> {
        let start_time = Instant::now();
        let input_size = image.size();

        let cropped = codec::crop_to_multiple(image, SIZE_MULTIPLE)?;
        log::debug!(
            "Cropped {}x{} input to {}x{}",
            input_size.width,
            input_size.height,
            cropped.width(),
            cropped.height()
        );

        let input = tensor::image_to_tensor(&cropped)?;
        let output = self.infer(task, &input)?;

        let (_, _, height, width) = output.dim();
        if (width, height) != (cropped.width(), cropped.height()) {
            return Err(RestoreError::Tensor(format!(
                "model returned {width}x{height} for a {}x{} input",
                cropped.width(),
                cropped.height()
            )));
        }

        let image = tensor::tensor_to_image(output)?;

        Ok(RestorationOutput {
            task,
            input_size,
            image,
            duration: start_time.elapsed(),
        })
    }

    fn infer(&self, task: Task, input: &Array4<f32>) -> Result<Array4<f32>, RestoreError> {
        match &self.cache {
            None => {
                let mut model = self.loader.load(task)?;
                log::debug!("Running {task} inference");
                model.run(input).map_err(Into::into)
            }
            Some(cache) => {
                let model = self.cached_model(cache, task)?;
                let mut model = model.lock().map_err(|_| RestoreError::Poisoned)?;
                log::debug!("Running {task} inference with cached model");
                model.run(input).map_err(Into::into)
            }
        }
    }

    fn cached_model(
        &self,
        cache: &Mutex<HashMap<Task, SharedModel<L::Model>>>,
        task: Task,
    ) -> Result<SharedModel<L::Model>, RestoreError> {
        if let Some(model) = cache
            .lock()
            .map_err(|_| RestoreError::Poisoned)?
            .get(&task)
        {
            return Ok(model.clone());
        }

        // loaded without holding the map so other tasks keep being served
        log::info!("Caching {task} model");
        let loaded = Arc::new(Mutex::new(self.loader.load(task)?));

        let mut cache = cache.lock().map_err(|_| RestoreError::Poisoned)?;
        Ok(cache.entry(task).or_insert(loaded).clone())
    }

    /// Drops the cached model of `task`. Returns whether one was cached.
    pub fn invalidate(&self, task: Task) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match cache.lock() {
            Ok(mut cache) => cache.remove(&task).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(&task).is_some(),
        }
    }

    /// Drops every cached model.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            match cache.lock() {
                Ok(mut cache) => cache.clear(),
                Err(poisoned) => poisoned.into_inner().clear(),
            }
        }
    }

    /// Tasks that currently have a cached model.
    pub fn cached_tasks(&self) -> Vec<Task> {
        let Some(cache) = &self.cache else {
            return Vec::new();
        };
        let cache = match cache.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        Task::ALL
            .into_iter()
            .filter(|task| cache.contains_key(task))
            .collect()
    }
}
