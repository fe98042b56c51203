use crate::error::RestoreError;
use std::{fmt, str::FromStr};

/// The restoration goal of a request. Each task maps to its own checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Task {
    Derain,
    GaussianDenoise,
    RealDenoise,
}

impl Task {
    /// Every supported task, in the order they are listed by the index route.
    pub const ALL: [Task; 3] = [Task::Derain, Task::GaussianDenoise, Task::RealDenoise];

    /// Canonical task name, as accepted in JSON routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Derain => "derain",
            Task::GaussianDenoise => "gaussian_denoise",
            Task::RealDenoise => "real_denoise",
        }
    }

    /// URL slug of the upload route for this task.
    pub fn slug(&self) -> &'static str {
        match self {
            Task::Derain => "derain",
            Task::GaussianDenoise => "gaussian-denoise",
            Task::RealDenoise => "real-denoise",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Task::Derain => "Remove rain from image",
            Task::GaussianDenoise => "Remove Gaussian noise from image",
            Task::RealDenoise => "Remove real noise from image",
        }
    }

    /// File name of the checkpoint inside the models directory.
    pub fn checkpoint_file_name(&self) -> &'static str {
        match self {
            Task::Derain => "derain.onnx",
            Task::GaussianDenoise => "gauss_denoise.onnx",
            Task::RealDenoise => "real_denoise.onnx",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = RestoreError;

    // Accepts the canonical name or the route slug of a task.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL
            .into_iter()
            .find(|task| task.as_str() == s || task.slug() == s)
            .ok_or_else(|| RestoreError::UnsupportedTask(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_names() {
        assert_eq!("derain".parse::<Task>().unwrap(), Task::Derain);
        assert_eq!(
            "gaussian_denoise".parse::<Task>().unwrap(),
            Task::GaussianDenoise
        );
        assert_eq!("real_denoise".parse::<Task>().unwrap(), Task::RealDenoise);
    }

    #[test]
    fn parses_route_slugs() {
        assert_eq!(
            "gaussian-denoise".parse::<Task>().unwrap(),
            Task::GaussianDenoise
        );
        assert_eq!("real-denoise".parse::<Task>().unwrap(), Task::RealDenoise);
    }

    #[test]
    fn rejects_unknown_tasks() {
        for name in ["", "deblur", "Derain", "gaussian denoise", "real_denoise "] {
            let err = name.parse::<Task>().unwrap_err();
            assert!(err.is_client_error(), "{name:?} should be a client error");
        }
    }

    #[test]
    fn display_uses_canonical_name() {
        assert_eq!(Task::GaussianDenoise.to_string(), "gaussian_denoise");
    }
}
