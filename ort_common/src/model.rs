//! Locating ONNX model files.

use std::path::{Path, PathBuf};

use anyhow::Context;

/// ONNX export of `facebook/detr-resnet-50`.
pub const DEFAULT_DETR_REPO: &str = "Xenova/detr-resnet-50";
/// Location of the full precision graph inside hub repositories.
pub const HUB_ONNX_FILE: &str = "onnx/model.onnx";

/// Where a model comes from, parsed from a user supplied string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    File(PathBuf),
    Hub { repo: String },
}

impl ModelSource {
    /// Existing paths and anything ending in `.onnx` are files,
    /// `owner/name` strings are hub repositories.
    pub fn parse(model: &str) -> Self {
        let path = Path::new(model);
        let looks_like_repo = model.split('/').count() == 2 && !model.starts_with('.');
        if path.exists() || model.ends_with(".onnx") || !looks_like_repo {
            Self::File(path.to_path_buf())
        } else {
            Self::Hub {
                repo: model.to_string(),
            }
        }
    }

    /// Returns a local path, downloading into the hub cache if needed.
    pub fn resolve(&self) -> anyhow::Result<PathBuf> {
        match self {
            Self::File(path) => {
                anyhow::ensure!(path.exists(), "Model file {path:?} does not exist");
                Ok(path.clone())
            }
            Self::Hub { repo } => {
                log::info!("Fetching {HUB_ONNX_FILE} from hub repository {repo}");
                let api = hf_hub::api::sync::Api::new()?;
                api.model(repo.clone())
                    .get(HUB_ONNX_FILE)
                    .with_context(|| format!("Failed to fetch {HUB_ONNX_FILE} from {repo}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_source() {
        assert_eq!(
            ModelSource::parse(DEFAULT_DETR_REPO),
            ModelSource::Hub {
                repo: DEFAULT_DETR_REPO.to_string()
            }
        );
        assert_eq!(
            ModelSource::parse("_models/detr-resnet-50.onnx"),
            ModelSource::File(PathBuf::from("_models/detr-resnet-50.onnx"))
        );
        assert_eq!(
            ModelSource::parse("/opt/models/detr/model.onnx"),
            ModelSource::File(PathBuf::from("/opt/models/detr/model.onnx"))
        );
    }

    #[test]
    fn test_missing_file_fails_to_resolve() {
        let source = ModelSource::File(PathBuf::from("does/not/exist.onnx"));
        assert!(source.resolve().is_err());
    }
}
