use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "PEOPLE_COUNTER";

const DEFAULT_BIND: &str = "0.0.0.0:5000";
const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
const DEFAULT_RESULTS_DIR: &str = "static/results";
const DEFAULT_FRAMES_TO_PROCESS: i64 = 3;

/// Service configuration: defaults, then an optional file, then
/// `PEOPLE_COUNTER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind: String,
    /// Path to a DETR onnx file, or a hub repository id.
    pub model: String,
    pub cuda: bool,
    pub frames_to_process: u64,
    /// Request body limit for uploads, unlimited when unset.
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,
    pub upload_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .set_default("bind", DEFAULT_BIND)?
            .set_default("model", ort_common::model::DEFAULT_DETR_REPO)?
            .set_default("cuda", false)?
            .set_default("frames_to_process", DEFAULT_FRAMES_TO_PROCESS)?
            .set_default("upload_dir", DEFAULT_UPLOAD_DIR)?
            .set_default("results_dir", DEFAULT_RESULTS_DIR)?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings = builder
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .context("Failed to load configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.frames_to_process > 0, "frames_to_process must be positive");
        ensure!(
            self.max_upload_bytes != Some(0),
            "max_upload_bytes must be positive when set"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.frames_to_process, 3);
        assert_eq!(settings.max_upload_bytes, None);
        assert_eq!(settings.upload_dir, PathBuf::from(DEFAULT_UPLOAD_DIR));
        assert_eq!(settings.results_dir, PathBuf::from(DEFAULT_RESULTS_DIR));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "frames_to_process = 10\nmax_upload_bytes = 1048576\nresults_dir = \"/tmp/results\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.frames_to_process, 10);
        assert_eq!(settings.max_upload_bytes, Some(1_048_576));
        assert_eq!(settings.results_dir, PathBuf::from("/tmp/results"));
        assert_eq!(settings.bind, DEFAULT_BIND);
    }

    #[test]
    fn test_zero_frames_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "frames_to_process = 0").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }
}
