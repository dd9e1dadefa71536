//! Upload validation and temporary storage.

use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use uuid::Uuid;

pub const FILE_FIELD: &str = "file";
pub const VIDEO_EXTENSION: &str = ".mp4";

/// Reasons an upload is refused before any processing happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRejection {
    MissingFile,
    EmptyFilename,
    NotVideo,
    TooLarge,
}

impl UploadRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingFile => "No file part",
            Self::EmptyFilename => "No video selected for uploading",
            Self::NotVideo => "File is not video",
            Self::TooLarge => "File is too large",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for UploadRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Checks the client supplied filename of the `file` part.
///
/// A part without any filename is a plain form field, not a file.
pub fn validate_filename(filename: Option<&str>) -> Result<(), UploadRejection> {
    match filename {
        None => Err(UploadRejection::MissingFile),
        Some("") => Err(UploadRejection::EmptyFilename),
        Some(name) if !name.ends_with(VIDEO_EXTENSION) => Err(UploadRejection::NotVideo),
        Some(_) => Ok(()),
    }
}

/// A file in the upload directory that is removed on drop.
///
/// The name is generated, the client filename never reaches the filesystem.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn new(upload_dir: &Path) -> Self {
        Self {
            path: upload_dir.join(format!("{}{VIDEO_EXTENSION}", Uuid::new_v4())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temporary upload {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove temporary upload {:?}: {e}", self.path),
        }
    }
}
