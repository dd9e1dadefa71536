use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::counting::PeopleCount;
use crate::frame_meta::FrameMeta;

/// Metadata corresponding to a processed video.
#[derive(Debug, Deserialize, Serialize)]
pub struct VideoMeta {
    /// Path to original input video file.
    pub input_file: PathBuf,
    pub width: u32,
    pub height: u32,
    pub total_frames: u64,
    pub frames_to_process: u64,
    /// Rounded mean of people over all sampled frames.
    pub people: usize,
    /// Optional path to the annotated image of the last sampled frame.
    pub output_file: Option<PathBuf>,
    pub frames: Vec<FrameMeta>,
}

impl VideoMeta {
    pub fn new(
        input_file: PathBuf,
        output_file: Option<PathBuf>,
        frames_to_process: u64,
        count: &PeopleCount,
    ) -> Self {
        Self {
            input_file,
            width: count.annotated.width(),
            height: count.annotated.height(),
            total_frames: count.total_frames,
            frames_to_process,
            people: count.people,
            output_file,
            frames: count.samples.clone(),
        }
    }

    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create report file {path:?}"))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
