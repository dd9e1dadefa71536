use std::path::Path;
use std::sync::Arc;

use inference_common::counting::PeopleCount;
use inference_common::detection::Detector;

/// Turns a video on disk into a people count. Runs on a blocking thread.
pub trait VideoAnalyzer: Send + Sync {
    fn analyze(&self, video: &Path) -> anyhow::Result<PeopleCount>;
}

/// Decodes with ffmpeg and counts with a shared detector.
pub struct PipelineAnalyzer {
    detector: Arc<dyn Detector>,
    frames_to_process: u64,
}

impl PipelineAnalyzer {
    pub fn new(detector: Arc<dyn Detector>, frames_to_process: u64) -> Self {
        Self {
            detector,
            frames_to_process,
        }
    }
}

impl VideoAnalyzer for PipelineAnalyzer {
    fn analyze(&self, video: &Path) -> anyhow::Result<PeopleCount> {
        tracing::info!(
            "Started model inference on {} frames of {video:?}",
            self.frames_to_process
        );
        ffmpeg_ort::count_people_in_video(video, self.detector.as_ref(), self.frames_to_process)
    }
}
