extern crate ffmpeg_next as ffmpeg;

pub mod video;

use std::path::Path;

use inference_common::counting::{count_people, PeopleCount};
use inference_common::detection::Detector;

use crate::video::FfmpegVideo;

/// Opens `path` and counts people on `frames_to_process` sampled frames.
///
/// The video is closed before returning, on success and on failure.
pub fn count_people_in_video<D>(
    path: &Path,
    detector: &D,
    frames_to_process: u64,
) -> anyhow::Result<PeopleCount>
where
    D: Detector + ?Sized,
{
    let video = FfmpegVideo::open(path)?;
    log::info!(
        "Opened {path:?}: {}x{}, {} frames",
        video.width(),
        video.height(),
        video.frame_count_estimate()
    );
    count_people(video, detector, frames_to_process)
}
