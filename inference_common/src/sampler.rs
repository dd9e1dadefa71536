use anyhow::bail;
use image::RgbImage;

/// A forward-only source of decoded RGB frames.
pub trait FrameSource {
    /// Total number of frames as reported by the container (may be an estimate).
    fn frame_count(&self) -> u64;

    /// Reads the next frame, `Ok(None)` once the stream is exhausted.
    fn read_frame(&mut self) -> anyhow::Result<Option<RgbImage>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frame_count(&self) -> u64 {
        (**self).frame_count()
    }

    fn read_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        (**self).read_frame()
    }
}

/// Distance between sampled frames, never below 1.
pub fn sample_step(total_frames: u64, frames_to_process: u64) -> u64 {
    (total_frames / frames_to_process).max(1)
}

#[derive(Debug)]
pub struct SampledFrame {
    /// 1-based position of the frame in the video.
    pub index: u64,
    pub image: RgbImage,
}

/// Iterates a [`FrameSource`], yielding every `step`-th frame.
///
/// Stops after the source ends or after the first read error.
pub struct SampledFrames<S> {
    source: S,
    step: u64,
    position: u64,
    done: bool,
}

impl<S: FrameSource> SampledFrames<S> {
    pub fn new(source: S, frames_to_process: u64) -> anyhow::Result<Self> {
        if frames_to_process == 0 {
            bail!("frames_to_process must be positive");
        }
        let step = sample_step(source.frame_count(), frames_to_process);
        Ok(Self {
            source,
            step,
            position: 0,
            done: false,
        })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Number of frames read from the source so far.
    pub fn frames_read(&self) -> u64 {
        self.position
    }
}

impl<S: FrameSource> Iterator for SampledFrames<S> {
    type Item = anyhow::Result<SampledFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.source.read_frame() {
                Ok(Some(image)) => {
                    self.position += 1;
                    if self.position % self.step == 0 {
                        return Some(Ok(SampledFrame {
                            index: self.position,
                            image,
                        }));
                    }
                }
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
