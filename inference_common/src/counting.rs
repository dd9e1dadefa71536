//! Drives sampling, detection and annotation over a whole video.

use std::time::Instant;

use anyhow::{bail, Context};
use image::RgbImage;

use crate::annotate::annotate_people;
use crate::detection::Detector;
use crate::frame_meta::FrameMeta;
use crate::sampler::{FrameSource, SampledFrames};

/// Aggregate of all sampled frames of one video.
#[derive(Debug)]
pub struct PeopleCount {
    /// Mean people per sampled frame, rounded half to even.
    pub people: usize,
    pub samples: Vec<FrameMeta>,
    /// Last sampled frame with person outlines drawn on it.
    pub annotated: RgbImage,
    pub total_frames: u64,
}

/// Counts people on `frames_to_process` evenly spaced frames of `source`.
///
/// Fails if the source ends before a single frame was sampled.
pub fn count_people<S, D>(source: S, detector: &D, frames_to_process: u64) -> anyhow::Result<PeopleCount>
where
    S: FrameSource,
    D: Detector + ?Sized,
{
    let total_frames = source.frame_count();
    let mut frames = SampledFrames::new(source, frames_to_process)?;
    log::info!(
        "Sampling every {} frame(s) of {total_frames} reported",
        frames.step()
    );

    let mut samples = Vec::new();
    let mut annotated = None;
    for frame in frames.by_ref() {
        let frame = frame.context("Failed to read video frame")?;
        let mut image = frame.image;

        let start = Instant::now();
        let detections = detector
            .detect(&image)
            .with_context(|| format!("Inference failed on frame {}", frame.index))?;
        let people = annotate_people(&mut image, &detections);
        log::debug!(
            "Frame {}: {} detections, {people} people, {:?}",
            frame.index,
            detections.len(),
            start.elapsed()
        );

        samples.push(FrameMeta {
            index: frame.index,
            people,
            person_bboxes: detections
                .iter()
                .filter(|d| d.is_person())
                .map(|d| d.bbox)
                .collect(),
        });
        annotated = Some(image);
    }

    let Some(annotated) = annotated else {
        bail!(
            "No frames were sampled, video ended after {} of {total_frames} reported frames",
            frames.frames_read()
        );
    };

    let counts: Vec<usize> = samples.iter().map(|s| s.people).collect();
    let people = rounded_mean(&counts);
    log::info!("Counted {people} people on average over {counts:?}");

    Ok(PeopleCount {
        people,
        samples,
        annotated,
        total_frames,
    })
}

/// Nearest-integer mean, ties to even. `counts` must not be empty.
pub fn rounded_mean(counts: &[usize]) -> usize {
    let sum: usize = counts.iter().sum();
    (sum as f64 / counts.len() as f64).round_ties_even() as usize
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::bbox::Bbox;
    use crate::coco_classes::PERSON;
    use crate::detection::Detection;
    use crate::sampler::tests::SyntheticFrames;

    /// Returns the next scripted number of people per call.
    struct ScriptedDetector {
        people: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl ScriptedDetector {
        fn new(mut people: Vec<usize>) -> Self {
            people.reverse();
            Self {
                people: Mutex::new(people),
                fail: false,
            }
        }
    }

    impl Detector for ScriptedDetector {
        fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
            if self.fail {
                bail!("session exploded");
            }
            let n = self.people.lock().unwrap().pop().unwrap_or(0);
            let mut person = vec![0.0; 91];
            person[PERSON] = 0.99;
            let mut cat = vec![0.0; 91];
            cat[17] = 0.99;
            let (w, h) = (image.width() as f32, image.height() as f32);
            let mut detections: Vec<Detection> = (0..n)
                .map(|_| Detection::new(person.clone(), Bbox::new(0.0, 0.0, w - 1.0, h - 1.0)))
                .collect();
            detections.push(Detection::new(cat, Bbox::new(0.0, 0.0, 1.0, 1.0)));
            Ok(detections)
        }
    }

    #[test]
    fn test_rounded_mean() {
        assert_eq!(rounded_mean(&[2, 3, 3]), 3);
        assert_eq!(rounded_mean(&[0, 0, 1]), 0);
        assert_eq!(rounded_mean(&[1, 2]), 2);
        assert_eq!(rounded_mean(&[2, 3]), 2);
        assert_eq!(rounded_mean(&[5]), 5);
    }

    #[test]
    fn test_count_people_averages_samples() {
        let detector = ScriptedDetector::new(vec![2, 3, 3]);
        let count = count_people(SyntheticFrames::new(30), &detector, 3).unwrap();
        assert_eq!(count.people, 3);
        assert_eq!(count.total_frames, 30);
        let indices: Vec<u64> = count.samples.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![10, 20, 30]);
        assert_eq!(count.samples[1].person_bboxes.len(), 3);

        // last sampled frame is frame 30, gray level 30, outlined in red
        assert_eq!(count.annotated.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(count.annotated.get_pixel(3, 3).0, [255, 0, 0]);
    }

    #[test]
    fn test_one_frame_video() {
        let detector = ScriptedDetector::new(vec![4]);
        let count = count_people(SyntheticFrames::new(1), &detector, 3).unwrap();
        assert_eq!(count.samples.len(), 1);
        assert_eq!(count.people, 4);
    }

    #[test]
    fn test_no_sampled_frames_is_an_error() {
        // container claims 30 frames but only 5 decode, step is 10
        let mut source = SyntheticFrames::new(30);
        source.actual = 5;
        let detector = ScriptedDetector::new(vec![1]);
        let err = count_people(source, &detector, 3).unwrap_err();
        assert!(err.to_string().contains("No frames were sampled"));
    }

    #[test]
    fn test_empty_video_is_an_error() {
        let detector = ScriptedDetector::new(vec![]);
        assert!(count_people(SyntheticFrames::new(0), &detector, 3).is_err());
    }

    #[test]
    fn test_huge_frames_to_process() {
        let detector = ScriptedDetector::new(vec![2]);
        let count = count_people(SyntheticFrames::new(1), &detector, 1 << 40).unwrap();
        assert_eq!(count.samples.len(), 1);
        assert_eq!(count.people, 2);
    }

    #[test]
    fn test_inference_failure_propagates() {
        let mut detector = ScriptedDetector::new(vec![1, 1, 1]);
        detector.fail = true;
        let err = count_people(SyntheticFrames::new(9), &detector, 3).unwrap_err();
        assert!(format!("{err:#}").contains("session exploded"));
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut source = SyntheticFrames::new(9);
        source.fail_at = Some(5);
        let detector = ScriptedDetector::new(vec![1, 1, 1]);
        let err = count_people(source, &detector, 3).unwrap_err();
        assert!(format!("{err:#}").contains("corrupt packet"));
    }
}
