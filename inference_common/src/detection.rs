use image::RgbImage;

use crate::bbox::Bbox;
use crate::coco_classes;

/// One detector output: a class distribution and its box.
///
/// `probs` holds one probability per model label, with the "no object"
/// column already removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub probs: Vec<f32>,
    pub bbox: Bbox,
}

impl Detection {
    pub fn new(probs: Vec<f32>, bbox: Bbox) -> Self {
        Self { probs, bbox }
    }

    /// Index of the most probable class. Ties resolve to the lowest index.
    pub fn class_idx(&self) -> usize {
        let mut best = 0;
        for (idx, p) in self.probs.iter().enumerate() {
            if *p > self.probs[best] {
                best = idx;
            }
        }
        best
    }

    pub fn confidence(&self) -> f32 {
        self.probs.iter().copied().fold(0.0, f32::max)
    }

    pub fn is_person(&self) -> bool {
        !self.probs.is_empty() && self.class_idx() == coco_classes::PERSON
    }
}

/// Image in, confidence-filtered detections out.
///
/// Boxes are expressed in the pixel space of the image that was passed in.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<Detection>>;
}

impl<D: Detector + ?Sized> Detector for std::sync::Arc<D> {
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        (**self).detect(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(probs: &[f32]) -> Detection {
        Detection::new(probs.to_vec(), Bbox::new(0.0, 0.0, 1.0, 1.0))
    }

    #[test]
    fn test_class_idx_takes_first_max() {
        assert_eq!(detection(&[0.1, 0.45, 0.45]).class_idx(), 1);
        assert_eq!(detection(&[0.2, 0.2, 0.6]).class_idx(), 2);
    }

    #[test]
    fn test_confidence_and_person() {
        let person = detection(&[0.01, 0.95, 0.04]);
        assert!(person.is_person());
        assert_eq!(person.confidence(), 0.95);

        let dog = detection(&[0.01, 0.04, 0.95]);
        assert!(!dog.is_person());
        assert!(!detection(&[]).is_person());
    }
}
