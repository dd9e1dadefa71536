//! DETR object detection on top of an `ort` session.
//!
//! Pre- and postprocessing follow the Hugging Face DETR feature extractor:
//! shortest edge resized to 800 px (longest capped at 1333 px), ImageNet
//! normalization, softmax over the class logits without the trailing
//! "no object" column, normalized `cx, cy, w, h` boxes rescaled to the
//! original image size.

use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, anyhow, ensure};
use image::RgbImage;
use image::imageops::{self, FilterType};
use inference_common::bbox::Bbox;
use inference_common::coco_classes;
use inference_common::detection::{Detection, Detector};
use ndarray::{Array3, Array4, ArrayView2};
use ort::session::Session;
use ort::value::Tensor;

use crate::model::ModelSource;
use crate::session::load_session;

/// Minimum class probability for a query to be kept.
pub const CONFIDENCE_THRESHOLD: f32 = 0.9;

const SHORTEST_EDGE: u32 = 800;
const LONGEST_EDGE: u32 = 1333;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

const PIXEL_VALUES: &str = "pixel_values";
const PIXEL_MASK: &str = "pixel_mask";
const LOGITS: &str = "logits";
const PRED_BOXES: &str = "pred_boxes";

pub struct DetrDetector {
    session: Mutex<Session>,
    wants_pixel_mask: bool,
}

impl DetrDetector {
    /// Loads a DETR graph from a file path or hub repository id.
    pub fn load(model: &str, cuda: bool) -> anyhow::Result<Self> {
        let path = ModelSource::parse(model).resolve()?;
        let session = load_session(&path, cuda)
            .with_context(|| format!("Failed to load DETR model from {path:?}"))?;
        Ok(Self::from_session(session))
    }

    pub fn from_session(session: Session) -> Self {
        let wants_pixel_mask = session.inputs.iter().any(|input| input.name == PIXEL_MASK);
        log::debug!("DETR model expects pixel mask: {wants_pixel_mask}");
        Self {
            session: Mutex::new(session),
            wants_pixel_mask,
        }
    }
}

impl Detector for DetrDetector {
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        ensure!(
            image.width() > 0 && image.height() > 0,
            "Cannot run detection on an empty image"
        );

        let start = Instant::now();
        let input = preprocess(image);
        let (_, _, height, width) = input.dim();
        let pixel_values = Tensor::from_array(input)?;
        let preprocess_time = start.elapsed();

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("DETR session lock poisoned"))?;
        let start = Instant::now();
        let outputs = if self.wants_pixel_mask {
            let pixel_mask = Tensor::from_array(Array3::<i64>::ones((1, height, width)))?;
            session.run(ort::inputs![PIXEL_VALUES => pixel_values, PIXEL_MASK => pixel_mask])?
        } else {
            session.run(ort::inputs![PIXEL_VALUES => pixel_values])?
        };
        let inference_time = start.elapsed();

        let (logits_shape, logits) = outputs[LOGITS].try_extract_tensor::<f32>()?;
        let (boxes_shape, boxes) = outputs[PRED_BOXES].try_extract_tensor::<f32>()?;
        ensure!(
            logits_shape.len() == 3 && boxes_shape.len() == 3 && boxes_shape[2] == 4,
            "Unexpected DETR output shapes: logits {logits_shape:?}, boxes {boxes_shape:?}"
        );
        let queries = logits_shape[1] as usize;
        let classes = logits_shape[2] as usize;
        let logits = ArrayView2::from_shape((queries, classes), logits)?;
        let boxes = ArrayView2::from_shape((queries, 4), boxes)?;

        let detections = postprocess(
            logits,
            boxes,
            image.width(),
            image.height(),
            CONFIDENCE_THRESHOLD,
        );
        log::debug!(
            "DETR kept {} of {queries} queries, preprocess {preprocess_time:?}, inference {inference_time:?}",
            detections.len()
        );
        for detection in &detections {
            log::trace!(
                "{} {:.3} at ({:.0}, {:.0}) {:.0}x{:.0}",
                coco_classes::name(detection.class_idx()),
                detection.confidence(),
                detection.bbox.xmin,
                detection.bbox.ymin,
                detection.bbox.width(),
                detection.bbox.height()
            );
        }
        Ok(detections)
    }
}

/// Target `(width, height)` for the model input, preserving aspect ratio.
pub fn resize_dims(width: u32, height: u32) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    let (min_side, max_side) = (w.min(h), w.max(h));
    let mut size = SHORTEST_EDGE as f64;
    if max_side / min_side * size > LONGEST_EDGE as f64 {
        size = (LONGEST_EDGE as f64 * min_side / max_side).round_ties_even();
    }
    if width <= height {
        (size as u32, (size * h / w) as u32)
    } else {
        ((size * w / h) as u32, size as u32)
    }
}

/// Resized, normalized NCHW tensor data.
pub fn preprocess(image: &RgbImage) -> Array4<f32> {
    let (width, height) = resize_dims(image.width(), image.height());
    let resized = imageops::resize(image, width, height, FilterType::Triangle);

    let mut input = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    input
}

/// Turns raw `[queries, classes + 1]` logits and `[queries, 4]` boxes into
/// detections above `threshold`, with boxes in `width` x `height` pixels.
pub fn postprocess(
    logits: ArrayView2<f32>,
    boxes: ArrayView2<f32>,
    width: u32,
    height: u32,
    threshold: f32,
) -> Vec<Detection> {
    logits
        .outer_iter()
        .zip(boxes.outer_iter())
        .filter_map(|(row, cxcywh)| {
            let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
            let exp: Vec<f32> = row.iter().map(|v| (v - max).exp()).collect();
            let sum: f32 = exp.iter().sum();
            let mut probs: Vec<f32> = exp.iter().map(|e| e / sum).collect();
            // no-object
            probs.pop();

            let bbox = Bbox::from_normalized_cxcywh(
                cxcywh[0],
                cxcywh[1],
                cxcywh[2],
                cxcywh[3],
                width as f32,
                height as f32,
            );
            let detection = Detection::new(probs, bbox);
            (detection.confidence() > threshold).then_some(detection)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::array;

    #[test]
    fn test_resize_dims() {
        assert_eq!(resize_dims(640, 480), (1066, 800));
        assert_eq!(resize_dims(1280, 720), (1333, 750));
        assert_eq!(resize_dims(720, 1280), (750, 1333));
        assert_eq!(resize_dims(800, 800), (800, 800));
    }

    #[test]
    fn test_preprocess_normalizes() {
        let image = RgbImage::from_pixel(80, 60, Rgb([255, 0, 128]));
        let input = preprocess(&image);
        assert_eq!(input.dim(), (1, 3, 800, 1066));

        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((input[[0, 0, 400, 500]] - red).abs() < 1e-4);
        assert!((input[[0, 1, 10, 10]] - green).abs() < 1e-4);
    }

    #[test]
    fn test_postprocess_thresholds_and_rescales() {
        // 3 classes + no-object
        let logits = array![
            [0.0, 10.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 10.0],
            [0.0, 2.0, 2.1, 0.0],
        ];
        let boxes = array![
            [0.5, 0.5, 0.2, 0.4],
            [0.5, 0.5, 1.0, 1.0],
            [0.25, 0.25, 0.5, 0.5],
        ];

        let detections = postprocess(logits.view(), boxes.view(), 100, 50, CONFIDENCE_THRESHOLD);
        assert_eq!(detections.len(), 1);

        let person = &detections[0];
        assert_eq!(person.probs.len(), 3);
        assert_eq!(person.class_idx(), 1);
        assert!(person.confidence() > 0.99);
        assert!((person.bbox.xmin - 40.0).abs() < 1e-3);
        assert!((person.bbox.ymin - 15.0).abs() < 1e-3);
        assert!((person.bbox.xmax - 60.0).abs() < 1e-3);
        assert!((person.bbox.ymax - 35.0).abs() < 1e-3);
    }
}
