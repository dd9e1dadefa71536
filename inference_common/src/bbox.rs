use serde::{Deserialize, Serialize};

/// Axis-aligned box in absolute pixel coordinates of the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Converts a normalized `(cx, cy, w, h)` box into pixel corners of a
    /// `width` x `height` image.
    pub fn from_normalized_cxcywh(cx: f32, cy: f32, w: f32, h: f32, width: f32, height: f32) -> Self {
        Self {
            xmin: (cx - 0.5 * w) * width,
            ymin: (cy - 0.5 * h) * height,
            xmax: (cx + 0.5 * w) * width,
            ymax: (cy + 0.5 * h) * height,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_normalized_cxcywh() {
        let bbox = Bbox::from_normalized_cxcywh(0.5, 0.5, 0.5, 0.25, 640.0, 480.0);
        assert_eq!(bbox, Bbox::new(160.0, 180.0, 480.0, 300.0));
        assert_eq!(bbox.width(), 320.0);
        assert_eq!(bbox.height(), 120.0);
    }
}
