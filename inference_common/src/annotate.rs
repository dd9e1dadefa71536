//! Overlays person boxes onto frames.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::bbox::Bbox;
use crate::detection::Detection;

pub const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const OUTLINE_WIDTH: i32 = 3;

/// Draws an outline around every person detection and returns how many were drawn.
pub fn annotate_people(image: &mut RgbImage, detections: &[Detection]) -> usize {
    let mut counter = 0;
    for detection in detections.iter().filter(|d| d.is_person()) {
        draw_outline(image, &detection.bbox);
        counter += 1;
    }
    counter
}

/// Outline grows inward from the box edges, corners inclusive.
fn draw_outline(image: &mut RgbImage, bbox: &Bbox) {
    let x0 = bbox.xmin.round() as i32;
    let y0 = bbox.ymin.round() as i32;
    let x1 = bbox.xmax.round() as i32;
    let y1 = bbox.ymax.round() as i32;

    for inset in 0..OUTLINE_WIDTH {
        let width = x1 - x0 + 1 - 2 * inset;
        let height = y1 - y0 + 1 - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(x0 + inset, y0 + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, OUTLINE_COLOR);
    }
}
