//! QA overlays: region outlines drawn on a copy of the page.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as DrawRect;

use super::extract::PixelBox;

/// Outline thickness in pixels.
pub const OUTLINE_WIDTH: u32 = 4;

const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Copy of `page` with every box outlined, growing inwards.
pub fn draw_boxes(page: &DynamicImage, boxes: &[PixelBox]) -> RgbImage {
    let mut canvas = page.to_rgb8();
    for b in boxes {
        for t in 0..OUTLINE_WIDTH {
            let (w, h) = (b.width(), b.height());
            if w <= 2 * t || h <= 2 * t {
                break;
            }
            let rect =
                DrawRect::at((b.x0 + t) as i32, (b.y0 + t) as i32).of_size(w - 2 * t, h - 2 * t);
            draw_hollow_rect_mut(&mut canvas, rect, OUTLINE_COLOR);
        }
    }
    canvas
}
