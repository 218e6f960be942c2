//! Percentage rectangle to pixel crop.

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use super::config::Rect;

/// Pixel-space box relative to the source page. `x1`/`y1` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct PixelBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBox {
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl From<[u32; 4]> for PixelBox {
    fn from(v: [u32; 4]) -> Self {
        Self {
            x0: v[0],
            y0: v[1],
            x1: v[2],
            y1: v[3],
        }
    }
}

impl From<PixelBox> for [u32; 4] {
    fn from(b: PixelBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// A region cut out of a page together with where it came from.
#[derive(Debug, Clone)]
pub struct Crop {
    pub image: DynamicImage,
    pub pixels: PixelBox,
}

/// Compute the pixel box for `rect` grown by `pad` on every side.
///
/// The padded fractions are clamped to `[0, 1]` before scaling, and pixel
/// coordinates are truncated, so the box never leaves the page.
pub fn pixel_box(width: u32, height: u32, rect: &Rect, pad: f64) -> PixelBox {
    let clamp = |v: f64| v.clamp(0.0, 1.0);
    let x0 = clamp(rect.x0 - pad);
    let y0 = clamp(rect.y0 - pad);
    let x1 = clamp(rect.x1 + pad);
    let y1 = clamp(rect.y1 + pad);

    let w = f64::from(width);
    let h = f64::from(height);
    PixelBox {
        x0: ((x0 * w) as u32).min(width),
        y0: ((y0 * h) as u32).min(height),
        x1: ((x1 * w) as u32).min(width),
        y1: ((y1 * h) as u32).min(height),
    }
}

/// Crop `image` to `rect` (fractions) with symmetric `pad`.
///
/// A degenerate rectangle yields a zero-area crop rather than an error.
pub fn extract(image: &DynamicImage, rect: &Rect, pad: f64) -> Crop {
    let (width, height) = image.dimensions();
    let pixels = pixel_box(width, height, rect, pad);
    let cropped = image.crop_imm(pixels.x0, pixels.y0, pixels.width(), pixels.height());
    Crop {
        image: cropped,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn page(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    #[test]
    fn test_pixel_box_truncates() {
        let rect = Rect::new(0.10, 0.32, 0.45, 0.46).unwrap();
        let b = pixel_box(1001, 1001, &rect, 0.0);
        // 0.10 * 1001 = 100.1, 0.45 * 1001 = 450.45
        assert_eq!(b, PixelBox::from([100, 320, 450, 460]));
    }

    #[test]
    fn test_pad_clamped_to_page() {
        let rect = Rect::new(0.01, 0.0, 0.99, 1.0).unwrap();
        let b = pixel_box(200, 100, &rect, 0.05);
        assert_eq!(b, PixelBox::from([0, 0, 200, 100]));
    }

    #[test]
    fn test_extract_dimensions_match_box() {
        let img = page(400, 300);
        let rect = Rect::new(0.25, 0.5, 0.75, 1.0).unwrap();
        let crop = extract(&img, &rect, 0.0);
        assert_eq!(crop.pixels, PixelBox::from([100, 150, 300, 300]));
        assert_eq!(crop.image.width(), 200);
        assert_eq!(crop.image.height(), 150);
    }

    #[test]
    fn test_degenerate_rect_gives_empty_crop() {
        let img = page(10, 10);
        let rect = Rect::fixed(0.5, 0.5, 0.52, 0.52);
        let crop = extract(&img, &rect, 0.0);
        assert!(crop.pixels.is_empty());
    }

    #[test]
    fn test_pixel_box_serializes_as_array() {
        let b = PixelBox::from([1, 2, 3, 4]);
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1,2,3,4]");
    }
}
