//! Bounding boxes produced by the detector

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{imageops, RgbImage};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An axis aligned rectangle in image pixel coordinates.
///
/// The origin is the top left corner of the box, x increasing to the right and y downwards.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Centre of the box in pixels.
    pub fn centroid(&self) -> Point2<f64> {
        Point2::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Area of the box in square pixels.
    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    /// Copy out the part of the image covered by this box.
    ///
    /// The box is clipped to the image bounds. `None` is returned if nothing of the box lies
    /// inside the image.
    pub fn region(&self, image: &RgbImage) -> Option<RgbImage> {
        if self.x >= image.width() || self.y >= image.height() {
            return None;
        }

        let width = self.width.min(image.width() - self.x);
        let height = self.height.min(image.height() - self.y);

        if width == 0 || height == 0 {
            return None;
        }

        Some(imageops::crop_imm(image, self.x, self.y, width, height).to_image())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_geometry() {
        let b = BoundingBox::new(10, 20, 30, 40);
        assert_eq!(b.centroid(), Point2::new(25.0, 40.0));
        assert_eq!(b.area(), 1200.0);

        let odd = BoundingBox::new(0, 0, 15, 15);
        assert_eq!(odd.centroid(), Point2::new(7.5, 7.5));
        assert_eq!(odd.area(), 225.0);
    }

    #[test]
    fn test_region_clipping() {
        let img = RgbImage::from_pixel(100, 50, image::Rgb([1, 2, 3]));

        let inside = BoundingBox::new(10, 10, 20, 20).region(&img).unwrap();
        assert_eq!(inside.dimensions(), (20, 20));

        let overhanging = BoundingBox::new(90, 40, 20, 20).region(&img).unwrap();
        assert_eq!(overhanging.dimensions(), (10, 10));
        assert_eq!(overhanging.get_pixel(0, 0), &image::Rgb([1, 2, 3]));

        assert!(BoundingBox::new(100, 0, 5, 5).region(&img).is_none());
        assert!(BoundingBox::new(0, 0, 0, 5).region(&img).is_none());
    }
}
