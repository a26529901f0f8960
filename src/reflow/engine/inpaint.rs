use image::imageops::{self, GaussianBlurParameters};
use image::RgbaImage;
use serde::Deserialize;

use crate::reflow::{BBoxPx, BoundingBox};

use super::geom::clamp_region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EraseConfig {
    pub margin: u32,
    /// Kernel reach in pixels on each side; 0 disables the blur.
    pub blur_radius: u32,
}

impl Default for EraseConfig {
    fn default() -> Self {
        Self {
            margin: 2,
            blur_radius: 5,
        }
    }
}

/// Smears the pixels under `bbox` by blurring the region in place.
///
/// This is not a content-aware fill; it relies on the background behind text
/// being low frequency. Returns the region that was rewritten, or `None` when
/// the box does not intersect the image.
pub fn erase(image: &mut RgbaImage, bbox: &BoundingBox, config: &EraseConfig) -> Option<BBoxPx> {
    let (width, height) = image.dimensions();
    let region = clamp_region(bbox, config.margin, width, height)?;
    let crop = imageops::crop_imm(image, region.x, region.y, region.w, region.h).to_image();
    let blurred = if config.blur_radius > 0 {
        imageops::blur_advanced(
            &crop,
            GaussianBlurParameters::new_from_radius(config.blur_radius as f32),
        )
    } else {
        crop
    };
    imageops::replace(image, &blurred, i64::from(region.x), i64::from(region.y));
    Some(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn canvas_with_glyph() -> RgbaImage {
        let mut image = RgbaImage::from_pixel(40, 40, WHITE);
        for y in 18..22 {
            for x in 18..22 {
                image.put_pixel(x, y, BLACK);
            }
        }
        image.put_pixel(2, 2, BLACK);
        image
    }

    #[test]
    fn erase_lightens_dark_glyph_on_light_background() {
        let mut image = canvas_with_glyph();
        let region = erase(
            &mut image,
            &BoundingBox::new(10, 10, 30, 30),
            &EraseConfig::default(),
        )
        .expect("region");
        assert_eq!(
            region,
            BBoxPx {
                x: 8,
                y: 8,
                w: 24,
                h: 24
            }
        );
        assert!(image.get_pixel(20, 20)[0] > 100);
    }

    #[test]
    fn blur_reaches_no_further_than_its_radius() {
        let mut image = RgbaImage::from_fn(40, 40, |x, _| if x < 20 { BLACK } else { WHITE });
        erase(
            &mut image,
            &BoundingBox::new(0, 0, 40, 40),
            &EraseConfig {
                margin: 0,
                blur_radius: 5,
            },
        );
        assert!(image.get_pixel(20, 20)[0] < 200);
        assert!(image.get_pixel(28, 20)[0] >= 250);
    }

    #[test]
    fn erase_leaves_pixels_outside_region() {
        let mut image = canvas_with_glyph();
        erase(
            &mut image,
            &BoundingBox::new(10, 10, 30, 30),
            &EraseConfig::default(),
        );
        assert_eq!(*image.get_pixel(2, 2), BLACK);
        assert_eq!(*image.get_pixel(39, 39), WHITE);
    }

    #[test]
    fn erase_clamps_to_image_edges() {
        let mut image = canvas_with_glyph();
        let region = erase(
            &mut image,
            &BoundingBox::new(30, 30, 60, 60),
            &EraseConfig {
                margin: 0,
                blur_radius: 10,
            },
        )
        .expect("region");
        assert_eq!(region.x + region.w, 40);
        assert_eq!(region.y + region.h, 40);
    }

    #[test]
    fn erase_outside_image_is_a_no_op() {
        let mut image = canvas_with_glyph();
        let before = image.clone();
        let region = erase(
            &mut image,
            &BoundingBox::new(100, 100, 120, 120),
            &EraseConfig::default(),
        );
        assert!(region.is_none());
        assert_eq!(image, before);
    }
}
