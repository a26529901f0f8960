use anyhow::Result;
use image::RgbaImage;

use crate::reflow::font::TextMeasure;
use crate::reflow::{BoundingBox, Line};

use super::geom::clamp_region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AverageColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ink {
    Black,
    White,
}

impl Ink {
    pub fn as_svg(&self) -> &'static str {
        match self {
            Ink::Black => "#000000",
            Ink::White => "#ffffff",
        }
    }
}

/// Replacement text positioned for drawing.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Placement {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub font_size: f32,
    pub ink: Ink,
}

/// Mean color of the pixels under `bbox`, floored per channel.
pub fn average_color(image: &RgbaImage, bbox: &BoundingBox) -> Option<AverageColor> {
    let (width, height) = image.dimensions();
    let region = clamp_region(bbox, 0, width, height)?;
    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
    for y in region.y..region.y + region.h {
        for x in region.x..region.x + region.w {
            let [pr, pg, pb, _] = image.get_pixel(x, y).0;
            r += u64::from(pr);
            g += u64::from(pg);
            b += u64::from(pb);
        }
    }
    let count = u64::from(region.w) * u64::from(region.h);
    Some(AverageColor {
        r: (r / count) as u8,
        g: (g / count) as u8,
        b: (b / count) as u8,
    })
}

/// Black on backgrounds with YIQ luma of at least 128, white otherwise.
pub fn contrasting_ink(r: u8, g: u8, b: u8) -> Ink {
    let luma = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    if luma >= 128_000 { Ink::Black } else { Ink::White }
}

/// Sizes and positions `translated` over the part of the line's box that
/// lies inside the image.
///
/// `original` must be the image as it was before any erasure: the ink color
/// comes from the background the text originally sat on. Font size starts at
/// the clamped box height and is scaled once by `box width / measured width`
/// when the text is too wide. Returns `Ok(None)` when the box has no area
/// inside the image.
pub fn place_text(
    original: &RgbaImage,
    line: &Line,
    translated: &str,
    measure: &dyn TextMeasure,
    baseline_ratio: f32,
) -> Result<Option<Placement>> {
    let (width, height) = original.dimensions();
    let Some(region) = clamp_region(&line.bbox, 0, width, height) else {
        return Ok(None);
    };
    let Some(color) = average_color(original, &line.bbox) else {
        return Ok(None);
    };
    let ink = contrasting_ink(color.r, color.g, color.b);

    let box_w = region.w as f32;
    let box_h = region.h as f32;
    let mut font_size = box_h;
    let measured = measure.measure(translated, font_size)?;
    if measured > box_w {
        font_size *= box_w / measured;
    }

    Ok(Some(Placement {
        text: translated.to_string(),
        x: region.x as f32,
        baseline: (region.y + region.h) as f32 - box_h * baseline_ratio,
        font_size,
        ink,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct FixedAdvance(f32);

    impl TextMeasure for FixedAdvance {
        fn measure(&self, text: &str, font_size: f32) -> Result<f32> {
            Ok(text.chars().count() as f32 * font_size * self.0)
        }
    }

    struct Broken;

    impl TextMeasure for Broken {
        fn measure(&self, _text: &str, _font_size: f32) -> Result<f32> {
            Err(anyhow::anyhow!("no glyph metrics"))
        }
    }

    fn line(x0: i32, y0: i32, x1: i32, y1: i32) -> Line {
        Line {
            text: "source".to_string(),
            bbox: BoundingBox::new(x0, y0, x1, y1),
        }
    }

    #[test]
    fn luma_boundary_maps_to_black() {
        // 299*128 + 587*128 + 114*128 == 128_000
        assert_eq!(contrasting_ink(128, 128, 128), Ink::Black);
        assert_eq!(contrasting_ink(127, 128, 128), Ink::White);
        assert_eq!(contrasting_ink(255, 255, 255), Ink::Black);
        assert_eq!(contrasting_ink(0, 0, 0), Ink::White);
        assert_eq!(contrasting_ink(0, 0, 255), Ink::White);
        assert_eq!(contrasting_ink(0, 255, 0), Ink::Black);
    }

    #[test]
    fn average_color_floors_each_channel() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 255]));
        image.put_pixel(1, 0, Rgba([11, 21, 32, 255]));
        let color = average_color(&image, &BoundingBox::new(0, 0, 2, 1)).unwrap();
        assert_eq!(color, AverageColor { r: 10, g: 20, b: 31 });
    }

    #[test]
    fn average_color_of_box_outside_image_is_none() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        assert!(average_color(&image, &BoundingBox::new(10, 10, 20, 20)).is_none());
    }

    #[test]
    fn text_that_fits_keeps_box_height() {
        let image = RgbaImage::from_pixel(200, 100, Rgba([250, 250, 250, 255]));
        let placement = place_text(&image, &line(10, 20, 190, 40), "hi", &FixedAdvance(0.5), 0.1)
            .unwrap()
            .unwrap();
        assert_eq!(placement.font_size, 20.0);
        assert_eq!(placement.x, 10.0);
        assert_eq!(placement.baseline, 38.0);
        assert_eq!(placement.ink, Ink::Black);
    }

    #[test]
    fn wide_text_shrinks_to_box_width() {
        let image = RgbaImage::from_pixel(200, 100, Rgba([20, 20, 40, 255]));
        let measure = FixedAdvance(0.6);
        let target = line(0, 0, 60, 20);
        let text = "a much longer translation";
        let before = measure.measure(text, 20.0).unwrap();
        assert!(before > 60.0);

        let placement = place_text(&image, &target, text, &measure, 0.1)
            .unwrap()
            .unwrap();
        assert!(placement.font_size < 20.0);
        let after = measure.measure(text, placement.font_size).unwrap();
        assert!(after <= 60.0 * 1.05);
        assert_eq!(placement.ink, Ink::White);
    }

    #[test]
    fn degenerate_box_is_skipped() {
        let image = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let placed = place_text(&image, &line(3, 3, 3, 9), "x", &FixedAdvance(0.5), 0.1).unwrap();
        assert!(placed.is_none());
    }

    #[test]
    fn box_crossing_the_edge_is_placed_inside_the_image() {
        let image = RgbaImage::from_pixel(100, 50, Rgba([250, 250, 250, 255]));
        let placement = place_text(
            &image,
            &line(-40, 30, 60, 90),
            "hello",
            &FixedAdvance(0.5),
            0.1,
        )
        .unwrap()
        .unwrap();
        assert_eq!(placement.x, 0.0);
        assert_eq!(placement.baseline, 48.0);
        assert_eq!(placement.font_size, 20.0);
        assert!(placement.baseline <= 50.0);
        assert!(FixedAdvance(0.5).measure("hello", placement.font_size).unwrap() <= 60.0);
    }

    #[test]
    fn box_outside_the_image_is_skipped() {
        let image = RgbaImage::from_pixel(100, 50, Rgba([250, 250, 250, 255]));
        let placed = place_text(&image, &line(120, 10, 180, 30), "x", &FixedAdvance(0.5), 0.1);
        assert!(placed.unwrap().is_none());
    }

    #[test]
    fn measurement_failure_propagates() {
        let image = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        assert!(place_text(&image, &line(0, 0, 8, 8), "x", &Broken, 0.1).is_err());
    }
}
