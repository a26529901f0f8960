use anyhow::{Context, Result, anyhow};
use image::{RgbaImage, imageops};
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::{Line, Placement};

const GENERIC_FAMILIES: &[&str] = &["serif", "sans-serif", "monospace", "cursive", "fantasy"];

/// Draws every placement over `image` and returns the composite as PNG.
///
/// `image` is the fully erased buffer. Only the text is rasterized; the
/// resulting layer is alpha-composited onto a copy of `image`, so pixels no
/// text touches come out exactly as they went in.
pub fn render_placements(
    image: &RgbaImage,
    placements: &[Placement],
    font_families: &[String],
    font_data: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut canvas = image.clone();
    if !placements.is_empty() {
        let svg = placements_svg(image.width(), image.height(), placements, font_families);
        let layer = rasterize_svg(&svg, font_data)?;
        imageops::overlay(&mut canvas, &layer, 0, 0);
    }
    encode_png(&canvas)
}

/// Source image with the merged line boxes outlined, as PNG.
pub fn render_bbox_overlay(image: &RgbaImage, lines: &[Line]) -> Result<Vec<u8>> {
    let mut svg = svg_open(image.width(), image.height());
    for line in lines {
        let bbox = &line.bbox;
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#00c853" stroke-width="2"/>"##,
            x = bbox.x0,
            y = bbox.y0,
            w = bbox.width(),
            h = bbox.height()
        ));
    }
    svg.push_str("</svg>");
    let layer = rasterize_svg(&svg, None)?;
    let mut canvas = image.clone();
    imageops::overlay(&mut canvas, &layer, 0, 0);
    encode_png(&canvas)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode PNG")?;
    Ok(bytes)
}

fn placements_svg(
    width: u32,
    height: u32,
    placements: &[Placement],
    font_families: &[String],
) -> String {
    let mut svg = svg_open(width, height);
    let family = font_family_attr(font_families);
    for placement in placements {
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}" xml:space="preserve">{text}</text>"#,
            x = placement.x,
            y = placement.baseline,
            size = placement.font_size,
            color = placement.ink.as_svg(),
            family = escape_xml(&family),
            text = escape_xml(&placement.text)
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn svg_open(width: u32, height: u32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    )
}

fn font_family_attr(families: &[String]) -> String {
    families
        .iter()
        .map(|family| {
            if GENERIC_FAMILIES.contains(&family.as_str()) {
                family.clone()
            } else {
                format!("'{}'", family.replace('\'', ""))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders `svg` onto a transparent pixmap and returns it straight-alpha.
fn rasterize_svg(svg: &str, font_data: Option<&[u8]>) -> Result<RgbaImage> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);

    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(size.width(), size.height(), rgba)
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
