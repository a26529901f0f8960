use crate::reflow::{BBoxPx, BoundingBox, Vertex};

/// Angle in degrees of the quad's top edge (first to second vertex).
///
/// Only a coarse skew estimate; the text is never un-rotated.
pub fn rotation_angle(quad: &[Vertex; 4]) -> f64 {
    let dx = (quad[1].x - quad[0].x) as f64;
    let dy = (quad[1].y - quad[0].y) as f64;
    dy.atan2(dx).to_degrees()
}

pub fn is_skewed(angle: f64, threshold: f64) -> bool {
    angle.abs() > threshold
}

/// Distance from the right edge of `a` to the left edge of `b`; negative when
/// they overlap.
pub fn horizontal_gap(a: &BoundingBox, b: &BoundingBox) -> i32 {
    b.x0 - a.x1
}

pub(super) fn union_bbox(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
    BoundingBox {
        x0: a.x0.min(b.x0),
        y0: a.y0.min(b.y0),
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
    }
}

/// Grows `bbox` by `margin` on every side and clamps it to the image.
/// Returns `None` when nothing of the box is left inside the image.
pub(super) fn clamp_region(
    bbox: &BoundingBox,
    margin: u32,
    width: u32,
    height: u32,
) -> Option<BBoxPx> {
    if width == 0 || height == 0 {
        return None;
    }
    let margin = i64::from(margin);
    let (w, h) = (i64::from(width), i64::from(height));
    let x0 = (i64::from(bbox.x0) - margin).clamp(0, w);
    let y0 = (i64::from(bbox.y0) - margin).clamp(0, h);
    let x1 = (i64::from(bbox.x1) + margin).clamp(0, w);
    let y1 = (i64::from(bbox.y1) + margin).clamp(0, h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(BBoxPx {
        x: x0 as u32,
        y: y0 as u32,
        w: (x1 - x0) as u32,
        h: (y1 - y0) as u32,
    })
}
