mod engine;
mod font;
mod render;

pub use engine::{
    AverageColor, ClassifierPolicy, EraseConfig, Ink, LineMerger, MergeConfig, Placement,
    ScriptAwareClassifier, ScriptKind, ScriptRange, SimpleClassifier, TokenClassifier,
    average_color, build_classifier, contrasting_ink, erase, horizontal_gap, is_skewed,
    place_text, rotation_angle,
};
pub use font::{FontMetrics, TextMeasure, load_font_metrics, resolve_font};
pub use render::{encode_png, render_bbox_overlay, render_placements};

/// Corner point as reported by a detector. Coordinates may be negative or
/// lie outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

/// One detected token, straight from the detection service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RawWord {
    pub text: String,
    pub quad: [Vertex; 4],
}

/// Axis-aligned box in image coordinates; `x1 >= x0` and `y1 >= y0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BoundingBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BoundingBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Box spanned by the quad's top-left (first) and bottom-right (third)
    /// corners. Rotation is ignored.
    pub fn from_quad(quad: &[Vertex; 4]) -> Self {
        Self::new(quad[0].x, quad[0].y, quad[2].x, quad[2].y)
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }
}

/// Clamped pixel region inside an image. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Word {
    pub text: String,
    pub bbox: BoundingBox,
    pub angle: Option<f64>,
}

impl Word {
    pub fn from_raw(raw: &RawWord) -> Self {
        Self {
            text: raw.text.clone(),
            bbox: BoundingBox::from_quad(&raw.quad),
            angle: Some(rotation_angle(&raw.quad)),
        }
    }
}

/// Unit of translation and redraw.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Line {
    pub text: String,
    pub bbox: BoundingBox,
}

pub fn normalize_words(raw: &[RawWord]) -> Vec<Word> {
    raw.iter().map(Word::from_raw).collect()
}
