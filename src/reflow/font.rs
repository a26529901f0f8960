use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Width of a rendered string at a given pixel size.
pub trait TextMeasure: Send + Sync {
    fn measure(&self, text: &str, font_size: f32) -> Result<f32>;

    /// Raw font file to make available to the renderer, if any.
    fn font_data(&self) -> Option<&[u8]> {
        None
    }
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }
}

impl TextMeasure for FontMetrics {
    /// Sum of horizontal advances; characters without a glyph count as a space.
    fn measure(&self, text: &str, font_size: f32) -> Result<f32> {
        let face = Face::parse(&self.data, self.face_index)
            .map_err(|err| anyhow!("failed to parse font face for measurement: {}", err))?;
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(u32::from(glyph_advance));
        }
        let units = f32::from(self.units_per_em.max(1));
        Ok(advance as f32 * (font_size / units))
    }

    fn font_data(&self) -> Option<&[u8]> {
        Some(self.data.as_ref())
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// Picks the measuring font: an explicit font file wins, otherwise the first
/// family of `families` installed on the system.
pub fn resolve_font(font_path: Option<&Path>, families: &[String]) -> Result<FontMetrics> {
    if let Some(path) = font_path {
        return load_font_metrics(path);
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    for family in families {
        match load_font_metrics_from_family(&db, family) {
            Ok(metrics) => {
                debug!("measuring text with font family '{}'", family);
                return Ok(metrics);
            }
            Err(err) => debug!("font family '{}' unavailable: {}", family, err),
        }
    }

    Err(anyhow!(
        "none of the configured font families are installed: {}",
        families.join(", ")
    ))
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    let data = Arc::new(data.to_vec());
    for index in 0..count {
        if let Ok(face) = Face::parse(&data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::clone(&data),
                units_per_em,
                space_advance,
                family: family.clone(),
                face_index: index,
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    load_font_metrics_from_data(&data, Some(family))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_file_is_an_error() {
        let err = load_font_metrics(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(err.to_string().contains("failed to read font"));
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").expect("write");
        assert!(resolve_font(Some(&path), &[]).is_err());
    }

    #[test]
    fn unknown_families_fail_resolution() {
        let families = vec!["Definitely Not An Installed Family 0x1f".to_string()];
        assert!(resolve_font(None, &families).is_err());
    }
}
