use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod detect;
pub mod logging;
pub mod pipeline;
pub mod reflow;
pub mod settings;
pub mod source;
#[cfg(test)]
mod test_util;
pub mod translate;

pub use pipeline::{Pipeline, PipelineOptions, ReflowOutcome};

#[derive(Debug, Clone)]
pub struct Config {
    /// Local path or http(s) URL.
    pub image_source: String,
    pub lang: String,
    pub settings_path: Option<String>,
    /// Directory receiving the merged-line overlay and its JSON dump.
    pub debug_boxes: Option<String>,
}

/// Translates the text in one image and returns the composite as PNG.
pub async fn run(config: Config) -> Result<Vec<u8>> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let image_bytes = source::fetch_image(&config.image_source).await?;
    let api_key = settings.resolve_api_key();
    let detector =
        detect::build_detector(settings.detector, api_key.clone(), &settings.ocr_languages)?;
    let translator = translate::build_translator(settings.translator, api_key)?;
    let font = reflow::resolve_font(
        settings.font_path.as_deref().map(Path::new),
        &settings.font_families,
    )?;

    let mut options = PipelineOptions::from_settings(&settings);
    options.font_families = render_families(font.family(), &settings.font_families);
    info!(
        "translating '{}' to {} (detector={}, translator={})",
        config.image_source,
        config.lang,
        settings.detector.as_str(),
        settings.translator.as_str()
    );

    let pipeline = Pipeline::new(detector, translator, Box::new(font), options);
    let outcome = pipeline.run(&image_bytes, &config.lang).await?;

    if let Some(dir) = config.debug_boxes.as_deref() {
        write_debug_boxes(Path::new(dir), &image_bytes, &outcome)?;
    }

    Ok(outcome.png)
}

/// The measured font goes first so rendering uses the face that sized the
/// text.
fn render_families(measured: Option<&str>, configured: &[String]) -> Vec<String> {
    let mut families = Vec::with_capacity(configured.len() + 1);
    if let Some(name) = measured {
        families.push(name.to_string());
    }
    for family in configured {
        if !families
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(family))
        {
            families.push(family.clone());
        }
    }
    families
}

fn write_debug_boxes(dir: &Path, image_bytes: &[u8], outcome: &ReflowOutcome) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create debug dir: {}", dir.display()))?;
    let image = image::load_from_memory(image_bytes)
        .with_context(|| "failed to decode source image")?
        .to_rgba8();
    let overlay = reflow::render_bbox_overlay(&image, &outcome.lines)?;
    let overlay_path: PathBuf = dir.join("lines.png");
    std::fs::write(&overlay_path, overlay)
        .with_context(|| format!("failed to write {}", overlay_path.display()))?;

    let json = serde_json::to_string_pretty(&outcome.lines)?;
    let json_path = dir.join("lines.json");
    std::fs::write(&json_path, json)
        .with_context(|| format!("failed to write {}", json_path.display()))?;
    info!("wrote debug boxes to {}", dir.display());
    Ok(())
}
