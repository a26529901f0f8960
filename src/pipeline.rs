use anyhow::{Context, Result, anyhow};
use futures_util::stream::{self, StreamExt};
use image::RgbaImage;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::detect::Detector;
use crate::reflow::{
    self, ClassifierPolicy, EraseConfig, Line, LineMerger, MergeConfig, Placement, ScriptRange,
    TextMeasure, TokenClassifier,
};
use crate::settings::Settings;
use crate::translate::Translate;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub merge: MergeConfig,
    pub classifier_policy: ClassifierPolicy,
    pub extra_scripts: Vec<ScriptRange>,
    pub erase: EraseConfig,
    pub font_families: Vec<String>,
    pub baseline_ratio: f32,
    pub concurrency: usize,
    pub deadline: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            merge: settings.merge_config(),
            classifier_policy: settings.classifier_policy,
            extra_scripts: settings.extra_scripts.clone(),
            erase: settings.erase,
            font_families: settings.font_families.clone(),
            baseline_ratio: settings.baseline_ratio,
            concurrency: settings.translate_concurrency,
            deadline: settings.deadline,
        }
    }
}

/// Result of one run.
#[derive(Debug, Clone)]
pub struct ReflowOutcome {
    /// Final composite, PNG encoded.
    pub png: Vec<u8>,
    /// Every merged line, trivial ones included, in merge order.
    pub lines: Vec<Line>,
    pub placements: Vec<Placement>,
    pub erased: usize,
    /// Lines left erased because their translation failed.
    pub failed: usize,
}

pub struct Pipeline<D: Detector, T: Translate> {
    detector: D,
    translator: T,
    measure: Box<dyn TextMeasure>,
    classifier: Box<dyn TokenClassifier>,
    options: PipelineOptions,
}

impl<D: Detector, T: Translate> Pipeline<D, T> {
    pub fn new(
        detector: D,
        translator: T,
        measure: Box<dyn TextMeasure>,
        options: PipelineOptions,
    ) -> Self {
        let classifier = reflow::build_classifier(options.classifier_policy, &options.extra_scripts);
        Self {
            detector,
            translator,
            measure,
            classifier,
            options,
        }
    }

    pub async fn run(&self, image_bytes: &[u8], target_lang: &str) -> Result<ReflowOutcome> {
        match self.options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run_once(image_bytes, target_lang))
                .await
                .map_err(|_| anyhow!("image translation exceeded deadline of {:?}", deadline))?,
            None => self.run_once(image_bytes, target_lang).await,
        }
    }

    async fn run_once(&self, image_bytes: &[u8], target_lang: &str) -> Result<ReflowOutcome> {
        let original = image::load_from_memory(image_bytes)
            .with_context(|| "failed to decode source image")?
            .to_rgba8();

        let raw = self
            .detector
            .detect(image_bytes)
            .await
            .with_context(|| "text detection failed")?;
        if raw.is_empty() {
            return Err(anyhow!("no text found in image"));
        }
        let words = reflow::normalize_words(&raw);
        let lines = LineMerger::new(self.options.merge, self.classifier.as_ref()).merge(&words);
        let targets = lines
            .iter()
            .filter(|line| !self.classifier.is_trivial(&line.text))
            .collect::<Vec<_>>();
        info!(
            "detected {} words, merged into {} lines ({} to translate)",
            raw.len(),
            lines.len(),
            targets.len()
        );

        let mut canvas = original.clone();
        let erased = self.erase_pass(&mut canvas, &targets);
        let translations = self.translate_all(&targets, target_lang).await;

        let mut placements = Vec::new();
        let mut failed = 0usize;
        for line in &targets {
            let Some(translated) = translations.get(line.text.as_str()) else {
                failed += 1;
                continue;
            };
            if translated.trim().is_empty() {
                continue;
            }
            match reflow::place_text(
                &original,
                line,
                translated,
                self.measure.as_ref(),
                self.options.baseline_ratio,
            )? {
                Some(placement) => placements.push(placement),
                None => debug!("no drawable area for '{}'", line.text),
            }
        }

        let png = reflow::render_placements(
            &canvas,
            &placements,
            &self.options.font_families,
            self.measure.font_data(),
        )?;
        info!(
            "erased {} regions, drew {} lines, {} translations failed",
            erased,
            placements.len(),
            failed
        );

        Ok(ReflowOutcome {
            png,
            lines,
            placements,
            erased,
            failed,
        })
    }

    /// Erases every target before anything is drawn.
    fn erase_pass(&self, canvas: &mut RgbaImage, targets: &[&Line]) -> usize {
        let mut erased = 0usize;
        for line in targets {
            match reflow::erase(canvas, &line.bbox, &self.options.erase) {
                Some(_) => erased += 1,
                None => debug!("'{}' lies outside the image; not erased", line.text),
            }
        }
        erased
    }

    /// Translates each distinct line text once; failures are dropped from the
    /// map.
    async fn translate_all<'a>(
        &self,
        targets: &[&'a Line],
        target_lang: &str,
    ) -> HashMap<&'a str, String> {
        let mut unique: Vec<&'a str> = Vec::new();
        for line in targets {
            if !unique.contains(&line.text.as_str()) {
                unique.push(line.text.as_str());
            }
        }

        let results = stream::iter(unique)
            .map(|text| async move { (text, self.translator.translate(text, target_lang).await) })
            .buffered(self.options.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut translations = HashMap::new();
        for (text, result) in results {
            match result {
                Ok(translated) => {
                    debug!("translated '{}' -> '{}'", text, translated);
                    translations.insert(text, translated);
                }
                Err(err) => warn!("translation failed for '{}': {:#}", text, err),
            }
        }
        translations
    }
}
