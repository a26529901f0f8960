use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::DetectorKind;
use crate::reflow::{ClassifierPolicy, EraseConfig, MergeConfig, ScriptRange};
use crate::translate::TranslatorKind;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const API_KEY_ENV: &str = "GOOGLE_API_KEY";
const MAX_DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct Settings {
    pub vertical_tolerance: i32,
    pub max_gap: i32,
    pub skew_filter: bool,
    pub skew_threshold: f64,
    pub classifier_policy: ClassifierPolicy,
    pub extra_scripts: Vec<ScriptRange>,
    pub erase: EraseConfig,
    pub font_families: Vec<String>,
    pub font_path: Option<String>,
    pub baseline_ratio: f32,
    pub detector: DetectorKind,
    pub ocr_languages: String,
    pub translator: TranslatorKind,
    pub translate_concurrency: usize,
    pub deadline: Option<Duration>,
    pub google_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vertical_tolerance: 10,
            max_gap: 10,
            skew_filter: true,
            skew_threshold: 10.0,
            classifier_policy: ClassifierPolicy::ScriptAware,
            extra_scripts: Vec::new(),
            erase: EraseConfig::default(),
            font_families: [
                "Noto Sans CJK SC",
                "Noto Sans CJK JP",
                "Noto Sans CJK KR",
                "Tahoma",
                "Arial Unicode MS",
                "sans-serif",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            font_path: None,
            baseline_ratio: 0.1,
            detector: DetectorKind::Vision,
            ocr_languages: "eng".to_string(),
            translator: TranslatorKind::Google,
            translate_concurrency: num_cpus::get().clamp(1, MAX_DEFAULT_CONCURRENCY),
            deadline: None,
            google_api_key: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    merge: Option<MergeSettings>,
    classifier: Option<ClassifierSettings>,
    erase: Option<EraseSettings>,
    render: Option<RenderSettings>,
    detection: Option<DetectionSettings>,
    translation: Option<TranslationSettings>,
    pipeline: Option<PipelineSettings>,
    google: Option<GoogleSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct MergeSettings {
    vertical_tolerance: Option<i32>,
    max_gap: Option<i32>,
    skew_filter: Option<bool>,
    skew_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierSettings {
    profile: Option<ClassifierPolicy>,
    policy: Option<ClassifierPolicy>,
    extra_scripts: Option<Vec<ScriptRange>>,
}

#[derive(Debug, Default, Deserialize)]
struct EraseSettings {
    margin: Option<u32>,
    blur_radius: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_families: Option<Vec<String>>,
    font_path: Option<String>,
    baseline_ratio: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectionSettings {
    backend: Option<DetectorKind>,
    languages: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    backend: Option<TranslatorKind>,
    concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSettings {
    deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleSettings {
    api_key: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            vertical_tolerance: self.vertical_tolerance,
            max_gap: self.max_gap,
            skew_threshold: self.skew_filter.then_some(self.skew_threshold),
        }
    }

    /// `GOOGLE_API_KEY` wins over the settings file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.google_api_key.clone())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(classifier) = incoming.classifier {
            if let Some(profile) = classifier.profile {
                self.apply_profile(profile);
            }
            if let Some(policy) = classifier.policy {
                self.classifier_policy = policy;
            }
            if let Some(scripts) = classifier.extra_scripts {
                self.extra_scripts = scripts;
            }
        }
        if let Some(merge) = incoming.merge {
            if let Some(value) = merge.vertical_tolerance {
                if value >= 0 {
                    self.vertical_tolerance = value;
                }
            }
            if let Some(value) = merge.max_gap {
                if value >= 0 {
                    self.max_gap = value;
                }
            }
            if let Some(enabled) = merge.skew_filter {
                self.skew_filter = enabled;
            }
            if let Some(threshold) = merge.skew_threshold {
                if threshold >= 0.0 {
                    self.skew_threshold = threshold;
                }
            }
        }
        if let Some(erase) = incoming.erase {
            if let Some(margin) = erase.margin {
                self.erase.margin = margin;
            }
            if let Some(radius) = erase.blur_radius {
                self.erase.blur_radius = radius;
            }
        }
        if let Some(render) = incoming.render {
            if let Some(families) = render.font_families {
                let families = families
                    .into_iter()
                    .filter(|family| !family.trim().is_empty())
                    .collect::<Vec<_>>();
                if !families.is_empty() {
                    self.font_families = families;
                }
            }
            if let Some(path) = render.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
            if let Some(ratio) = render.baseline_ratio {
                if (0.0..1.0).contains(&ratio) {
                    self.baseline_ratio = ratio;
                }
            }
        }
        if let Some(detection) = incoming.detection {
            if let Some(backend) = detection.backend {
                self.detector = backend;
            }
            if let Some(languages) = detection.languages {
                if !languages.trim().is_empty() {
                    self.ocr_languages = languages;
                }
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(backend) = translation.backend {
                self.translator = backend;
            }
            if let Some(concurrency) = translation.concurrency {
                if concurrency > 0 {
                    self.translate_concurrency = concurrency;
                }
            }
        }
        if let Some(pipeline) = incoming.pipeline {
            if let Some(secs) = pipeline.deadline_secs {
                self.deadline = (secs > 0).then(|| Duration::from_secs(secs));
            }
        }
        if let Some(google) = incoming.google {
            if let Some(key) = google.api_key {
                if !key.trim().is_empty() {
                    self.google_api_key = Some(key);
                }
            }
        }
    }

    /// Selects one of the two heuristic families as a unit.
    fn apply_profile(&mut self, profile: ClassifierPolicy) {
        self.classifier_policy = profile;
        self.skew_filter = profile == ClassifierPolicy::ScriptAware;
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, commented_defaults())
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

/// The seeded home file documents every key but sets none, so it never
/// masks `./settings.local.toml`.
fn commented_defaults() -> String {
    DEFAULT_SETTINGS_TOML
        .lines()
        .map(|line| {
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                line.to_string()
            } else {
                format!("# {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".image-translator-rust"))
        }
    })
}
