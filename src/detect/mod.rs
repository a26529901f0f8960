use anyhow::Result;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

use crate::reflow::RawWord;

mod tesseract;
mod vision;

pub use tesseract::Tesseract;
pub use vision::{Vision, parse_annotate_response};

pub type DetectFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<RawWord>>> + Send + 'a>>;

/// Text detection service. Words come back flattened in the service's
/// reading order.
pub trait Detector: Send + Sync {
    fn detect<'a>(&'a self, image_bytes: &'a [u8]) -> DetectFuture<'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorKind {
    #[default]
    Vision,
    Tesseract,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Vision => "vision",
            DetectorKind::Tesseract => "tesseract",
        }
    }
}

#[derive(Debug, Clone)]
pub enum DetectorImpl {
    Vision(Vision),
    Tesseract(Tesseract),
}

impl Detector for DetectorImpl {
    fn detect<'a>(&'a self, image_bytes: &'a [u8]) -> DetectFuture<'a> {
        match self {
            DetectorImpl::Vision(detector) => detector.detect(image_bytes),
            DetectorImpl::Tesseract(detector) => detector.detect(image_bytes),
        }
    }
}

pub fn build_detector(
    kind: DetectorKind,
    api_key: Option<String>,
    languages: &str,
) -> Result<DetectorImpl> {
    match kind {
        DetectorKind::Vision => {
            let key = api_key.ok_or_else(|| {
                anyhow::anyhow!("vision detection needs an API key (set GOOGLE_API_KEY)")
            })?;
            Ok(DetectorImpl::Vision(Vision::new(key)))
        }
        DetectorKind::Tesseract => Ok(DetectorImpl::Tesseract(Tesseract::new(languages)?)),
    }
}
