use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{DetectFuture, Detector};
use crate::reflow::{RawWord, Vertex};

const DEFAULT_BASE_URL: &str = "https://vision.googleapis.com/v1";

/// Google Cloud Vision `TEXT_DETECTION`.
#[derive(Debug, Clone)]
pub struct Vision {
    key: String,
}

impl Vision {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Detector for Vision {
    fn detect<'a>(&'a self, image_bytes: &'a [u8]) -> DetectFuture<'a> {
        Box::pin(async move {
            let client = reqwest::Client::new();
            let url = format!("{}/images:annotate", base_url());
            let body = json!({
                "requests": [{
                    "image": {"content": BASE64.encode(image_bytes)},
                    "features": [{"type": "TEXT_DETECTION"}]
                }]
            });
            let response = client
                .post(&url)
                .query(&[("key", self.key.as_str())])
                .json(&body)
                .send()
                .await
                .with_context(|| "failed to call vision API")?;
            let status = response.status();
            let text = response
                .text()
                .await
                .with_context(|| "failed to read vision API response")?;
            if !status.is_success() {
                return Err(anyhow!("vision API error ({}): {}", status, text));
            }
            let words = parse_annotate_response(&text)?;
            debug!("vision detected {} words", words.len());
            Ok(words)
        })
    }
}

fn base_url() -> String {
    std::env::var("VISION_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(default)]
    words: Vec<VisionWord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionWord {
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    symbols: Vec<Symbol>,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<VisionVertex>,
}

#[derive(Debug, Default, Deserialize)]
struct VisionVertex {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

#[derive(Debug, Deserialize)]
struct Symbol {
    #[serde(default)]
    text: String,
}

/// Flattens page → block → paragraph → word, keeping traversal order.
/// Words without a four-corner polygon are skipped.
pub fn parse_annotate_response(payload: &str) -> Result<Vec<RawWord>> {
    let parsed: AnnotateResponse =
        serde_json::from_str(payload).with_context(|| "failed to parse vision API response")?;
    let Some(response) = parsed.responses.into_iter().next() else {
        return Ok(Vec::new());
    };
    if let Some(status) = response.error {
        return Err(anyhow!(
            "vision API returned error {}: {}",
            status.code,
            status.message
        ));
    }
    let Some(annotation) = response.full_text_annotation else {
        return Ok(Vec::new());
    };

    let mut words = Vec::new();
    let all_words = annotation
        .pages
        .into_iter()
        .flat_map(|page| page.blocks)
        .flat_map(|block| block.paragraphs)
        .flat_map(|paragraph| paragraph.words);
    for word in all_words {
        let text = word
            .symbols
            .iter()
            .map(|symbol| symbol.text.as_str())
            .collect::<String>();
        let Some(poly) = word.bounding_box else {
            continue;
        };
        let Ok(corners) = <[VisionVertex; 4]>::try_from(poly.vertices) else {
            continue;
        };
        words.push(RawWord {
            text,
            quad: corners.map(|v| Vertex { x: v.x, y: v.y }),
        });
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
      "responses": [{
        "fullTextAnnotation": {
          "pages": [{
            "blocks": [
              {"paragraphs": [{"words": [
                {"boundingBox": {"vertices": [{"x": 10, "y": 5}, {"x": 40, "y": 5}, {"x": 40, "y": 20}, {"x": 10, "y": 20}]},
                 "symbols": [{"text": "H"}, {"text": "i"}]},
                {"boundingBox": {"vertices": [{"y": 5}, {"x": 8, "y": 5}, {"x": 8, "y": 20}, {"y": 20}]},
                 "symbols": [{"text": "!"}]}
              ]}]},
              {"paragraphs": [{"words": [
                {"boundingBox": {"vertices": [{"x": 1, "y": 1}, {"x": 2, "y": 1}]},
                 "symbols": [{"text": "x"}]},
                {"boundingBox": {"vertices": [{"x": 50, "y": 60}, {"x": 70, "y": 60}, {"x": 70, "y": 80}, {"x": 50, "y": 80}]},
                 "symbols": [{"text": "汉"}, {"text": "字"}]}
              ]}]}
            ]
          }]
        }
      }]
    }"#;

    #[test]
    fn words_are_flattened_in_traversal_order() {
        let words = parse_annotate_response(RESPONSE).unwrap();
        let texts = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Hi", "!", "汉字"]);
        assert_eq!(words[0].quad[0], Vertex { x: 10, y: 5 });
        assert_eq!(words[0].quad[2], Vertex { x: 40, y: 20 });
    }

    #[test]
    fn missing_coordinates_default_to_zero() {
        let words = parse_annotate_response(RESPONSE).unwrap();
        assert_eq!(words[1].quad[0], Vertex { x: 0, y: 5 });
    }

    #[test]
    fn empty_response_has_no_words() {
        assert!(parse_annotate_response(r#"{"responses": [{}]}"#).unwrap().is_empty());
        assert!(parse_annotate_response(r#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn service_error_is_fatal() {
        let err = parse_annotate_response(
            r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Bad image data."));
    }
}
