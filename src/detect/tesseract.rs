use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use super::{DetectFuture, Detector};
use crate::reflow::{RawWord, Vertex};

/// Sparse-text page segmentation: find as much text as possible in no
/// particular order.
const SPARSE_TEXT_PSM: u32 = 11;

/// Local `tesseract` binary producing hOCR.
#[derive(Debug, Clone)]
pub struct Tesseract {
    languages: String,
}

impl Tesseract {
    pub fn new(languages: &str) -> Result<Self> {
        Ok(Self {
            languages: normalize_ocr_languages(languages)?,
        })
    }
}

impl Detector for Tesseract {
    fn detect<'a>(&'a self, image_bytes: &'a [u8]) -> DetectFuture<'a> {
        Box::pin(async move {
            let image = image::load_from_memory(image_bytes)
                .with_context(|| "failed to decode image for OCR")?;
            let mut tmp = tempfile::Builder::new()
                .suffix(".png")
                .tempfile()
                .with_context(|| "failed to create temp file for OCR")?;
            image
                .write_to(&mut tmp, image::ImageFormat::Png)
                .with_context(|| "failed to write temp image for OCR")?;
            tmp.flush().ok();

            let path = tmp.path().to_path_buf();
            let languages = self.languages.clone();
            let hocr = tokio::task::spawn_blocking(move || {
                run_tesseract_hocr(&path, &languages, SPARSE_TEXT_PSM)
            })
            .await
            .with_context(|| "tesseract task failed")??;
            let words = parse_hocr_words(&hocr);
            debug!("tesseract detected {} words", words.len());
            Ok(words)
        })
    }
}

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .with_context(|| "failed to run tesseract --list-langs")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect())
}

fn normalize_ocr_languages(requested: &str) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }

    let available = match list_tesseract_languages() {
        Ok(list) => list,
        Err(_) => return Ok(trimmed.to_string()),
    };

    let (chosen, missing): (Vec<&str>, Vec<&str>) = trimmed
        .split(['+', ',', ' '])
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .partition(|lang| available.iter().any(|value| value == lang));

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }

    Ok(chosen.join("+"))
}

fn run_tesseract_hocr(path: &Path, languages: &str, psm: u32) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--psm")
        .arg(psm.to_string())
        .arg("hocr")
        .output()
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Every `ocrx_word` span in document order, with its bbox as an upright quad.
fn parse_hocr_words(hocr: &str) -> Vec<RawWord> {
    let bytes = hocr.as_bytes();
    let mut words = Vec::new();
    let mut i = 0usize;
    while let Some(start) = find_subslice(bytes, b"<span", i) {
        let Some(tag_end) = find_byte(bytes, b'>', start) else {
            break;
        };
        let tag = &hocr[start..tag_end];
        if !tag.contains("ocrx_word") {
            i = tag_end + 1;
            continue;
        }
        let Some((inner_start, inner_end)) = find_span_inner(bytes, tag_end + 1) else {
            break;
        };
        let text = decode_entities(&strip_tags(&hocr[inner_start..inner_end]))
            .replace('\u{00a0}', " ");
        let text = text.trim();
        if let Some(quad) = parse_hocr_bbox_from_title(tag) {
            if !text.is_empty() {
                words.push(RawWord {
                    text: text.to_string(),
                    quad,
                });
            }
        }
        i = inner_end + "</span>".len();
    }
    words
}

fn parse_hocr_bbox_from_title(tag: &str) -> Option<[Vertex; 4]> {
    let title = extract_attr(tag, "title")?;
    let bbox_idx = title.find("bbox")?;
    let rest = &title[bbox_idx + 4..];
    let nums = rest
        .split([' ', ';'])
        .filter(|v| !v.is_empty())
        .take(4)
        .filter_map(|v| v.parse::<i32>().ok())
        .collect::<Vec<_>>();
    let &[x0, y0, x1, y1] = nums.as_slice() else {
        return None;
    };
    Some([
        Vertex { x: x0, y: y0 },
        Vertex { x: x1, y: y0 },
        Vertex { x: x1, y: y1 },
        Vertex { x: x0, y: y1 },
    ])
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|win| win == needle)
        .map(|pos| from + pos)
}

fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|b| *b == needle)
        .map(|pos| from + pos)
}

fn find_span_inner(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut depth = 1i32;
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if bytes[i..].starts_with(b"<span") {
                depth += 1;
            } else if bytes[i..].starts_with(b"</span") {
                depth -= 1;
                if depth == 0 {
                    return Some((start, i));
                }
            }
        }
        i += 1;
    }
    None
}

fn extract_attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{}=", name);
    let idx = tag.find(&needle)?;
    let rest = &tag[idx + needle.len()..];
    let quote = rest.chars().next().filter(|ch| *ch == '"' || *ch == '\'')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

fn strip_tags(value: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in value.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOCR: &str = r#"<div class='ocr_page' title='image "x.png"; bbox 0 0 200 100'>
 <span class='ocr_line' id='line_1_1' title="bbox 10 10 120 30; baseline 0 -3">
  <span class='ocrx_word' id='word_1_1' title='bbox 10 10 50 30; x_wconf 91'>Hello</span>
  <span class='ocrx_word' id='word_1_2' title='bbox 55 10 120 30; x_wconf 88'><strong>W&amp;rld</strong></span>
 </span>
 <span class='ocr_line' id='line_1_2' title="bbox 10 50 40 70">
  <span class='ocrx_word' id='word_1_3' title='bbox 10 50 40 70; x_wconf 10'> </span>
  <span class='ocrx_word' id='word_1_4' title='x_wconf 95'>nobox</span>
 </span>
</div>"#;

    #[test]
    fn hocr_words_keep_document_order_and_boxes() {
        let words = parse_hocr_words(HOCR);
        let texts = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Hello", "W&rld"]);
        assert_eq!(words[1].quad[0], Vertex { x: 55, y: 10 });
        assert_eq!(words[1].quad[1], Vertex { x: 120, y: 10 });
        assert_eq!(words[1].quad[2], Vertex { x: 120, y: 30 });
    }

    #[test]
    fn attributes_need_quotes() {
        assert_eq!(
            extract_attr("<span title='bbox 1 2 3 4'", "title").as_deref(),
            Some("bbox 1 2 3 4")
        );
        assert!(extract_attr("<span title=bbox", "title").is_none());
    }

    #[test]
    fn empty_document_has_no_words() {
        assert!(parse_hocr_words("").is_empty());
        assert!(parse_hocr_words("<span class='ocrx_word'").is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn detection_does_not_block_the_runtime() {
        let Ok(detector) = Tesseract::new("eng") else {
            return;
        };
        let png = crate::reflow::encode_png(&image::RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([255, 255, 255, 255]),
        ))
        .unwrap();
        let ticker = tokio::spawn(async { tokio::task::yield_now().await });

        match detector.detect(&png).await {
            Ok(words) => assert!(words.is_empty()),
            Err(err) => assert!(format!("{:#}", err).contains("tesseract")),
        }
        ticker.await.unwrap();
    }
}
