use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::{Translate, TranslateFuture};

const DEFAULT_V2_BASE_URL: &str = "https://translation.googleapis.com/language/translate/v2";
const DEFAULT_GTX_BASE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Cloud Translation API v2, authenticated with an API key.
#[derive(Debug, Clone)]
pub struct Google {
    key: String,
}

impl Google {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Translate for Google {
    fn translate<'a>(&'a self, text: &'a str, target_lang: &'a str) -> TranslateFuture<'a> {
        Box::pin(async move {
            let client = reqwest::Client::new();
            let body = json!({
                "q": text,
                "target": target_lang,
                "format": "text"
            });
            let response = client
                .post(v2_base_url())
                .query(&[("key", self.key.as_str())])
                .json(&body)
                .send()
                .await
                .with_context(|| "failed to call translation API")?;
            let status = response.status();
            let payload = response
                .text()
                .await
                .with_context(|| "failed to read translation API response")?;
            if !status.is_success() {
                return Err(anyhow!("translation API error ({}): {}", status, payload));
            }
            parse_v2_response(&payload)
        })
    }
}

/// Keyless web endpoint used by the Google Translate widget.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gtx;

impl Translate for Gtx {
    fn translate<'a>(&'a self, text: &'a str, target_lang: &'a str) -> TranslateFuture<'a> {
        Box::pin(async move {
            let client = reqwest::Client::new();
            let response = client
                .get(gtx_base_url())
                .query(&[
                    ("client", "gtx"),
                    ("sl", "auto"),
                    ("tl", target_lang),
                    ("dt", "t"),
                    ("q", text),
                ])
                .send()
                .await
                .with_context(|| "failed to call gtx translate endpoint")?;
            let status = response.status();
            let payload = response
                .text()
                .await
                .with_context(|| "failed to read gtx translate response")?;
            if !status.is_success() {
                return Err(anyhow!("gtx translate error ({}): {}", status, payload));
            }
            parse_gtx_response(&payload)
        })
    }
}

fn v2_base_url() -> String {
    std::env::var("GOOGLE_TRANSLATE_BASE_URL").unwrap_or_else(|_| DEFAULT_V2_BASE_URL.to_string())
}

fn gtx_base_url() -> String {
    std::env::var("GTX_TRANSLATE_BASE_URL").unwrap_or_else(|_| DEFAULT_GTX_BASE_URL.to_string())
}

#[derive(Debug, Deserialize)]
struct V2Response {
    data: V2Data,
}

#[derive(Debug, Deserialize)]
struct V2Data {
    #[serde(default)]
    translations: Vec<V2Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V2Translation {
    translated_text: String,
}

pub fn parse_v2_response(payload: &str) -> Result<String> {
    let parsed: V2Response =
        serde_json::from_str(payload).with_context(|| "failed to parse translation response")?;
    parsed
        .data
        .translations
        .into_iter()
        .next()
        .map(|translation| translation.translated_text)
        .ok_or_else(|| anyhow!("translation response has no translations"))
}

/// The first element of every segment in `response[0]`, joined with spaces.
pub fn parse_gtx_response(payload: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(payload).with_context(|| "failed to parse gtx response")?;
    let segments = value
        .get(0)
        .and_then(|segments| segments.as_array())
        .ok_or_else(|| anyhow!("gtx response has no segments"))?;
    let parts = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|text| text.as_str()))
        .collect::<Vec<_>>();
    if parts.is_empty() {
        return Err(anyhow!("gtx response has no translated text"));
    }
    Ok(parts.join(" "))
}
