use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

mod google;

pub use google::{Google, Gtx, parse_gtx_response, parse_v2_response};

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Translation service. Every call may fail independently.
pub trait Translate: Send + Sync {
    fn translate<'a>(&'a self, text: &'a str, target_lang: &'a str) -> TranslateFuture<'a>;
}

impl<T: Translate + ?Sized> Translate for &T {
    fn translate<'a>(&'a self, text: &'a str, target_lang: &'a str) -> TranslateFuture<'a> {
        (**self).translate(text, target_lang)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslatorKind {
    #[default]
    Google,
    Gtx,
}

impl TranslatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslatorKind::Google => "google",
            TranslatorKind::Gtx => "gtx",
        }
    }
}

#[derive(Debug, Clone)]
pub enum TranslatorImpl {
    Google(Google),
    Gtx(Gtx),
}

impl Translate for TranslatorImpl {
    fn translate<'a>(&'a self, text: &'a str, target_lang: &'a str) -> TranslateFuture<'a> {
        match self {
            TranslatorImpl::Google(translator) => translator.translate(text, target_lang),
            TranslatorImpl::Gtx(translator) => translator.translate(text, target_lang),
        }
    }
}

pub fn build_translator(kind: TranslatorKind, api_key: Option<String>) -> Result<TranslatorImpl> {
    match kind {
        TranslatorKind::Google => {
            let key = api_key.ok_or_else(|| {
                anyhow!("google translation needs an API key (set GOOGLE_API_KEY)")
            })?;
            Ok(TranslatorImpl::Google(Google::new(key)))
        }
        TranslatorKind::Gtx => Ok(TranslatorImpl::Gtx(Gtx)),
    }
}
