use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing::debug;

/// Loads the image behind `source`: `http(s)://` URLs are downloaded, anything
/// else is read from disk. Content that does not sniff as an image is
/// rejected.
pub async fn fetch_image(source: &str) -> Result<Vec<u8>> {
    let source = source.trim();
    if source.is_empty() {
        return Err(anyhow!("image source is empty"));
    }
    let bytes = if is_remote(source) {
        download(source).await?
    } else {
        let path = Path::new(source);
        std::fs::read(path).with_context(|| format!("failed to read image: {}", path.display()))?
    };
    let mime = sniff_image_mime(&bytes)
        .ok_or_else(|| anyhow!("source is not a supported image: {}", source))?;
    debug!("loaded {} bytes of {} from {}", bytes.len(), mime, source);
    Ok(bytes)
}

pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    if kind.matcher_type() == infer::MatcherType::Image {
        Some(kind.mime_type())
    } else {
        None
    }
}

fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

async fn download(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to download image: {}", url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("image download failed ({}): {}", status, url));
    }
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("failed to read image body: {}", url))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes() -> Vec<u8> {
        crate::reflow::encode_png(&RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]))).unwrap()
    }

    #[test]
    fn remote_detection_is_scheme_based() {
        assert!(is_remote("https://example.com/a.png"));
        assert!(is_remote("HTTP://example.com/a.png"));
        assert!(!is_remote("./https.png"));
        assert!(!is_remote("/tmp/a.png"));
    }

    #[test]
    fn png_sniffs_as_image() {
        assert_eq!(sniff_image_mime(&png_bytes()), Some("image/png"));
        assert_eq!(sniff_image_mime(b"plain text"), None);
    }

    #[tokio::test]
    async fn reads_local_images() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.png");
        std::fs::write(&path, png_bytes()).expect("write");
        let bytes = fetch_image(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, png_bytes());
    }

    #[tokio::test]
    async fn rejects_non_images_and_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").expect("write");
        assert!(fetch_image(path.to_str().unwrap()).await.is_err());
        assert!(fetch_image("/nonexistent/image.png").await.is_err());
        assert!(fetch_image("  ").await.is_err());
    }
}
