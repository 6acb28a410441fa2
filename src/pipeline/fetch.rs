//! Image loading for the diff engine.
//!
//! A diff input may arrive in three forms, tried in this order:
//!
//! 1. an embedded base64 data URI (`data:image/png;base64,…`),
//! 2. one of the service's own asset URLs — resolved from local storage,
//!    bypassing the network entirely,
//! 3. an arbitrary external URL — fetched over HTTP with a bounded timeout.
//!
//! Nothing here retries: a fetch that fails or times out is a terminal
//! failure for the request (callers may retry whole requests).

use crate::error::FacsimileError;
use crate::store::AssetStore;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::time::Duration;
use tracing::debug;

/// Load an image from a data URI, an own-asset URL, or an external URL.
pub async fn load_image(
    source: &str,
    store: &AssetStore,
    timeout_secs: u64,
) -> Result<DynamicImage, FacsimileError> {
    if let Some(encoded) = source.strip_prefix("data:") {
        return decode_data_uri(source, encoded);
    }

    if let Some(path) = store.resolve(source) {
        debug!("Resolving {} from local storage", short_source(source));
        let bytes = std::fs::read(&path).map_err(|e| FacsimileError::FetchFailed {
            url: source.to_string(),
            reason: format!("local read failed: {e}"),
        })?;
        return decode_bytes(source, &bytes);
    }

    if source.starts_with("http://") || source.starts_with("https://") {
        return fetch_remote(source, timeout_secs).await;
    }

    Err(FacsimileError::InvalidImageSource {
        src: short_source(source),
    })
}

fn decode_data_uri(source: &str, encoded: &str) -> Result<DynamicImage, FacsimileError> {
    let b64 = encoded
        .split_once(',')
        .map(|(_, b64)| b64)
        .ok_or_else(|| FacsimileError::InvalidImageSource {
            src: short_source(source),
        })?;
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| FacsimileError::ImageDecodeFailed {
            src: short_source(source),
            detail: format!("invalid base64: {e}"),
        })?;
    decode_bytes(source, &bytes)
}

async fn fetch_remote(url: &str, timeout_secs: u64) -> Result<DynamicImage, FacsimileError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| FacsimileError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FacsimileError::FetchTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            FacsimileError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(FacsimileError::FetchFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                FacsimileError::FetchTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                FacsimileError::FetchFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

    decode_bytes(url, &bytes)
}

fn decode_bytes(source: &str, bytes: &[u8]) -> Result<DynamicImage, FacsimileError> {
    image::load_from_memory(bytes).map_err(|e| FacsimileError::ImageDecodeFailed {
        src: short_source(source),
        detail: e.to_string(),
    })
}

/// Data URIs can be hundreds of kilobytes; keep error messages readable.
fn short_source(source: &str) -> String {
    if source.len() > 64 {
        format!("{}…", &source[..63])
    } else {
        source.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn empty_store() -> (AssetStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::from_parts(dir.path().to_path_buf(), "http://svc:8080", 3600);
        (store, dir)
    }

    #[tokio::test]
    async fn data_uri_round_trips() {
        let (store, _dir) = empty_store();
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()));
        let img = load_image(&uri, &store, 5).await.unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
    }

    #[tokio::test]
    async fn own_asset_url_reads_from_disk() {
        let (store, _dir) = empty_store();
        let url = store.persist("p1", "img.png", &png_bytes()).unwrap();
        let img = load_image(&url, &store, 5).await.unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
    }

    #[tokio::test]
    async fn garbage_base64_is_a_decode_error() {
        let (store, _dir) = empty_store();
        let err = load_image("data:image/png;base64,!!!", &store, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, FacsimileError::ImageDecodeFailed { .. }));
    }

    #[tokio::test]
    async fn unrecognised_source_is_rejected() {
        let (store, _dir) = empty_store();
        let err = load_image("ftp://old.school/img.png", &store, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, FacsimileError::InvalidImageSource { .. }));
    }

    #[test]
    fn short_source_truncates_long_uris() {
        let long = "d".repeat(500);
        assert!(short_source(&long).len() < 70);
        assert_eq!(short_source("abc"), "abc");
    }
}
