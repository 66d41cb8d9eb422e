//! Image download with the resolution fallback ladder.
//!
//! The first attempt fetches the default-resolution asset under the size
//! ceiling. If that fails (bad status or too large) the ladder of named
//! resolutions is walked in descending order with no ceiling; the first
//! success wins and later rungs are never tried.

use crate::config::SpiderConfig;
use crate::error::SpiderError;
use crate::spider::fetch::{get_with_retry, HttpFetch};
use crate::spider::resolution::assign_resolution;
use std::path::Path;
use tracing::debug;

/// Download an asset as `<file_stem><extension>` into the image directory.
///
/// Returns whether any attempt succeeded. HTTP-level failures advance the
/// ladder; connectivity failures propagate to the per-qid boundary.
pub async fn download_with_fallback(
    fetcher: &dyn HttpFetch,
    config: &SpiderConfig,
    url: &str,
    file_stem: &str,
) -> Result<bool, SpiderError> {
    if attempt(fetcher, config, url, file_stem, Some(config.max_file_size)).await? {
        return Ok(true);
    }
    for resolution in &config.fallback_resolutions {
        let ladder_url = assign_resolution(url, resolution);
        debug!(file_stem, resolution = %resolution, "trying fallback resolution");
        if attempt(fetcher, config, &ladder_url, file_stem, None).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn attempt(
    fetcher: &dyn HttpFetch,
    config: &SpiderConfig,
    url: &str,
    file_stem: &str,
    size_limit: Option<u64>,
) -> Result<bool, SpiderError> {
    let response = get_with_retry(fetcher, url, config).await?;
    if !response.is_success() {
        return Ok(false);
    }
    if let Some(limit) = size_limit {
        match response.content_length {
            Some(size) if size >= limit => return Ok(false),
            None if !config.allow_unknown_file_size => return Ok(false),
            _ => {}
        }
    }

    let extension = match url.rfind('.') {
        Some(i) => &url[i..],
        None => "",
    };
    let path = config.image_dir.join(format!("{file_stem}{extension}"));
    write_bytes(&path, &response.body).await?;
    Ok(true)
}

async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), SpiderError> {
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
