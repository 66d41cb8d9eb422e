//! Pipeline configuration.
//!
//! Every tunable the original scripts carried as a scattered literal lives
//! here as an explicit field with a documented default: retry budget,
//! backoff, size ceiling, resolution ladder, worker counts, endpoints.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for candidate generation.
#[derive(Debug, Clone)]
pub struct LinkerConfig {
    /// Candidates kept per mention (K).
    pub num_candidates: usize,

    /// Worker threads for the ranking pool. Parallelism is across mentions,
    /// never within one mention's scoring loop.
    pub num_workers: usize,

    /// Tab-separated qid/entity-name catalog.
    pub catalog_path: PathBuf,

    /// Directory of mention partitions (one JSON document each).
    pub mention_dir: PathBuf,

    /// Output: one line per mention, id + ranked qids.
    pub candidate_path: PathBuf,

    /// Output: deduplicated pool of every qid that appeared in any list.
    pub qid_pool_path: PathBuf,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            num_candidates: 100,
            num_workers: 24,
            catalog_path: PathBuf::from("entities/qid-entity.tsv"),
            mention_dir: PathBuf::from("mentions"),
            candidate_path: PathBuf::from("candidates/candidates.tsv"),
            qid_pool_path: PathBuf::from("candidates/all-qids.txt"),
        }
    }
}

/// Configuration for the enrichment crawl.
#[derive(Debug, Clone)]
pub struct SpiderConfig {
    /// Worker tasks. Each worker owns one contiguous shard of its batch and
    /// processes it strictly in order; this bound is also the only cap on
    /// concurrent outbound connections.
    pub num_workers: usize,

    /// qids per checkpoint batch. After each batch the image directory is
    /// archived and cleared.
    pub checkpoint_interval: usize,

    /// Retries per outbound call before giving up with a connectivity error.
    pub retries: u32,

    /// Sleep between retry attempts.
    pub backoff: Duration,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Size ceiling for the default-resolution download attempt, in bytes.
    /// Fallback-ladder attempts ignore the ceiling.
    pub max_file_size: u64,

    /// Policy: accept a response with no content-length header at the
    /// default resolution. Trades strict ceiling enforcement for
    /// completeness; the original crawler ran with this on.
    pub allow_unknown_file_size: bool,

    /// Resolution token for the first download attempt. Empty means the
    /// unscaled original asset.
    pub default_resolution: String,

    /// Descending resolution ladder tried after the default attempt fails,
    /// ending at the unscaled full size.
    pub fallback_resolutions: Vec<String>,

    /// Accepted raster file extensions.
    pub raster_extensions: Vec<String>,

    /// Accepted vector file extensions (rasterized via the thumb endpoint).
    pub vector_extensions: Vec<String>,

    /// MediaWiki api.php base.
    pub api_base: String,

    /// Plain article base, used only for the redirect fallback page fetch.
    pub page_base: String,

    /// Optional proxy applied to every request.
    pub proxy: Option<String>,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Image working directory, written concurrently by workers and purged
    /// after each checkpoint batch.
    pub image_dir: PathBuf,

    /// Where per-batch tar archives land.
    pub archive_dir: PathBuf,

    /// When false, only the brief-text path runs; image resolution and
    /// download are skipped entirely.
    pub download_images: bool,

    /// Tab-separated qid/entity-name catalog.
    pub catalog_path: PathBuf,

    /// Newline-separated pending qids (typically the candidate pool).
    pub qid_list_path: PathBuf,

    /// Output: qid -> brief text, written once at run end.
    pub brief_path: PathBuf,

    /// Output: failed qids, written once at run end.
    pub failed_path: PathBuf,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            num_workers: 8,
            checkpoint_interval: 4096,
            retries: 3,
            backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(6),
            max_file_size: 4 * 1024 * 1024,
            allow_unknown_file_size: true,
            default_resolution: String::new(),
            fallback_resolutions: ["1024px", "800px", "640px", "320px", ""]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            raster_extensions: ["jpg", "png", "gif", "jpeg", "tif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vector_extensions: vec!["svg".to_string()],
            api_base: "https://en.wikipedia.org/w/api.php".to_string(),
            page_base: "https://en.wikipedia.org/wiki/".to_string(),
            proxy: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/85.0.4183.83 Safari/537.36"
                .to_string(),
            image_dir: PathBuf::from("images"),
            archive_dir: PathBuf::from("images_zipped"),
            download_images: true,
            catalog_path: PathBuf::from("entities/qid-entity.tsv"),
            qid_list_path: PathBuf::from("candidates/all-qids.txt"),
            brief_path: PathBuf::from("qid2brief.json"),
            failed_path: PathBuf::from("failed.txt"),
        }
    }
}

impl SpiderConfig {
    /// Disable image downloading, leaving only the brief-text path.
    pub fn briefs_only(mut self) -> Self {
        self.download_images = false;
        self
    }

    /// Set the worker count.
    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    /// Whether an extension belongs to the accepted raster set.
    pub fn is_raster(&self, ext: &str) -> bool {
        self.raster_extensions.iter().any(|e| e == ext)
    }

    /// Whether an extension belongs to the accepted vector set.
    pub fn is_vector(&self, ext: &str) -> bool {
        self.vector_extensions.iter().any(|e| e == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spider_config() {
        let config = SpiderConfig::default();
        assert_eq!(config.num_workers, 8);
        assert_eq!(config.checkpoint_interval, 4096);
        assert_eq!(config.retries, 3);
        assert_eq!(config.max_file_size, 4 * 1024 * 1024);
        assert!(config.allow_unknown_file_size);
        assert!(config.download_images);
        // Ladder ends at the unscaled full size.
        assert_eq!(config.fallback_resolutions.last().unwrap(), "");
    }

    #[test]
    fn test_briefs_only() {
        let config = SpiderConfig::default().briefs_only();
        assert!(!config.download_images);
    }

    #[test]
    fn test_extension_sets() {
        let config = SpiderConfig::default();
        assert!(config.is_raster("jpg"));
        assert!(config.is_raster("tif"));
        assert!(!config.is_raster("svg"));
        assert!(config.is_vector("svg"));
        assert!(!config.is_raster("ogg"));
        assert!(!config.is_vector("ogg"));
    }

    #[test]
    fn test_default_linker_config() {
        let config = LinkerConfig::default();
        assert_eq!(config.num_candidates, 100);
        assert_eq!(config.num_workers, 24);
    }
}
