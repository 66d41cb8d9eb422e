//! Encyclopedia API client.
//!
//! Two read-only JSON endpoints: a title query returning a short extract
//! plus up to ten image file titles, and a file query resolving those
//! titles to direct download URLs. A plain HTML page fetch exists only as
//! the disambiguation fallback and is parsed solely for its title element.

use crate::config::SpiderConfig;
use crate::error::SpiderError;
use crate::spider::fetch::{get_with_retry, HttpFetch};
use crate::spider::resolution::{assign_resolution, extension_of};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Image labels per title query; the API returns at most this many.
const MAX_IMAGE_LABELS: usize = 10;

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    query: Option<QueryBody>,
}

// `pages` keeps the API's response order (serde_json `preserve_order`);
// image index assignment depends on it.
#[derive(Debug, Deserialize)]
struct QueryBody {
    pages: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    images: Option<Vec<ImageRef>>,
    #[serde(default)]
    imageinfo: Option<Vec<ImageInfo>>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    url: String,
}

/// Labels-plus-brief result of a title query.
#[derive(Debug, Default)]
pub struct TitlePage {
    pub image_labels: Vec<String>,
    pub brief: String,
}

/// Client over the MediaWiki query endpoints. Cheap to clone; workers share
/// one transport.
#[derive(Clone)]
pub struct WikiClient {
    fetcher: Arc<dyn HttpFetch>,
    config: Arc<SpiderConfig>,
}

impl WikiClient {
    pub fn new(fetcher: Arc<dyn HttpFetch>, config: Arc<SpiderConfig>) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &SpiderConfig {
        &self.config
    }

    /// The underlying transport, shared with the download path.
    pub fn transport(&self) -> &dyn HttpFetch {
        self.fetcher.as_ref()
    }

    /// Title query for image labels and brief text, with the redirect
    /// fallback applied at most once.
    ///
    /// A response without an `images` field means the page redirected to a
    /// disambiguation or region target; the corrected title is read from
    /// the page itself and the query retried exactly once. A second miss
    /// is a definitive clean "no images" outcome, not an error.
    pub async fn query_labels_and_brief(&self, title: &str) -> Result<TitlePage, SpiderError> {
        match self.title_query(title, true).await? {
            TitleOutcome::Complete(page) => Ok(page),
            TitleOutcome::NoImages(brief) => {
                let corrected = self.corrected_title(title).await?;
                debug!(title, corrected, "redirected page, retrying title query");
                match self.title_query(&corrected, true).await? {
                    TitleOutcome::Complete(page) => Ok(page),
                    TitleOutcome::NoImages(retry_brief) => Ok(TitlePage {
                        image_labels: Vec::new(),
                        brief: if retry_brief.is_empty() { brief } else { retry_brief },
                    }),
                }
            }
        }
    }

    /// Brief text only, used when image downloading is disabled.
    pub async fn query_brief(&self, title: &str) -> Result<String, SpiderError> {
        match self.title_query(title, false).await? {
            TitleOutcome::Complete(page) => Ok(page.brief),
            TitleOutcome::NoImages(brief) => Ok(brief),
        }
    }

    /// Resolve image labels to download URLs in one batch query, keeping
    /// only accepted extensions. Raster assets get the default-resolution
    /// rewrite; vector assets stay unscaled.
    pub async fn resolve_image_urls(&self, labels: &[String]) -> Result<Vec<String>, SpiderError> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.query_url(&labels.join("|"), "imageinfo")?;
        let response = get_with_retry(self.fetcher.as_ref(), url.as_str(), &self.config).await?;
        let envelope: QueryEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| SpiderError::ApiShape(format!("file query: {e}")))?;
        let pages = envelope
            .query
            .map(|q| q.pages)
            .ok_or_else(|| SpiderError::ApiShape("file query: missing query.pages".into()))?;

        let mut urls = Vec::new();
        for (_, value) in pages {
            let entry: PageEntry = serde_json::from_value(value)
                .map_err(|e| SpiderError::ApiShape(format!("file query: {e}")))?;
            let Some(info) = entry.imageinfo.and_then(|mut v| {
                if v.is_empty() {
                    None
                } else {
                    Some(v.remove(0))
                }
            }) else {
                continue;
            };
            let asset = info.url.trim().to_string();
            let ext = extension_of(&asset);
            if self.config.is_raster(&ext) {
                urls.push(assign_resolution(&asset, &self.config.default_resolution));
            } else if self.config.is_vector(&ext) {
                urls.push(asset);
            }
        }
        Ok(urls)
    }

    async fn title_query(
        &self,
        title: &str,
        with_images: bool,
    ) -> Result<TitleOutcome, SpiderError> {
        let prop = if with_images { "images|extracts" } else { "extracts" };
        let url = self.query_url(title, prop)?;
        let response = get_with_retry(self.fetcher.as_ref(), url.as_str(), &self.config).await?;
        let envelope: QueryEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| SpiderError::ApiShape(format!("title query: {e}")))?;
        let pages = envelope
            .query
            .map(|q| q.pages)
            .ok_or_else(|| SpiderError::ApiShape("title query: missing query.pages".into()))?;
        let page = pages
            .into_iter()
            .map(|(_, value)| value)
            .next()
            .ok_or_else(|| SpiderError::ApiShape("title query: empty pages".into()))?;
        let page: PageEntry = serde_json::from_value(page)
            .map_err(|e| SpiderError::ApiShape(format!("title query: {e}")))?;

        let brief = page.extract.as_deref().map(clean_extract).unwrap_or_default();
        match page.images {
            Some(images) if with_images => Ok(TitleOutcome::Complete(TitlePage {
                image_labels: images
                    .into_iter()
                    .take(MAX_IMAGE_LABELS)
                    .map(|i| i.title.trim().to_string())
                    .collect(),
                brief,
            })),
            _ => Ok(TitleOutcome::NoImages(brief)),
        }
    }

    /// Fetch the plain article page and extract the corrected title from
    /// its title element, minus the trailing site-name suffix.
    async fn corrected_title(&self, title: &str) -> Result<String, SpiderError> {
        let mut url = Url::parse(&self.config.page_base)
            .map_err(|e| SpiderError::ApiShape(format!("bad page base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SpiderError::ApiShape("page base cannot take a path".into()))?
            .pop_if_empty()
            .push(title);

        let response = get_with_retry(self.fetcher.as_ref(), url.as_str(), &self.config).await?;
        let document = Html::parse_document(&response.text());
        let selector = Selector::parse("title").expect("static 'title' CSS selector is valid");
        let page_title: String = document
            .select(&selector)
            .next()
            .map(|t| t.text().collect())
            .ok_or_else(|| SpiderError::ApiShape("page fetch: no title element".into()))?;

        // 'Greater China - Wikipedia' -> 'Greater China'
        let corrected = match page_title.rfind(" -") {
            Some(i) => page_title[..i].to_string(),
            None => page_title,
        };
        Ok(corrected.trim().to_string())
    }

    fn query_url(&self, titles: &str, prop: &str) -> Result<Url, SpiderError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| SpiderError::ApiShape(format!("bad api base: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("action", "query")
                .append_pair("titles", titles)
                .append_pair("prop", prop);
            if prop.contains("extracts") {
                pairs.append_key_only("exintro").append_key_only("explaintext");
            }
            if prop.contains("imageinfo") {
                pairs.append_pair("iiprop", "url");
            }
            pairs.append_pair("redirects", "1").append_pair("format", "json");
        }
        Ok(url)
    }
}

enum TitleOutcome {
    Complete(TitlePage),
    NoImages(String),
}

/// Collapse an extract to one line of trimmed text.
fn clean_extract(raw: &str) -> String {
    raw.trim().replace('\n', " ")
}
