//! Checkpointed enrichment crawler.
//!
//! Each pending qid walks a fixed pipeline: catalog name resolution, title
//! query (with redirect fallback), image URL resolution, downloads with the
//! fallback ladder, brief capture. Every per-qid failure except a user
//! interrupt is converted to a failure record at the per-item boundary, so
//! one bad qid never takes down its shard. Batches of qids are archived and
//! purged as checkpoints; briefs and failures are flushed exactly once at
//! run end.

pub mod api;
pub mod checkpoint;
pub mod download;
pub mod fetch;
pub mod resolution;

use crate::catalog::{read_qid_list, EntityCatalog};
use crate::config::SpiderConfig;
use crate::error::SpiderError;
use crate::partition::partition;
use self::api::WikiClient;
use self::download::download_with_fallback;
use self::fetch::HttpFetch;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A qid that could not be enriched, with the triggering error's message.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub qid: String,
    pub reason: String,
}

/// Which checkpoint batches to run.
#[derive(Debug, Clone)]
pub enum BatchSelection {
    /// Every batch in order.
    All,
    /// Batches from this index onward.
    From(usize),
    /// An explicit list of batch indices, run in the given order.
    List(Vec<usize>),
}

impl BatchSelection {
    fn indices(&self, total: usize) -> Vec<usize> {
        match self {
            Self::All => (0..total).collect(),
            Self::From(start) => (*start..total).collect(),
            Self::List(list) => {
                let (valid, invalid): (Vec<usize>, Vec<usize>) =
                    list.iter().copied().partition(|&i| i < total);
                if !invalid.is_empty() {
                    warn!(?invalid, total, "ignoring out-of-range batch indices");
                }
                valid
            }
        }
    }
}

/// Accumulated output of a crawl run.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub briefs: HashMap<String, String>,
    pub failures: Vec<FailureRecord>,
}

#[derive(Debug, Default)]
struct ShardCrawl {
    briefs: Vec<(String, String)>,
    failures: Vec<FailureRecord>,
}

/// Enrich one qid. Returns its brief text if one was found.
///
/// With downloading enabled, success requires at least one image to land.
/// A page reporting no images at all is a clean outcome that still yields
/// the brief; a page whose images all resolve to rejected formats, or all
/// fail to download, is a failure and the brief is dropped.
pub async fn crawl_qid(
    client: &WikiClient,
    catalog: &EntityCatalog,
    qid: &str,
) -> Result<Option<String>, SpiderError> {
    let config = client.config();
    let name = catalog
        .name_of(qid)
        .ok_or_else(|| SpiderError::Lookup(qid.to_string()))?;

    if !config.download_images {
        let brief = client.query_brief(name).await?;
        return Ok(nonempty(brief));
    }

    let page = client.query_labels_and_brief(name).await?;
    if page.image_labels.is_empty() {
        debug!(qid, "no images found");
        return Ok(nonempty(page.brief));
    }

    let urls = client.resolve_image_urls(&page.image_labels).await?;
    if urls.is_empty() {
        debug!(qid, "no images in accepted formats");
        return Err(SpiderError::AllDownloadsFailed(qid.to_string()));
    }

    let mut any_downloaded = false;
    for (index, url) in urls.iter().enumerate() {
        let stem = format!("{qid}-{index}");
        if download_with_fallback(client.transport(), config, url, &stem).await? {
            any_downloaded = true;
        }
    }
    if !any_downloaded {
        return Err(SpiderError::AllDownloadsFailed(qid.to_string()));
    }
    Ok(nonempty(page.brief))
}

/// Process one shard strictly in input order.
///
/// The only error this returns is `Interrupted`; everything else becomes a
/// failure record and the loop moves on.
async fn crawl_shard(
    client: WikiClient,
    catalog: Arc<EntityCatalog>,
    qids: Vec<String>,
    interrupt: Arc<AtomicBool>,
    shard_index: usize,
) -> Result<ShardCrawl, SpiderError> {
    let mut shard = ShardCrawl::default();
    for qid in &qids {
        if interrupt.load(Ordering::Relaxed) {
            return Err(SpiderError::Interrupted);
        }
        match crawl_qid(&client, &catalog, qid).await {
            Ok(Some(brief)) => shard.briefs.push((qid.clone(), brief)),
            Ok(None) => {}
            Err(SpiderError::Interrupted) => return Err(SpiderError::Interrupted),
            Err(err) => {
                debug!(qid, %err, "qid failed");
                shard.failures.push(FailureRecord {
                    qid: qid.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    debug!(shard = shard_index, qids = qids.len(), "shard complete");
    Ok(shard)
}

/// Run the full crawl: load inputs, skip already-completed qids, process
/// the selected checkpoint batches across the worker pool, archive after
/// each batch, and write briefs + failed qids once at the end.
pub async fn run_spider(
    config: Arc<SpiderConfig>,
    fetcher: Arc<dyn HttpFetch>,
    selection: &BatchSelection,
) -> Result<CrawlReport> {
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.store(true, Ordering::Relaxed);
            }
        });
    }
    run_with_interrupt(config, fetcher, selection, interrupt).await
}

async fn run_with_interrupt(
    config: Arc<SpiderConfig>,
    fetcher: Arc<dyn HttpFetch>,
    selection: &BatchSelection,
    interrupt: Arc<AtomicBool>,
) -> Result<CrawlReport> {
    let catalog = Arc::new(EntityCatalog::load(&config.catalog_path)?);
    let qids = read_qid_list(&config.qid_list_path)?;
    if config.download_images {
        fs::create_dir_all(&config.image_dir)?;
        fs::create_dir_all(&config.archive_dir)?;
    }

    let completed = checkpoint::completed_qids(&config)?;
    let pending = checkpoint::filter_pending(qids, &completed);
    let batches = checkpoint::checkpoint_batches(pending.len(), config.checkpoint_interval);
    let selected = selection.indices(batches.len());
    info!(
        pending = pending.len(),
        completed = completed.len(),
        batches = batches.len(),
        selected = selected.len(),
        workers = config.num_workers,
        "starting crawl"
    );

    let client = WikiClient::new(fetcher, config.clone());
    let mut report = CrawlReport::default();

    for (done, &batch_index) in selected.iter().enumerate() {
        let range = batches[batch_index].clone();
        info!(
            batch = batch_index,
            done,
            total = selected.len(),
            size = range.len(),
            "processing batch"
        );

        let batch_qids = &pending[range];
        let shards = partition(batch_qids.len(), config.num_workers);
        let mut handles = Vec::with_capacity(shards.len());
        for (i, shard) in shards.into_iter().enumerate() {
            handles.push(tokio::spawn(crawl_shard(
                client.clone(),
                catalog.clone(),
                batch_qids[shard].to_vec(),
                interrupt.clone(),
                i + 1,
            )));
        }
        for joined in futures::future::join_all(handles).await {
            // An interrupt aborts here with nothing flushed.
            let shard = joined.expect("crawl worker panicked")?;
            for (qid, brief) in shard.briefs {
                report.briefs.insert(qid, brief);
            }
            report.failures.extend(shard.failures);
        }

        if config.download_images {
            checkpoint::archive_batch(&config, batch_index)?;
        }
    }

    write_outputs(&config, &report)?;
    info!(
        briefs = report.briefs.len(),
        failed = report.failures.len(),
        "crawl complete"
    );
    Ok(report)
}

fn write_outputs(config: &SpiderConfig, report: &CrawlReport) -> Result<()> {
    if let Some(parent) = config.brief_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if let Some(parent) = config.failed_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let briefs = serde_json::to_string(&report.briefs).context("failed to encode brief map")?;
    fs::write(&config.brief_path, briefs)
        .with_context(|| format!("failed to write {}", config.brief_path.display()))?;
    let failed: Vec<&str> = report.failures.iter().map(|f| f.qid.as_str()).collect();
    fs::write(&config.failed_path, failed.join("\n"))
        .with_context(|| format!("failed to write {}", config.failed_path.display()))?;
    Ok(())
}

fn nonempty(brief: String) -> Option<String> {
    if brief.is_empty() {
        None
    } else {
        Some(brief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spider::fetch::testing::{fast_config, ok_bytes, ok_response, ScriptedFetcher};
    use crate::spider::fetch::FetchFailure;
    use tempfile::TempDir;

    fn title_body(extract: &str, images: &[&str]) -> String {
        let refs: Vec<serde_json::Value> = images
            .iter()
            .map(|t| serde_json::json!({"ns": 6, "title": t}))
            .collect();
        let mut page = serde_json::json!({"pageid": 1, "title": "X", "extract": extract});
        if !images.is_empty() {
            page["images"] = refs.into();
        }
        serde_json::json!({"query": {"pages": {"1": page}}}).to_string()
    }

    fn file_body(url: &str) -> String {
        serde_json::json!({
            "query": {"pages": {"-1": {"imageinfo": [{"url": url}]}}}
        })
        .to_string()
    }

    fn catalog_of(rows: &[(&str, &str)]) -> EntityCatalog {
        let mut catalog = EntityCatalog::default();
        for (qid, name) in rows {
            catalog.push(qid.to_string(), name.to_string()).unwrap();
        }
        catalog
    }

    fn test_client(
        script: Vec<Result<fetch::FetchedResponse, FetchFailure>>,
        config: SpiderConfig,
    ) -> (WikiClient, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(ScriptedFetcher::new(script));
        (
            WikiClient::new(fetcher.clone(), Arc::new(config)),
            fetcher,
        )
    }

    #[tokio::test]
    async fn test_crawl_qid_missing_from_catalog() {
        let (client, fetcher) = test_client(vec![], fast_config());
        let catalog = catalog_of(&[("Q1", "England")]);
        let err = crawl_qid(&client, &catalog, "Q404").await.unwrap_err();
        assert!(matches!(err, SpiderError::Lookup(_)));
        // Short-circuits before any network call.
        assert_eq!(fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn test_crawl_qid_zero_images_keeps_brief() {
        let images = TempDir::new().unwrap();
        let config = SpiderConfig {
            image_dir: images.path().to_path_buf(),
            ..fast_config()
        };
        // No images field twice: redirect fallback runs once, then the
        // clean no-images outcome stands.
        let html = "<html><head><title>England - Wikipedia</title></head></html>";
        let (client, _) = test_client(
            vec![
                ok_response(&title_body("A country.", &[])),
                ok_response(html),
                ok_response(&title_body("A country.", &[])),
            ],
            config,
        );
        let catalog = catalog_of(&[("Q1", "England")]);
        let brief = crawl_qid(&client, &catalog, "Q1").await.unwrap();
        assert_eq!(brief.as_deref(), Some("A country."));
    }

    #[tokio::test]
    async fn test_crawl_qid_only_rejected_formats_is_a_failure() {
        let images = TempDir::new().unwrap();
        let config = SpiderConfig {
            image_dir: images.path().to_path_buf(),
            ..fast_config()
        };
        // The page has images, but every one resolves to an audio file.
        let (client, fetcher) = test_client(
            vec![
                ok_response(&title_body("Brief.", &["File:a.ogg"])),
                ok_response(&file_body("https://a/b/c/d/e/a.ogg")),
            ],
            config,
        );
        let catalog = catalog_of(&[("Q1", "England")]);
        let err = crawl_qid(&client, &catalog, "Q1").await.unwrap_err();
        assert!(matches!(err, SpiderError::AllDownloadsFailed(_)));
        // No download was ever attempted.
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_crawl_qid_all_downloads_failed() {
        let images = TempDir::new().unwrap();
        let config = SpiderConfig {
            image_dir: images.path().to_path_buf(),
            ..fast_config()
        };
        let mut script = vec![
            ok_response(&title_body("Brief.", &["File:a.jpg"])),
            ok_response(&file_body("https://a/b/c/d/e/a.jpg")),
        ];
        // Default attempt plus every ladder rung returns 500.
        for _ in 0..6 {
            script.push(crate::spider::fetch::testing::status_response(500));
        }
        let (client, _) = test_client(script, config);
        let catalog = catalog_of(&[("Q1", "England")]);
        let err = crawl_qid(&client, &catalog, "Q1").await.unwrap_err();
        assert!(matches!(err, SpiderError::AllDownloadsFailed(_)));
    }

    #[tokio::test]
    async fn test_crawl_qid_briefs_only_skips_images() {
        let config = SpiderConfig {
            download_images: false,
            ..fast_config()
        };
        let (client, fetcher) = test_client(
            vec![ok_response(&title_body("Just a brief.", &[]))],
            config,
        );
        let catalog = catalog_of(&[("Q1", "England")]);
        let brief = crawl_qid(&client, &catalog, "Q1").await.unwrap();
        assert_eq!(brief.as_deref(), Some("Just a brief."));
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn test_crawl_shard_records_failures_and_continues() {
        let images = TempDir::new().unwrap();
        let config = SpiderConfig {
            image_dir: images.path().to_path_buf(),
            download_images: false,
            ..fast_config()
        };
        let (client, _) = test_client(
            vec![ok_response(&title_body("Brief one.", &[]))],
            config,
        );
        let catalog = Arc::new(catalog_of(&[("Q1", "England")]));
        let interrupt = Arc::new(AtomicBool::new(false));

        let shard = crawl_shard(
            client,
            catalog,
            vec!["Q404".to_string(), "Q1".to_string()],
            interrupt,
            1,
        )
        .await
        .unwrap();
        assert_eq!(shard.failures.len(), 1);
        assert_eq!(shard.failures[0].qid, "Q404");
        assert_eq!(shard.briefs, vec![("Q1".to_string(), "Brief one.".to_string())]);
    }

    #[tokio::test]
    async fn test_crawl_shard_interrupt_aborts() {
        let (client, fetcher) = test_client(vec![], fast_config());
        let catalog = Arc::new(catalog_of(&[("Q1", "England")]));
        let interrupt = Arc::new(AtomicBool::new(true));

        let err = crawl_shard(client, catalog, vec!["Q1".to_string()], interrupt, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SpiderError::Interrupted));
        assert_eq!(fetcher.request_count(), 0);
    }

    #[test]
    fn test_batch_selection_indices() {
        assert_eq!(BatchSelection::All.indices(3), vec![0, 1, 2]);
        assert_eq!(BatchSelection::From(1).indices(3), vec![1, 2]);
        assert_eq!(
            BatchSelection::List(vec![2, 0, 9]).indices(3),
            vec![2, 0]
        );
    }

    #[tokio::test]
    async fn test_run_spider_end_to_end() {
        let work = TempDir::new().unwrap();
        let catalog_path = work.path().join("catalog.tsv");
        let qid_path = work.path().join("qids.txt");
        std::fs::write(&catalog_path, "Q1\tEngland\n").unwrap();
        std::fs::write(&qid_path, "Q1\n").unwrap();

        let config = Arc::new(SpiderConfig {
            catalog_path,
            qid_list_path: qid_path,
            image_dir: work.path().join("images"),
            archive_dir: work.path().join("archives"),
            brief_path: work.path().join("qid2brief.json"),
            failed_path: work.path().join("failed.txt"),
            num_workers: 2,
            ..fast_config()
        });
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            ok_response(&title_body("England brief.", &["File:a.jpg"])),
            ok_response(&file_body("https://a/b/c/d/e/a.jpg")),
            ok_bytes(b"imagebytes", Some(10)),
        ]));

        let report = run_spider(config.clone(), fetcher, &BatchSelection::All)
            .await
            .unwrap();
        assert_eq!(report.briefs.get("Q1").unwrap(), "England brief.");
        assert!(report.failures.is_empty());

        // The image landed, got archived with the batch, and the working
        // directory was purged.
        assert!(config.archive_dir.join("batch_0.tar").exists());
        assert!(std::fs::read_dir(&config.image_dir).unwrap().next().is_none());

        let briefs: HashMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&config.brief_path).unwrap()).unwrap();
        assert_eq!(briefs.len(), 1);
        assert_eq!(std::fs::read_to_string(&config.failed_path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_interrupted_run_flushes_nothing() {
        let work = TempDir::new().unwrap();
        let catalog_path = work.path().join("catalog.tsv");
        let qid_path = work.path().join("qids.txt");
        std::fs::write(&catalog_path, "Q1\tEngland\n").unwrap();
        std::fs::write(&qid_path, "Q1\n").unwrap();

        let config = Arc::new(SpiderConfig {
            catalog_path,
            qid_list_path: qid_path,
            image_dir: work.path().join("images"),
            archive_dir: work.path().join("archives"),
            brief_path: work.path().join("qid2brief.json"),
            failed_path: work.path().join("failed.txt"),
            ..fast_config()
        });
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let interrupt = Arc::new(AtomicBool::new(true));

        let err = run_with_interrupt(config.clone(), fetcher.clone(), &BatchSelection::All, interrupt)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpiderError>(),
            Some(SpiderError::Interrupted)
        ));
        // Aborts before any request and before any output file exists.
        assert_eq!(fetcher.request_count(), 0);
        assert!(!config.brief_path.exists());
        assert!(!config.failed_path.exists());
    }

    #[tokio::test]
    async fn test_run_spider_skips_completed_qids() {
        let work = TempDir::new().unwrap();
        let catalog_path = work.path().join("catalog.tsv");
        let qid_path = work.path().join("qids.txt");
        std::fs::write(&catalog_path, "Q1\tEngland\n").unwrap();
        std::fs::write(&qid_path, "Q1\n").unwrap();
        let image_dir = work.path().join("images");
        std::fs::create_dir_all(&image_dir).unwrap();
        std::fs::write(image_dir.join("Q1-0.jpg"), b"already here").unwrap();

        let config = Arc::new(SpiderConfig {
            catalog_path,
            qid_list_path: qid_path,
            image_dir,
            archive_dir: work.path().join("archives"),
            brief_path: work.path().join("qid2brief.json"),
            failed_path: work.path().join("failed.txt"),
            ..fast_config()
        });
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));

        let report = run_spider(config, fetcher.clone(), &BatchSelection::All)
            .await
            .unwrap();
        assert!(report.briefs.is_empty());
        assert_eq!(fetcher.request_count(), 0);
    }
}
