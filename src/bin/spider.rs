//! Enrichment Crawl CLI
//!
//! Fetches Wikipedia briefs and images for every pending candidate qid,
//! archiving the image directory after each checkpoint batch.
//!
//! Usage:
//!   # All batches
//!   cargo run --bin spider -- --qids candidates/all-qids.txt
//!
//!   # Resume from batch 3
//!   cargo run --bin spider -- --start 3
//!
//!   # Re-run specific batches
//!   cargo run --bin spider -- --batches 0 4 7
//!
//!   # Brief text only, no image downloads
//!   cargo run --bin spider -- --no-images

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wikilink::config::SpiderConfig;
use wikilink::spider::fetch::ReqwestFetcher;
use wikilink::spider::{run_spider, BatchSelection};

/// Crawl Wikipedia briefs and images for pending qids
#[derive(Parser, Debug)]
#[command(name = "spider")]
#[command(about = "Checkpointed Wikipedia image/brief crawler")]
struct Args {
    /// Tab-separated qid/entity-name catalog
    #[arg(long, default_value = "entities/qid-entity.tsv")]
    catalog: PathBuf,

    /// Newline-separated pending qid list
    #[arg(long, default_value = "candidates/all-qids.txt")]
    qids: PathBuf,

    /// Image working directory
    #[arg(long, default_value = "images")]
    images: PathBuf,

    /// Directory for per-batch tar archives
    #[arg(long, default_value = "images_zipped")]
    archives: PathBuf,

    /// Output: qid -> brief text JSON map
    #[arg(long, default_value = "qid2brief.json")]
    briefs: PathBuf,

    /// Output: failed qid list
    #[arg(long, default_value = "failed.txt")]
    failed: PathBuf,

    /// Worker tasks
    #[arg(long, short = 'j', default_value_t = 8)]
    workers: usize,

    /// qids per checkpoint batch
    #[arg(long, default_value_t = 4096)]
    checkpoint_interval: usize,

    /// Start from this batch index
    #[arg(long, short = 's', conflicts_with = "batches")]
    start: Option<usize>,

    /// Explicit batch indices to run
    #[arg(long, short = 'l', num_args = 1..)]
    batches: Option<Vec<usize>>,

    /// Skip image downloads, fetch brief text only
    #[arg(long)]
    no_images: bool,

    /// Proxy URL for all outbound requests
    #[arg(long, env = "WIKILINK_PROXY")]
    proxy: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();
    if args.workers == 0 {
        bail!("worker count must be positive");
    }

    let selection = match (args.start, &args.batches) {
        (Some(start), _) => BatchSelection::From(start),
        (None, Some(batches)) => BatchSelection::List(batches.clone()),
        (None, None) => BatchSelection::All,
    };

    let config = Arc::new(SpiderConfig {
        num_workers: args.workers,
        checkpoint_interval: args.checkpoint_interval,
        proxy: args.proxy,
        image_dir: args.images,
        archive_dir: args.archives,
        download_images: !args.no_images,
        catalog_path: args.catalog,
        qid_list_path: args.qids,
        brief_path: args.briefs,
        failed_path: args.failed,
        ..SpiderConfig::default()
    });
    let fetcher = Arc::new(ReqwestFetcher::new(config.as_ref())?);

    let report = run_spider(config, fetcher, &selection).await?;
    println!(
        "briefs: {}  failed: {}",
        report.briefs.len(),
        report.failures.len()
    );
    Ok(())
}
