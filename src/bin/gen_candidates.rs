//! Candidate Generation CLI
//!
//! Scores every mention against the full entity catalog and writes the
//! top-K candidate qids per mention, plus the deduplicated candidate pool
//! consumed by the spider.
//!
//! Usage:
//!   cargo run --bin gen_candidates -- \
//!     --catalog entities/qid-entity.tsv \
//!     --mentions mentions \
//!     -k 100 -j 24

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wikilink::candidates::generate_candidates;
use wikilink::config::LinkerConfig;

/// Generate top-K entity candidates for every mention
#[derive(Parser, Debug)]
#[command(name = "gen_candidates")]
#[command(about = "Fuzzy-match mentions against the entity catalog")]
struct Args {
    /// Tab-separated qid/entity-name catalog
    #[arg(long, default_value = "entities/qid-entity.tsv")]
    catalog: PathBuf,

    /// Directory of mention partitions (one JSON document each)
    #[arg(long, default_value = "mentions")]
    mentions: PathBuf,

    /// Output: one line per mention, id + ranked qids
    #[arg(long, short = 'o', default_value = "candidates/candidates.tsv")]
    output: PathBuf,

    /// Output: deduplicated pool of every candidate qid
    #[arg(long, default_value = "candidates/all-qids.txt")]
    pool: PathBuf,

    /// Candidates kept per mention
    #[arg(long, short = 'k', default_value_t = 100)]
    candidates: usize,

    /// Worker threads
    #[arg(long, short = 'j', default_value_t = 24)]
    workers: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let config = LinkerConfig {
        num_candidates: args.candidates,
        num_workers: args.workers.max(1),
        catalog_path: args.catalog,
        mention_dir: args.mentions,
        candidate_path: args.output,
        qid_pool_path: args.pool,
    };
    let report = generate_candidates(&config)?;
    println!("accuracy: {:.4}", report.hit_rate());
    Ok(())
}
