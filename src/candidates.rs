//! Parallel candidate generation and aggregation.
//!
//! Shards the mention list across a fixed pool of scoring threads, each of
//! which holds only a read-only view of the catalog, then merges shard
//! outputs keyed by mention id. Shard completion order never matters; rows
//! are written in the original mention input order.

use crate::catalog::{load_mentions, EntityCatalog, Mention};
use crate::config::LinkerConfig;
use crate::partition::partition;
use crate::ranker::rank;
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Ranked candidates for one mention, descending score.
#[derive(Debug, Clone)]
pub struct CandidateList {
    pub mention_id: String,
    pub qids: Vec<String>,
    pub scores: Vec<u32>,
}

/// Output of one scoring shard.
#[derive(Debug, Default)]
pub struct ShardOutput {
    pub lists: Vec<CandidateList>,
    pub hits: usize,
}

/// Merges shard outputs by mention id and persists the results.
#[derive(Debug, Default)]
pub struct Aggregator {
    by_id: HashMap<String, CandidateList>,
    hits: usize,
}

impl Aggregator {
    /// Absorb one shard's output, in any completion order.
    pub fn absorb(&mut self, output: ShardOutput) {
        self.hits += output.hits;
        for list in output.lists {
            self.by_id.insert(list.mention_id.clone(), list);
        }
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, mention_id: &str) -> Option<&CandidateList> {
        self.by_id.get(mention_id)
    }

    /// Write one `id\tqid\tqid...` row per mention in `order`, plus the
    /// deduplicated qid pool (first-seen order over the written rows).
    pub fn write(&self, candidate_path: &Path, pool_path: &Path, order: &[String]) -> Result<()> {
        if let Some(parent) = candidate_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = pool_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut pool: Vec<&str> = Vec::new();
        let mut out = fs::File::create(candidate_path)
            .with_context(|| format!("failed to create {}", candidate_path.display()))?;
        for id in order {
            let list = self
                .by_id
                .get(id)
                .with_context(|| format!("no candidate list for mention {}", id))?;
            writeln!(out, "{}\t{}", id, list.qids.join("\t"))?;
            for qid in &list.qids {
                if seen.insert(qid) {
                    pool.push(qid);
                }
            }
        }

        fs::write(pool_path, pool.join("\n"))
            .with_context(|| format!("failed to write {}", pool_path.display()))?;
        Ok(())
    }
}

/// Summary of a candidate generation run.
#[derive(Debug, Clone, Copy)]
pub struct CandidateReport {
    pub total_mentions: usize,
    pub hits: usize,
    pub pool_size: usize,
}

impl CandidateReport {
    /// Fraction of mentions whose ground-truth qid made the top-K.
    /// Diagnostic only; never feeds back into ranking.
    pub fn hit_rate(&self) -> f64 {
        if self.total_mentions == 0 {
            return 0.0;
        }
        self.hits as f64 / self.total_mentions as f64
    }
}

/// Score one shard of mentions against the catalog, strictly in input order.
pub fn score_shard(
    mentions: &[Mention],
    catalog: &EntityCatalog,
    k: usize,
    shard_index: usize,
) -> ShardOutput {
    let mut output = ShardOutput::default();
    for mention in mentions {
        let ranked = rank(&mention.text, catalog, k);
        let qids: Vec<String> = ranked
            .iter()
            .map(|&(i, _)| catalog.records()[i].qid.clone())
            .collect();
        let scores: Vec<u32> = ranked.iter().map(|&(_, s)| s).collect();
        if let Some(answer) = &mention.answer_qid {
            if qids.iter().any(|q| q == answer) {
                output.hits += 1;
            }
        }
        output.lists.push(CandidateList {
            mention_id: mention.id.clone(),
            qids,
            scores,
        });
    }
    debug!(shard = shard_index, mentions = mentions.len(), "shard scored");
    output
}

/// Run the full candidate generation pipeline from config.
pub fn generate_candidates(config: &LinkerConfig) -> Result<CandidateReport> {
    let catalog = EntityCatalog::load(&config.catalog_path)?;
    let mentions = load_mentions(&config.mention_dir)?;
    info!(
        entities = catalog.len(),
        mentions = mentions.len(),
        workers = config.num_workers,
        k = config.num_candidates,
        "starting candidate generation"
    );

    let aggregator = score_all(&mentions, &catalog, config.num_candidates, config.num_workers);

    let order: Vec<String> = mentions.iter().map(|m| m.id.clone()).collect();
    aggregator.write(&config.candidate_path, &config.qid_pool_path, &order)?;

    let pool_size = count_pool(&aggregator);
    let report = CandidateReport {
        total_mentions: mentions.len(),
        hits: aggregator.hits(),
        pool_size,
    };
    info!(
        hit_rate = report.hit_rate(),
        pool = pool_size,
        "candidate generation complete"
    );
    Ok(report)
}

/// Fan mentions out over a scoped thread pool and merge the shard outputs.
pub fn score_all(
    mentions: &[Mention],
    catalog: &EntityCatalog,
    k: usize,
    workers: usize,
) -> Aggregator {
    let shards = partition(mentions.len(), workers);
    let mut aggregator = Aggregator::default();
    std::thread::scope(|scope| {
        let handles: Vec<_> = shards
            .into_iter()
            .enumerate()
            .map(|(i, range)| {
                let shard = &mentions[range];
                scope.spawn(move || score_shard(shard, catalog, k, i + 1))
            })
            .collect();
        for handle in handles {
            // A scoring thread can only panic on a logic bug; surface it.
            aggregator.absorb(handle.join().expect("scoring thread panicked"));
        }
    });
    aggregator
}

fn count_pool(aggregator: &Aggregator) -> usize {
    let mut seen = HashSet::new();
    for list in aggregator.by_id.values() {
        for qid in &list.qids {
            seen.insert(qid.as_str());
        }
    }
    seen.len()
}
