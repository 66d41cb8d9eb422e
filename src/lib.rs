//! wikilink - entity mention linking and encyclopedia enrichment
//!
//! Two pipelines over a shared entity catalog:
//!
//! 1. **Candidate generation**: fuzzy-match every mention against the full
//!    qid/entity catalog and keep the top-K candidates per mention
//!    (`ranker` + `candidates`).
//! 2. **Enrichment crawl**: for each candidate qid, fetch a short brief and
//!    up to ten images from the Wikipedia API, with retry, redirect
//!    fallback, and a resolution fallback ladder (`spider`).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use wikilink::candidates::generate_candidates;
//! use wikilink::config::LinkerConfig;
//!
//! let config = LinkerConfig::default();
//! let report = generate_candidates(&config).unwrap();
//! println!("hit rate: {:.4}", report.hit_rate());
//! ```

// Core error handling
pub mod error;

// Explicit configuration objects with documented defaults
pub mod config;

// Entity catalog and mention loading
pub mod catalog;

// Shared work partitioner for both pipelines
pub mod partition;

// Fuzzy candidate ranking
pub mod ranker;

// Parallel candidate generation driver and aggregation
pub mod candidates;

// Checkpointed enrichment crawler
pub mod spider;
