//! Checkpoint batching and image-directory archiving.
//!
//! There is no persisted manifest: "already completed" is re-derived at
//! startup from the filenames sitting in the image working directory.
//! Because each finished batch is archived and the directory purged, that
//! scan only covers the most recent, not-yet-archived batch.

use crate::config::SpiderConfig;
use crate::error::SpiderError;
use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::process::Command;
use tracing::{info, warn};

/// qids with at least one downloaded image in the working directory.
///
/// Image files are named `<qid>-<index><ext>`, so the qid is the filename
/// prefix before the first `-`.
pub fn completed_qids(config: &SpiderConfig) -> Result<HashSet<String>, SpiderError> {
    let mut completed = HashSet::new();
    if !config.image_dir.exists() {
        return Ok(completed);
    }
    for entry in fs::read_dir(&config.image_dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if let Some((qid, _)) = name.split_once('-') {
            completed.insert(qid.to_string());
        }
    }
    Ok(completed)
}

/// Drop qids already completed, preserving input order.
pub fn filter_pending(qids: Vec<String>, completed: &HashSet<String>) -> Vec<String> {
    qids.into_iter()
        .filter(|qid| !completed.contains(qid))
        .collect()
}

/// Split `0..len` into fixed-size contiguous checkpoint batches; the last
/// batch may be shorter. Unlike the worker partitioner, the batch count
/// follows from the interval, not the other way around.
pub fn checkpoint_batches(len: usize, interval: usize) -> Vec<Range<usize>> {
    assert!(interval > 0, "checkpoint interval must be positive");
    (0..len.div_ceil(interval))
        .map(|i| i * interval..((i + 1) * interval).min(len))
        .collect()
}

/// Archive the whole image working directory into `batch_<index>.tar` and
/// clear it. Archive failure is logged and leaves the directory intact so
/// nothing is lost; the run continues.
pub fn archive_batch(config: &SpiderConfig, batch_index: usize) -> Result<(), SpiderError> {
    fs::create_dir_all(&config.archive_dir)?;
    let archive = config.archive_dir.join(format!("batch_{batch_index}.tar"));

    let status = Command::new("tar")
        .arg("cf")
        .arg(&archive)
        .arg("-C")
        .arg(&config.image_dir)
        .arg(".")
        .status()?;
    if !status.success() {
        warn!(batch = batch_index, ?status, "tar failed, keeping image directory");
        return Ok(());
    }

    let mut removed = 0usize;
    for entry in fs::read_dir(&config.image_dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(path)?;
            removed += 1;
        }
    }
    info!(
        batch = batch_index,
        archive = %archive.display(),
        files = removed,
        "batch archived"
    );
    Ok(())
}
