//! Entity catalog and mention loading.
//!
//! The catalog is an immutable qid <-> canonical-name table loaded once and
//! shared read-only (behind an `Arc`) by every worker. Mentions arrive as
//! JSON partition documents mapping mention id to surface text plus an
//! optional ground-truth qid.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One catalog row.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub qid: String,
    pub canonical_name: String,
}

/// Immutable qid <-> canonical-name table.
///
/// Rows keep their file order; the ranker's tie-breaking depends on that
/// order being stable.
#[derive(Debug, Default)]
pub struct EntityCatalog {
    records: Vec<EntityRecord>,
    by_qid: HashMap<String, usize>,
}

impl EntityCatalog {
    /// Load from a tab-separated file of `qid\tcanonical name` rows.
    /// Short rows are a hard parse error; duplicate qids are too.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let mut catalog = Self::default();
        for (lineno, line) in content.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let (qid, name) = match line.split_once('\t') {
                Some((qid, name)) if !qid.is_empty() && !name.is_empty() => (qid, name),
                _ => bail!(
                    "malformed catalog row at {}:{}: {:?}",
                    path.display(),
                    lineno + 1,
                    line
                ),
            };
            catalog.push(qid.to_string(), name.to_string())?;
        }
        Ok(catalog)
    }

    /// Append one record, enforcing qid uniqueness.
    pub fn push(&mut self, qid: String, canonical_name: String) -> Result<()> {
        if self.by_qid.contains_key(&qid) {
            bail!("duplicate qid in catalog: {}", qid);
        }
        self.by_qid.insert(qid.clone(), self.records.len());
        self.records.push(EntityRecord {
            qid,
            canonical_name,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows in original file order.
    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// Canonical name for a qid, if present.
    pub fn name_of(&self, qid: &str) -> Option<&str> {
        self.by_qid
            .get(qid)
            .map(|&i| self.records[i].canonical_name.as_str())
    }
}

/// A surface mention to be linked.
#[derive(Debug, Clone)]
pub struct Mention {
    pub id: String,
    pub text: String,
    /// Ground-truth qid, used only for the hit-rate diagnostic.
    pub answer_qid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MentionEntry {
    mentions: String,
    #[serde(default)]
    answer: Option<String>,
}

/// Load every `*.json` partition in a directory.
///
/// Each document maps mention id to `{ "mentions": text, "answer": qid }`.
/// Mentions are sorted by id across partitions so runs are deterministic
/// regardless of directory iteration order.
pub fn load_mentions(dir: &Path) -> Result<Vec<Mention>> {
    let mut mentions = Vec::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read mention dir {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let partition: HashMap<String, MentionEntry> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse mention partition {}", path.display()))?;
        for (id, entry) in partition {
            mentions.push(Mention {
                id,
                text: entry.mentions,
                answer_qid: entry.answer,
            });
        }
    }
    mentions.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(mentions)
}

/// Read a newline-separated qid list, skipping blank lines.
pub fn read_qid_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read qid list {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
