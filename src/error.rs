//! Crawl error taxonomy.
//!
//! A closed enumeration handled explicitly at the per-qid boundary; nothing
//! here is a catch-all. `Connectivity` and `Lookup` carry enough context to
//! produce a useful failure record without re-deriving state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpiderError {
    /// All retries exhausted for an outbound call. Terminal for that call,
    /// surfaces as a per-qid failure; never aborts the run.
    #[error("all retries failed: {url}")]
    Connectivity { url: String },

    /// qid absent from the entity catalog. Not retried.
    #[error("qid not found in catalog: {0}")]
    Lookup(String),

    /// The remote response did not have the expected shape. The message is
    /// captured into the failure record and processing continues.
    #[error("unexpected api response: {0}")]
    ApiShape(String),

    /// Image URLs resolved but every download attempt failed, across the
    /// whole fallback ladder.
    #[error("image download all failed for {0}")]
    AllDownloadsFailed(String),

    /// User interrupt observed at the per-item boundary. Terminates the
    /// whole run immediately with no partial flush.
    #[error("interrupted")]
    Interrupted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpiderError {
    /// Whether this error aborts the entire run rather than one qid.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_carries_url() {
        let err = SpiderError::Connectivity {
            url: "https://example.org/x".to_string(),
        };
        assert_eq!(err.to_string(), "all retries failed: https://example.org/x");
        assert!(!err.is_fatal());
    }

    #[test]
    fn lookup_names_qid() {
        let err = SpiderError::Lookup("Q42".to_string());
        assert_eq!(err.to_string(), "qid not found in catalog: Q42");
        assert!(!err.is_fatal());
    }

    #[test]
    fn only_interrupt_is_fatal() {
        assert!(SpiderError::Interrupted.is_fatal());
        assert!(!SpiderError::ApiShape("bad json".into()).is_fatal());
    }
}
