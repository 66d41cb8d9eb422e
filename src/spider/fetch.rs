//! Outbound HTTP transport and the bounded retry layer.
//!
//! All network traffic goes through the `HttpFetch` trait so the pipeline
//! above it can be exercised with scripted responses. The retry layer only
//! retries transient transport failures (connect, timeout, redirect loop);
//! a malformed response is not a connectivity problem and propagates to the
//! per-qid handler instead.

use crate::config::SpiderConfig;
use crate::error::SpiderError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    /// Content-Length header if the server sent one.
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level failure, split by whether a retry could help.
#[derive(Debug)]
pub enum FetchFailure {
    /// Connection refused, timeout, or redirect loop.
    Transient(String),
    /// Anything else; retrying would not change the outcome.
    Fatal(String),
}

/// Blocking-style GET seam over whatever transport backs it.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedResponse, FetchFailure>;
}

/// Production transport over reqwest.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &SpiderConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone());
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy)
                    .with_context(|| format!("invalid proxy url {}", proxy))?,
            );
        }
        let client = builder.build().context("failed to build http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchedResponse, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let content_length = response.content_length();
        let body = response.bytes().await.map_err(classify)?.to_vec();
        Ok(FetchedResponse {
            status,
            content_length,
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() || err.is_connect() || err.is_redirect() {
        FetchFailure::Transient(err.to_string())
    } else {
        FetchFailure::Fatal(err.to_string())
    }
}

/// GET with a bounded retry budget and fixed sleep between attempts.
///
/// Exhausting the budget surfaces as `Connectivity` carrying the failed
/// URL; fatal transport failures short-circuit as `ApiShape`.
pub async fn get_with_retry(
    fetcher: &dyn HttpFetch,
    url: &str,
    config: &SpiderConfig,
) -> Result<FetchedResponse, SpiderError> {
    for attempt in 1..=config.retries {
        match fetcher.get(url).await {
            Ok(response) => return Ok(response),
            Err(FetchFailure::Transient(msg)) => {
                debug!(url, attempt, %msg, "transient fetch failure");
                tokio::time::sleep(config.backoff).await;
            }
            Err(FetchFailure::Fatal(msg)) => {
                return Err(SpiderError::ApiShape(msg));
            }
        }
    }
    Err(SpiderError::Connectivity {
        url: url.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted transport: pops one canned result per GET and records every
    /// requested URL.
    pub(crate) struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<FetchedResponse, FetchFailure>>>,
        pub(crate) requests: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub(crate) fn new(
            script: Vec<Result<FetchedResponse, FetchFailure>>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub(crate) fn requested_urls(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpFetch for ScriptedFetcher {
        async fn get(&self, url: &str) -> Result<FetchedResponse, FetchFailure> {
            self.requests.lock().unwrap().push(url.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchFailure::Fatal("script exhausted".into())))
        }
    }

    pub(crate) fn ok_response(body: &str) -> Result<FetchedResponse, FetchFailure> {
        Ok(FetchedResponse {
            status: 200,
            content_length: Some(body.len() as u64),
            body: body.as_bytes().to_vec(),
        })
    }

    pub(crate) fn ok_bytes(
        body: &[u8],
        content_length: Option<u64>,
    ) -> Result<FetchedResponse, FetchFailure> {
        Ok(FetchedResponse {
            status: 200,
            content_length,
            body: body.to_vec(),
        })
    }

    pub(crate) fn status_response(status: u16) -> Result<FetchedResponse, FetchFailure> {
        Ok(FetchedResponse {
            status,
            content_length: Some(0),
            body: Vec::new(),
        })
    }

    pub(crate) fn transient() -> Result<FetchedResponse, FetchFailure> {
        Err(FetchFailure::Transient("connection reset".into()))
    }

    /// Config with zero backoff so retry tests run instantly.
    pub(crate) fn fast_config() -> SpiderConfig {
        SpiderConfig {
            backoff: std::time::Duration::from_millis(0),
            ..SpiderConfig::default()
        }
    }
}
