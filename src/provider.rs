//! Shared interface implemented by every external data source.
//!
//! Structured adapters live in [`crate::services`], scrape adapters in
//! [`crate::scrapers`]. The pipeline only sees `dyn Provider`.

use async_trait::async_trait;
use std::fmt;

use crate::models::{CandidateResult, Cnpj, PartialRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// JSON API with a known schema.
    Structured,
    /// HTML page parsed with heuristics.
    Scrape,
}

/// Why a single provider call produced nothing.
///
/// Always absorbed by the pipeline and recorded as a
/// [`crate::models::SourceOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    /// Per-call or request deadline elapsed.
    Timeout,
    /// Endpoint answered with something other than 200.
    HttpStatus(u16),
    /// Connection, TLS or body read error.
    Transport(String),
    /// Body was not the expected JSON shape.
    Decode(String),
    /// The provider does not implement this operation.
    Unsupported,
}

impl ProviderFailure {
    pub fn code(&self) -> &'static str {
        match self {
            ProviderFailure::Timeout => "timeout",
            ProviderFailure::HttpStatus(_) => "http_status",
            ProviderFailure::Transport(_) => "transport",
            ProviderFailure::Decode(_) => "decode",
            ProviderFailure::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::Timeout => write!(f, "request timed out"),
            ProviderFailure::HttpStatus(status) => write!(f, "returned status {}", status),
            ProviderFailure::Transport(msg) => write!(f, "request failed: {}", msg),
            ProviderFailure::Decode(msg) => write!(f, "failed to parse response: {}", msg),
            ProviderFailure::Unsupported => write!(f, "operation not supported"),
        }
    }
}

impl From<reqwest::Error> for ProviderFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderFailure::Timeout
        } else if err.is_decode() {
            ProviderFailure::Decode(err.to_string())
        } else {
            ProviderFailure::Transport(err.to_string())
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderFailure>;

/// One external source. Every call issues at most one outbound request and
/// never retries.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable tag used in `sources`, `sources_used` and outcomes.
    fn tag(&self) -> &'static str;

    fn kind(&self) -> ProviderKind;

    fn supports_fetch(&self) -> bool {
        false
    }

    fn supports_search(&self) -> bool {
        false
    }

    /// Identifier lookup.
    async fn fetch(&self, _cnpj: &Cnpj) -> ProviderResult<PartialRecord> {
        Err(ProviderFailure::Unsupported)
    }

    /// Name lookup.
    async fn search(&self, _query: &str) -> ProviderResult<Vec<CandidateResult>> {
        Err(ProviderFailure::Unsupported)
    }
}
