//! Unstructured (search-engine scrape) provider adapters.
//!
//! Only used by name search, and only after every structured source came
//! back empty.
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::errors::AppError;
use crate::extraction::{extract_candidates, ExtractionOptions, ExtractionRules};
use crate::models::CandidateResult;
use crate::normalize::strip_corporate_suffixes;
use crate::provider::{Provider, ProviderFailure, ProviderKind, ProviderResult};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Appended to every scraped query to bias engines toward registry pages.
const QUERY_SUFFIX: &str = "empresa CNPJ";

/// Static description of one search engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineProfile {
    pub tag: &'static str,
    pub label: &'static str,
    pub path: &'static str,
    pub rules: ExtractionRules,
}

pub const GOOGLE: EngineProfile = EngineProfile {
    tag: "google_scraping",
    label: "Google Search",
    path: "/search",
    rules: ExtractionRules {
        result_selector: "div.g",
        title_selector: "h3",
        snippet_selector: "div[data-sncf=\"1\"], div.VwiC3b",
    },
};

pub const BING: EngineProfile = EngineProfile {
    tag: "bing_scraping",
    label: "Bing Search",
    path: "/search",
    rules: ExtractionRules {
        result_selector: "li.b_algo",
        title_selector: "h2",
        snippet_selector: ".b_caption p",
    },
};

pub const DUCKDUCKGO: EngineProfile = EngineProfile {
    tag: "duckduckgo_scraping",
    label: "DuckDuckGo Search",
    path: "/html/",
    rules: ExtractionRules {
        result_selector: ".result",
        title_selector: "a.result__a",
        snippet_selector: ".result__snippet",
    },
};

/// Scrapes one search engine's HTML result page.
pub struct SearchEngineScraper {
    client: Client,
    base_url: String,
    profile: EngineProfile,
    options: ExtractionOptions,
}

impl SearchEngineScraper {
    pub fn new(
        profile: EngineProfile,
        base_url: impl Into<String>,
        timeout: Duration,
        options: ExtractionOptions,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!(
                    "Failed to create {} client: {}",
                    profile.label, e
                ))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            profile,
            options,
        })
    }

    fn search_url(&self, query: &str) -> ProviderResult<reqwest::Url> {
        let base = format!("{}{}", self.base_url.trim_end_matches('/'), self.profile.path);
        reqwest::Url::parse_with_params(&base, &[("q", format!("{} {}", query, QUERY_SUFFIX))])
            .map_err(|e| ProviderFailure::Transport(format!("Failed to build URL: {}", e)))
    }
}

#[async_trait]
impl Provider for SearchEngineScraper {
    fn tag(&self) -> &'static str {
        self.profile.tag
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Scrape
    }

    fn supports_search(&self) -> bool {
        true
    }

    async fn search(&self, query: &str) -> ProviderResult<Vec<CandidateResult>> {
        let url = self.search_url(query)?;
        tracing::info!("{}: scraping results for '{}'", self.profile.label, query);

        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "pt-BR,pt;q=0.9,en;q=0.8")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("{} request failed: {}", self.profile.label, e);
                ProviderFailure::from(e)
            })?;

        if response.status() != reqwest::StatusCode::OK {
            let status = response.status();
            tracing::warn!("{} returned status {}", self.profile.label, status);
            return Err(ProviderFailure::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(ProviderFailure::from)?;

        let stripped = strip_corporate_suffixes(query);
        let term = if stripped.is_empty() {
            query
        } else {
            stripped.as_str()
        };
        let candidates = extract_candidates(
            &body,
            &self.profile.rules,
            Some(term),
            &self.options,
            self.profile.label,
        );

        tracing::info!(
            "{}: extracted {} candidate(s) for '{}'",
            self.profile.label,
            candidates.len(),
            query
        );
        Ok(candidates)
    }
}
