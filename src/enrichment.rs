/// Fallback cascade over every configured provider
///
/// This module drives the two lookups the service offers:
/// 1. Resolve a CNPJ: query every structured provider concurrently, merge in
///    priority order
/// 2. Search by name: structured search first, optional completion of the
///    candidates via a secondary lookup, scrapers only when nothing was found
///
/// Provider calls are async and may run concurrently; merge and dedupe run
/// afterwards on the calling task, in provider priority order.
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::dedup::dedupe;
use crate::errors::AppError;
use crate::extraction::ExtractionOptions;
use crate::merge::merge;
use crate::models::{
    CandidateResult, CanonicalRecord, Cnpj, Field, SearchResponse, SourceOutcome,
};
use crate::normalize::search_terms;
use crate::provider::{Provider, ProviderFailure, ProviderKind, ProviderResult};
use crate::scrapers::{SearchEngineScraper, BING, DUCKDUCKGO, GOOGLE};
use crate::services::{BrasilApiService, CnpjWsService, MinhaReceitaService};

/// Knobs of the cascade itself. Provider endpoints and per-call timeouts
/// live in the adapters.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Bound on a whole resolve/search invocation.
    pub request_timeout: Duration,
    /// Maximum candidates collected from each structured search provider.
    pub search_result_cap: usize,
    /// Minimum trimmed query length, in characters.
    pub min_query_len: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(25),
            search_result_cap: 5,
            min_query_len: 3,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            search_result_cap: config.search_result_cap,
            ..Self::default()
        }
    }
}

/// The provider cascade. Provider lists are in priority order.
pub struct EnrichmentPipeline {
    settings: PipelineSettings,
    structured: Vec<Arc<dyn Provider>>,
    detail_lookup: Option<Arc<dyn Provider>>,
    scrapers: Vec<Arc<dyn Provider>>,
}

/// Runs one provider call under the request deadline.
async fn bounded<T>(
    deadline: Instant,
    call: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    tokio::time::timeout_at(deadline, call)
        .await
        .unwrap_or(Err(ProviderFailure::Timeout))
}

impl EnrichmentPipeline {
    pub fn new(
        settings: PipelineSettings,
        structured: Vec<Arc<dyn Provider>>,
        detail_lookup: Option<Arc<dyn Provider>>,
        scrapers: Vec<Arc<dyn Provider>>,
    ) -> Self {
        // Providers are routed by their kind, whichever list they came in:
        // structured providers (lookups included) never scrape and scrapers
        // only run in the fallback phase.
        let (structured, misfiled): (Vec<_>, Vec<_>) = structured
            .into_iter()
            .partition(|p| p.kind() == ProviderKind::Structured);
        let (mut scrapers, mut promoted): (Vec<_>, Vec<_>) = scrapers
            .into_iter()
            .partition(|p| p.kind() == ProviderKind::Scrape);
        for provider in misfiled.iter().chain(promoted.iter()) {
            tracing::warn!(
                "⚠️  {} registered in the wrong provider list, routing by kind",
                provider.tag()
            );
        }

        let mut structured_all = structured;
        structured_all.append(&mut promoted);
        scrapers.extend(misfiled);

        let detail_lookup = detail_lookup.filter(|p| {
            let structured = p.kind() == ProviderKind::Structured;
            if !structured {
                tracing::warn!("⚠️  {} cannot serve as a detail lookup", p.tag());
            }
            structured
        });

        Self {
            settings,
            structured: structured_all,
            detail_lookup,
            scrapers,
        }
    }

    /// Production wiring: BrasilAPI, Minha Receita, CNPJ.ws for structured
    /// data; Minha Receita again (shorter timeout) to complete search
    /// candidates; Google, Bing, DuckDuckGo as the scrape fallback.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let timeout = config.provider_timeout();
        let options = ExtractionOptions {
            max_names: config.scrape_result_cap,
            require_query_match: config.scrape_match_query,
        };

        let structured: Vec<Arc<dyn Provider>> = vec![
            Arc::new(BrasilApiService::new(&config.brasilapi_base_url, timeout)?),
            Arc::new(MinhaReceitaService::new(
                &config.minha_receita_base_url,
                timeout,
            )?),
            Arc::new(CnpjWsService::new(&config.cnpj_ws_base_url, timeout)?),
        ];

        let detail_lookup: Arc<dyn Provider> = Arc::new(MinhaReceitaService::new(
            &config.minha_receita_base_url,
            config.lookup_timeout(),
        )?);

        let scrapers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(SearchEngineScraper::new(
                GOOGLE,
                &config.google_search_url,
                timeout,
                options,
            )?),
            Arc::new(SearchEngineScraper::new(
                BING,
                &config.bing_search_url,
                timeout,
                options,
            )?),
            Arc::new(SearchEngineScraper::new(
                DUCKDUCKGO,
                &config.duckduckgo_search_url,
                timeout,
                options,
            )?),
        ];

        tracing::info!(
            "✓ Enrichment pipeline ready: {} structured provider(s), {} scraper(s)",
            structured.len(),
            scrapers.len()
        );

        Ok(Self::new(
            PipelineSettings::from_config(config),
            structured,
            Some(detail_lookup),
            scrapers,
        ))
    }

    /// Resolves a CNPJ into one merged record.
    ///
    /// Fails with `InvalidIdentifier` before any provider call when the input
    /// is not a CNPJ, and with `NotFound` when no structured provider
    /// answered.
    pub async fn resolve(&self, raw: &str) -> Result<CanonicalRecord, AppError> {
        let cnpj = Cnpj::parse(raw)?;
        let deadline = Instant::now() + self.settings.request_timeout;

        let providers: Vec<&Arc<dyn Provider>> = self
            .structured
            .iter()
            .filter(|p| p.supports_fetch())
            .collect();

        tracing::info!(
            "Resolving CNPJ {} across {} provider(s)",
            cnpj.formatted(),
            providers.len()
        );

        let results = join_all(
            providers
                .iter()
                .map(|provider| bounded(deadline, provider.fetch(&cnpj))),
        )
        .await;

        // Results come back in provider order, whatever the completion order was.
        let mut records = Vec::new();
        let mut outcomes = Vec::with_capacity(providers.len());
        for (provider, result) in providers.iter().zip(results) {
            match result {
                Ok(mut record) => {
                    record.source = provider.tag().to_string();
                    if record.is_empty() {
                        tracing::info!("{} answered for {} without data", provider.tag(), cnpj);
                    } else {
                        tracing::info!(
                            "✓ {} returned {} field(s) for {}",
                            provider.tag(),
                            record.fields.len(),
                            cnpj
                        );
                    }
                    outcomes.push(SourceOutcome::success(provider.tag(), record.fields.len()));
                    records.push(record);
                }
                Err(failure) => {
                    tracing::warn!("⚠️  {} failed for {}: {}", provider.tag(), cnpj, failure);
                    outcomes.push(SourceOutcome::failure(provider.tag(), &failure));
                }
            }
        }

        if records.is_empty() {
            tracing::warn!("CNPJ {} not found in any source", cnpj);
            return Err(AppError::NotFound(format!(
                "CNPJ {} not found in any source",
                cnpj.formatted()
            )));
        }

        let mut canonical = merge(cnpj, &records);
        canonical.outcomes = outcomes;

        tracing::info!(
            "Resolved {} from {:?} (enriched: {})",
            canonical.identifier,
            canonical.sources,
            canonical.enriched
        );
        Ok(canonical)
    }

    /// Searches companies by name.
    ///
    /// Never fails once the query is long enough: when every provider fails
    /// the response is simply empty.
    pub async fn search_by_name(&self, query: &str) -> Result<SearchResponse, AppError> {
        let query = query.trim();
        let length = query.chars().count();
        if length < self.settings.min_query_len {
            return Err(AppError::QueryTooShort {
                min: self.settings.min_query_len,
                actual: length,
            });
        }

        let deadline = Instant::now() + self.settings.request_timeout;
        let terms = search_terms(query, self.settings.min_query_len);
        tracing::info!("Searching companies for '{}' (terms: {:?})", query, terms);

        let mut outcomes = Vec::new();
        let mut sources_used = Vec::new();

        // Step 1: structured search providers
        let mut results = self
            .search_structured(&terms, deadline, &mut outcomes, &mut sources_used)
            .await;

        // Step 2: complete structured candidates with the secondary lookup
        if let Some(lookup) = &self.detail_lookup {
            if !results.is_empty() {
                if let Some(outcome) =
                    complete_candidates(lookup.as_ref(), &mut results, deadline).await
                {
                    outcomes.push(outcome);
                }
            }
        }

        // Step 3: scrapers, only when structured search found nothing
        if results.is_empty() {
            tracing::info!("No structured results for '{}', falling back to scrapers", query);
            results = self
                .search_scrapers(&terms[0], deadline, &mut outcomes, &mut sources_used)
                .await;
        }

        let results = dedupe(results);
        tracing::info!(
            "Search for '{}' returned {} result(s) from {:?}",
            query,
            results.len(),
            sources_used
        );

        Ok(SearchResponse {
            query: query.to_string(),
            count: results.len(),
            sources_used,
            results,
            outcomes,
        })
    }

    async fn search_structured(
        &self,
        terms: &[String],
        deadline: Instant,
        outcomes: &mut Vec<SourceOutcome>,
        sources_used: &mut Vec<String>,
    ) -> Vec<CandidateResult> {
        let cap = self.settings.search_result_cap;
        let providers: Vec<&Arc<dyn Provider>> = self
            .structured
            .iter()
            .filter(|p| p.supports_search())
            .collect();

        let attempts = join_all(providers.iter().map(|provider| async move {
            let mut attempts = Vec::with_capacity(terms.len());
            let mut found = 0usize;
            for term in terms {
                if found >= cap {
                    break;
                }
                let attempt = bounded(deadline, provider.search(term)).await;
                if let Ok(candidates) = &attempt {
                    found += candidates.len();
                }
                attempts.push(attempt);
            }
            attempts
        }))
        .await;

        let mut results: Vec<CandidateResult> = Vec::new();
        for (provider, provider_attempts) in providers.iter().zip(attempts) {
            let mut contributed = 0usize;
            let mut answered = false;
            let mut last_failure = None;

            for attempt in provider_attempts {
                match attempt {
                    Ok(candidates) => {
                        answered = true;
                        for candidate in candidates {
                            if contributed >= cap {
                                break;
                            }
                            let duplicate = candidate.has_identifier()
                                && results.iter().any(|r| r.identifier == candidate.identifier);
                            if duplicate {
                                continue;
                            }
                            results.push(candidate);
                            contributed += 1;
                        }
                    }
                    Err(failure) => {
                        tracing::warn!("⚠️  {} search failed: {}", provider.tag(), failure);
                        last_failure = Some(failure);
                    }
                }
            }

            match last_failure {
                Some(failure) if !answered => {
                    outcomes.push(SourceOutcome::failure(provider.tag(), &failure))
                }
                _ => outcomes.push(SourceOutcome::success(provider.tag(), contributed)),
            }
            if contributed > 0 {
                sources_used.push(provider.tag().to_string());
            }
        }

        results
    }

    async fn search_scrapers(
        &self,
        term: &str,
        deadline: Instant,
        outcomes: &mut Vec<SourceOutcome>,
        sources_used: &mut Vec<String>,
    ) -> Vec<CandidateResult> {
        for scraper in self.scrapers.iter().filter(|s| s.supports_search()) {
            match bounded(deadline, scraper.search(term)).await {
                Ok(candidates) if !candidates.is_empty() => {
                    tracing::info!(
                        "✓ {} yielded {} candidate(s)",
                        scraper.tag(),
                        candidates.len()
                    );
                    outcomes.push(SourceOutcome::success(scraper.tag(), candidates.len()));
                    sources_used.push(scraper.tag().to_string());
                    return candidates;
                }
                Ok(_) => {
                    tracing::info!("{} yielded no candidates", scraper.tag());
                    outcomes.push(SourceOutcome::success(scraper.tag(), 0));
                }
                Err(failure) => {
                    tracing::warn!("⚠️  {} failed: {}", scraper.tag(), failure);
                    outcomes.push(SourceOutcome::failure(scraper.tag(), &failure));
                }
            }
        }

        Vec::new()
    }
}

/// Fills municipality, state and status of candidates that carry a CNPJ.
/// A failed lookup leaves the candidate as it was.
///
/// Returns one outcome for the lookup provider, or `None` when no candidate
/// had an identifier to look up.
async fn complete_candidates(
    lookup: &dyn Provider,
    candidates: &mut [CandidateResult],
    deadline: Instant,
) -> Option<SourceOutcome> {
    let lookups = join_all(candidates.iter().map(|candidate| async move {
        let cnpj = Cnpj::parse(&candidate.identifier).ok()?;
        let result = bounded(deadline, lookup.fetch(&cnpj)).await;
        if let Err(failure) = &result {
            tracing::warn!("⚠️  {} lookup failed for {}: {}", lookup.tag(), cnpj, failure);
        }
        Some(result)
    }))
    .await;

    let attempted = lookups.iter().filter(|l| l.is_some()).count();
    let mut completed = 0usize;
    let mut last_failure = None;

    for (candidate, lookup_result) in candidates.iter_mut().zip(lookups) {
        let record = match lookup_result {
            Some(Ok(record)) => record,
            Some(Err(failure)) => {
                last_failure = Some(failure);
                continue;
            }
            None => continue,
        };
        completed += 1;
        let fill = |slot: &mut Option<String>, field| {
            if slot.is_none() {
                *slot = record.get(field).map(str::to_string);
            }
        };
        fill(&mut candidate.municipality, Field::Municipality);
        fill(&mut candidate.state, Field::State);
        fill(&mut candidate.status, Field::Status);
    }

    if attempted == 0 {
        return None;
    }

    let failed = attempted - completed;
    let mut outcome = match last_failure {
        Some(failure) if completed == 0 => SourceOutcome::failure(lookup.tag(), &failure),
        _ => SourceOutcome::success(lookup.tag(), completed),
    };
    if failed > 0 {
        outcome.detail = Some(format!(
            "{} of {} lookup(s) failed{}",
            failed,
            attempted,
            outcome
                .detail
                .as_deref()
                .map(|d| format!(": {}", d))
                .unwrap_or_default()
        ));
    }
    Some(outcome)
}
