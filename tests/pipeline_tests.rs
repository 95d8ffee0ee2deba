/// Cascade tests for the enrichment pipeline
/// Uses in-process fake providers so ordering, fallback and timeout behavior
/// can be checked without any network
use async_trait::async_trait;
use cnpj_finder::enrichment::{EnrichmentPipeline, PipelineSettings};
use cnpj_finder::errors::AppError;
use cnpj_finder::models::{
    CandidateMethod, CandidateResult, Cnpj, Field, OutcomeStatus, PartialRecord,
};
use cnpj_finder::provider::{Provider, ProviderFailure, ProviderKind, ProviderResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CNPJ: &str = "12.345.678/0001-95";

struct FakeProvider {
    tag: &'static str,
    kind: ProviderKind,
    fetch: Option<ProviderResult<PartialRecord>>,
    search: Option<ProviderResult<Vec<CandidateResult>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn structured(tag: &'static str) -> Self {
        Self {
            tag,
            kind: ProviderKind::Structured,
            fetch: None,
            search: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn scraper(tag: &'static str, result: ProviderResult<Vec<CandidateResult>>) -> Self {
        Self {
            kind: ProviderKind::Scrape,
            search: Some(result),
            ..Self::structured(tag)
        }
    }

    fn fetching(mut self, result: ProviderResult<PartialRecord>) -> Self {
        self.fetch = Some(result);
        self
    }

    fn searching(mut self, result: ProviderResult<Vec<CandidateResult>>) -> Self {
        self.search = Some(result);
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn tag(&self) -> &'static str {
        self.tag
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn supports_fetch(&self) -> bool {
        self.fetch.is_some()
    }

    fn supports_search(&self) -> bool {
        self.search.is_some()
    }

    async fn fetch(&self, _cnpj: &Cnpj) -> ProviderResult<PartialRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.fetch.clone().unwrap_or(Err(ProviderFailure::Unsupported))
    }

    async fn search(&self, _query: &str) -> ProviderResult<Vec<CandidateResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.search.clone().unwrap_or(Err(ProviderFailure::Unsupported))
    }
}

fn candidate(source: &str, identifier: &str, name: &str) -> CandidateResult {
    let mut c = CandidateResult::new(source, CandidateMethod::Api);
    c.identifier = identifier.to_string();
    c.legal_name = name.to_string();
    c
}

fn scraped(identifier: &str, name: &str) -> CandidateResult {
    let mut c = CandidateResult::new("Scraped", CandidateMethod::Scraping);
    c.identifier = identifier.to_string();
    c.legal_name = name.to_string();
    c.trade_name = name.to_string();
    c
}

fn pipeline(
    structured: Vec<Arc<FakeProvider>>,
    detail_lookup: Option<Arc<FakeProvider>>,
    scrapers: Vec<Arc<FakeProvider>>,
) -> EnrichmentPipeline {
    pipeline_with(PipelineSettings::default(), structured, detail_lookup, scrapers)
}

fn pipeline_with(
    settings: PipelineSettings,
    structured: Vec<Arc<FakeProvider>>,
    detail_lookup: Option<Arc<FakeProvider>>,
    scrapers: Vec<Arc<FakeProvider>>,
) -> EnrichmentPipeline {
    let erase = |p: Arc<FakeProvider>| -> Arc<dyn Provider> { p };
    EnrichmentPipeline::new(
        settings,
        structured.into_iter().map(erase).collect(),
        detail_lookup.map(erase),
        scrapers.into_iter().map(erase).collect(),
    )
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_identifier_makes_no_calls() {
        let a = Arc::new(
            FakeProvider::structured("a").fetching(Ok(PartialRecord::new("a"))),
        );
        let p = pipeline(vec![a.clone()], None, vec![]);

        for raw in ["123", "12.345.678/0001-9X", "", "1234567800019512"] {
            let err = p.resolve(raw).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidIdentifier(_)), "{raw}");
        }
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_first_writer_wins_in_priority_order() {
        // The primary answers last; its values must still win
        let a = Arc::new(
            FakeProvider::structured("a")
                .fetching(Ok(PartialRecord::new("a").with(Field::LegalName, "Acme Ltda")))
                .delayed(Duration::from_millis(50)),
        );
        let b = Arc::new(FakeProvider::structured("b").fetching(Ok(PartialRecord::new("b")
            .with(Field::LegalName, "Acme Corp")
            .with(Field::Email, "x@acme.com"))));
        let p = pipeline(vec![a.clone(), b.clone()], None, vec![]);

        let record = p.resolve(CNPJ).await.unwrap();
        assert_eq!(record.identifier.as_str(), "12345678000195");
        assert_eq!(record.legal_name.as_deref(), Some("Acme Ltda"));
        assert_eq!(record.email.as_deref(), Some("x@acme.com"));
        assert_eq!(record.sources, vec!["a", "b"]);
        assert!(record.enriched);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_tag_overrides_record_source() {
        let a = Arc::new(FakeProvider::structured("a").fetching(Ok(
            PartialRecord::new("something_else").with(Field::TradeName, "Acme"),
        )));
        let p = pipeline(vec![a], None, vec![]);

        let record = p.resolve(CNPJ).await.unwrap();
        assert_eq!(record.sources, vec!["a"]);
        assert_eq!(record.contributors, vec!["a"]);
    }

    #[tokio::test]
    async fn test_single_success_is_not_enriched() {
        let a = Arc::new(
            FakeProvider::structured("a").fetching(Err(ProviderFailure::HttpStatus(503))),
        );
        let b = Arc::new(
            FakeProvider::structured("b")
                .fetching(Ok(PartialRecord::new("b").with(Field::LegalName, "Acme Ltda"))),
        );
        let p = pipeline(vec![a, b], None, vec![]);

        let record = p.resolve(CNPJ).await.unwrap();
        assert!(!record.enriched);
        assert_eq!(record.sources, vec!["b"]);
        assert_eq!(record.outcomes.len(), 2);
        assert_eq!(record.outcomes[0].status, OutcomeStatus::Failure);
        assert_eq!(record.outcomes[0].reason.as_deref(), Some("http_status"));
        assert!(record.outcomes[1].is_success());
    }

    #[tokio::test]
    async fn test_all_failures_is_not_found() {
        let a = Arc::new(FakeProvider::structured("a").fetching(Err(ProviderFailure::Timeout)));
        let b = Arc::new(FakeProvider::structured("b").fetching(Err(
            ProviderFailure::Decode("bad".to_string()),
        )));
        let p = pipeline(vec![a, b], None, vec![]);

        let err = p.resolve("12345678000195").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_request_deadline_cuts_off_slow_provider() {
        let settings = PipelineSettings {
            request_timeout: Duration::from_millis(100),
            ..PipelineSettings::default()
        };
        let fast = Arc::new(
            FakeProvider::structured("fast")
                .fetching(Ok(PartialRecord::new("fast").with(Field::LegalName, "Acme Ltda"))),
        );
        let slow = Arc::new(
            FakeProvider::structured("slow")
                .fetching(Ok(PartialRecord::new("slow").with(Field::Email, "x@acme.com")))
                .delayed(Duration::from_secs(5)),
        );
        let p = pipeline_with(settings, vec![slow, fast], None, vec![]);

        let started = std::time::Instant::now();
        let record = p.resolve(CNPJ).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(record.sources, vec!["fast"]);
        assert_eq!(record.email, None);
        assert_eq!(record.outcomes[0].source, "slow");
        assert_eq!(record.outcomes[0].reason.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_search_only_providers_are_not_fetched() {
        let search_only = Arc::new(FakeProvider::structured("search").searching(Ok(vec![])));
        let a = Arc::new(
            FakeProvider::structured("a")
                .fetching(Ok(PartialRecord::new("a").with(Field::LegalName, "Acme Ltda"))),
        );
        let p = pipeline(vec![search_only.clone(), a], None, vec![]);

        let record = p.resolve(CNPJ).await.unwrap();
        assert_eq!(record.outcomes.len(), 1);
        assert_eq!(search_only.calls(), 0);
    }
}

#[cfg(test)]
mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_query_too_short_makes_no_calls() {
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![])));
        let p = pipeline(vec![api.clone()], None, vec![]);

        let err = p.search_by_name("  ab  ").await.unwrap_err();
        assert_eq!(err, AppError::QueryTooShort { min: 3, actual: 2 });
        assert_eq!(api.calls(), 0);

        let response = p.search_by_name("abc").await.unwrap();
        assert_eq!(response.query, "abc");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_structured_results_skip_scrapers() {
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![candidate(
            "BrasilAPI",
            "12345678000195",
            "Acme Comercio Ltda",
        )])));
        let google = Arc::new(FakeProvider::scraper(
            "google",
            Ok(vec![scraped("", "Acme Comercio Ltda")]),
        ));
        let p = pipeline(vec![api], None, vec![google.clone()]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.sources_used, vec!["api"]);
        assert_eq!(response.results[0].method, CandidateMethod::Api);
        assert_eq!(google.calls(), 0);
    }

    #[tokio::test]
    async fn test_suffix_stripped_term_is_tried_and_duplicates_skipped() {
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![candidate(
            "BrasilAPI",
            "12345678000195",
            "Acme Comercio Ltda",
        )])));
        let p = pipeline(vec![api.clone()], None, vec![]);

        let response = p.search_by_name("Acme Comercio Ltda").await.unwrap();
        // "Acme Comercio Ltda" then "Acme Comercio"
        assert_eq!(api.calls(), 2);
        assert_eq!(response.count, 1);
        assert_eq!(response.outcomes[0].items, 1);
    }

    #[tokio::test]
    async fn test_per_provider_cap() {
        let many: Vec<_> = (0..8)
            .map(|i| candidate("BrasilAPI", &format!("1234567800{:04}", i), &format!("Acme {}", i)))
            .collect();
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(many)));
        let settings = PipelineSettings {
            search_result_cap: 3,
            ..PipelineSettings::default()
        };
        let p = pipeline_with(settings, vec![api.clone()], None, vec![]);

        let response = p.search_by_name("Acme Ltda").await.unwrap();
        assert_eq!(response.count, 3);
        // Cap reached on the first term, the stripped term is not tried
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_detail_lookup_fills_missing_fields_only() {
        let mut found = candidate("BrasilAPI", "12345678000195", "Acme Comercio Ltda");
        found.state = Some("SP".to_string());
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![found])));
        let lookup = Arc::new(FakeProvider::structured("lookup").fetching(Ok(
            PartialRecord::new("lookup")
                .with(Field::Municipality, "SAO PAULO")
                .with(Field::State, "RJ")
                .with(Field::Status, "ATIVA"),
        )));
        let p = pipeline(vec![api], Some(lookup.clone()), vec![]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        let result = &response.results[0];
        assert_eq!(result.municipality.as_deref(), Some("SAO PAULO"));
        assert_eq!(result.state.as_deref(), Some("SP"));
        assert_eq!(result.status.as_deref(), Some("ATIVA"));
        assert_eq!(lookup.calls(), 1);
        // The lookup is a completion step, not a listed source
        assert_eq!(response.sources_used, vec!["api"]);

        let outcome = response.outcomes.last().unwrap();
        assert_eq!(outcome.source, "lookup");
        assert!(outcome.is_success());
        assert_eq!(outcome.items, 1);
        assert_eq!(outcome.detail, None);
    }

    #[tokio::test]
    async fn test_failed_detail_lookup_keeps_candidate() {
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![
            candidate("BrasilAPI", "12345678000195", "Acme Comercio Ltda"),
            candidate("BrasilAPI", "", "Acme Sem Cnpj"),
        ])));
        let lookup = Arc::new(
            FakeProvider::structured("lookup").fetching(Err(ProviderFailure::HttpStatus(404))),
        );
        let p = pipeline(vec![api], Some(lookup.clone()), vec![]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(response.count, 2);
        assert_eq!(response.results[0].municipality, None);
        // Candidates without an identifier are never looked up
        assert_eq!(lookup.calls(), 1);

        let outcome = response.outcomes.last().unwrap();
        assert_eq!(outcome.source, "lookup");
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert_eq!(outcome.reason.as_deref(), Some("http_status"));
        assert!(outcome
            .detail
            .as_deref()
            .is_some_and(|d| d.starts_with("1 of 1 lookup(s) failed")));
    }

    #[tokio::test]
    async fn test_no_lookup_outcome_without_identifiers() {
        let api = Arc::new(
            FakeProvider::structured("api")
                .searching(Ok(vec![candidate("BrasilAPI", "", "Acme Sem Cnpj")])),
        );
        let lookup = Arc::new(
            FakeProvider::structured("lookup").fetching(Ok(PartialRecord::new("lookup"))),
        );
        let p = pipeline(vec![api], Some(lookup.clone()), vec![]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(lookup.calls(), 0);
        assert!(response.outcomes.iter().all(|o| o.source != "lookup"));
    }

    #[tokio::test]
    async fn test_scrape_cascade_stops_at_first_yield() {
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![])));
        let google = Arc::new(FakeProvider::scraper(
            "google",
            Err(ProviderFailure::HttpStatus(429)),
        ));
        let bing = Arc::new(FakeProvider::scraper("bing", Ok(vec![])));
        let ddg = Arc::new(FakeProvider::scraper(
            "ddg",
            Ok(vec![scraped("12345678000195", "Acme Comercio Ltda")]),
        ));
        let spare = Arc::new(FakeProvider::scraper(
            "spare",
            Ok(vec![scraped("", "Never Reached Ltda")]),
        ));
        let p = pipeline(
            vec![api],
            None,
            vec![google.clone(), bing.clone(), ddg.clone(), spare.clone()],
        );

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.sources_used, vec!["ddg"]);
        assert_eq!(response.results[0].method, CandidateMethod::Scraping);
        assert_eq!((google.calls(), bing.calls(), ddg.calls()), (1, 1, 1));
        assert_eq!(spare.calls(), 0);

        let tags: Vec<_> = response.outcomes.iter().map(|o| o.source.as_str()).collect();
        assert_eq!(tags, vec!["api", "google", "bing", "ddg"]);
        assert_eq!(response.outcomes[1].reason.as_deref(), Some("http_status"));
    }

    #[tokio::test]
    async fn test_scraped_duplicates_are_collapsed() {
        let google = Arc::new(FakeProvider::scraper(
            "google",
            Ok(vec![
                scraped("12345678000195", "Acme Comercio Ltda"),
                scraped("", "Acme Comercio Ltda"),
                scraped("98765432000110", "Outra Empresa SA"),
            ]),
        ));
        let p = pipeline(vec![], None, vec![google]);

        let response = p.search_by_name("Acme").await.unwrap();
        assert_eq!(response.count, 2);
        assert_eq!(response.results.len(), response.count);
    }

    #[tokio::test]
    async fn test_all_failures_return_empty_response() {
        let api = Arc::new(
            FakeProvider::structured("api").searching(Err(ProviderFailure::Timeout)),
        );
        let google = Arc::new(FakeProvider::scraper(
            "google",
            Err(ProviderFailure::Transport("connection refused".to_string())),
        ));
        let p = pipeline(vec![api], None, vec![google]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(response.count, 0);
        assert!(response.results.is_empty());
        assert!(response.sources_used.is_empty());
        assert!(response.outcomes.iter().all(|o| !o.is_success()));
    }

    #[tokio::test]
    async fn test_search_deadline_applies_to_scrapers() {
        let settings = PipelineSettings {
            request_timeout: Duration::from_millis(100),
            ..PipelineSettings::default()
        };
        let google = Arc::new(
            FakeProvider::scraper("google", Ok(vec![scraped("", "Acme Comercio Ltda")]))
                .delayed(Duration::from_secs(5)),
        );
        let p = pipeline_with(settings, vec![], None, vec![google]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(response.count, 0);
        assert_eq!(response.outcomes[0].reason.as_deref(), Some("timeout"));
    }
}

#[cfg(test)]
mod routing_tests {
    use super::*;

    #[tokio::test]
    async fn test_scraper_in_structured_list_never_resolves() {
        let misfiled = Arc::new(
            FakeProvider::scraper("google", Ok(vec![scraped("", "Acme Comercio Ltda")]))
                .fetching(Ok(
                    PartialRecord::new("google").with(Field::LegalName, "From a scraper")
                )),
        );
        let p = pipeline(vec![misfiled.clone()], None, vec![]);

        let err = p.resolve(CNPJ).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(misfiled.calls(), 0);
    }

    #[tokio::test]
    async fn test_scraper_in_structured_list_runs_only_as_fallback() {
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![candidate(
            "BrasilAPI",
            "12345678000195",
            "Acme Comercio Ltda",
        )])));
        let misfiled = Arc::new(FakeProvider::scraper(
            "google",
            Ok(vec![scraped("", "Scraped Name Ltda")]),
        ));
        let p = pipeline(vec![misfiled.clone(), api], None, vec![]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(response.sources_used, vec!["api"]);
        assert_eq!(misfiled.calls(), 0);

        let empty_api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![])));
        let p = pipeline(vec![misfiled.clone(), empty_api], None, vec![]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(response.sources_used, vec!["google"]);
        assert_eq!(response.results[0].method, CandidateMethod::Scraping);
        let tags: Vec<_> = response.outcomes.iter().map(|o| o.source.as_str()).collect();
        assert_eq!(tags, vec!["api", "google"]);
    }

    #[tokio::test]
    async fn test_structured_provider_in_scraper_list_is_promoted() {
        let registry = Arc::new(
            FakeProvider::structured("registry")
                .fetching(Ok(PartialRecord::new("registry").with(Field::LegalName, "Acme Ltda")))
                .searching(Ok(vec![candidate("Registry", "12345678000195", "Acme Ltda")])),
        );
        let google = Arc::new(FakeProvider::scraper(
            "google",
            Ok(vec![scraped("", "Scraped Name Ltda")]),
        ));
        let p = pipeline(vec![], None, vec![registry.clone(), google.clone()]);

        let record = p.resolve(CNPJ).await.unwrap();
        assert_eq!(record.sources, vec!["registry"]);

        let response = p.search_by_name("Acme").await.unwrap();
        assert_eq!(response.sources_used, vec!["registry"]);
        assert_eq!(google.calls(), 0);
    }

    #[tokio::test]
    async fn test_scraper_is_never_a_detail_lookup() {
        let api = Arc::new(FakeProvider::structured("api").searching(Ok(vec![candidate(
            "BrasilAPI",
            "12345678000195",
            "Acme Comercio Ltda",
        )])));
        let scraper_lookup = Arc::new(
            FakeProvider::scraper("google", Ok(vec![]))
                .fetching(Ok(PartialRecord::new("google").with(Field::State, "SP"))),
        );
        let p = pipeline(vec![api], Some(scraper_lookup.clone()), vec![]);

        let response = p.search_by_name("Acme Comercio").await.unwrap();
        assert_eq!(response.results[0].state, None);
        assert_eq!(scraper_lookup.calls(), 0);
    }
}
