//! Best-effort extraction of company names and CNPJs from search-engine HTML.
//!
//! Names and identifiers are extracted independently and then paired by
//! position: the n-th accepted name gets the n-th distinct CNPJ found on the
//! page. Nothing guarantees the paired CNPJ belongs to that name.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::models::{CandidateMethod, CandidateResult};
use crate::normalize::digits_only;

const MIN_NAME_CHARS: usize = 5;
const MAX_NAME_CHARS: usize = 150;
const MAX_SNIPPET_CHARS: usize = 200;

/// Headings used when a page has none of the expected result containers.
const FALLBACK_HEADINGS: &str = "h1, h2, h3";

/// Navigation and chrome text that search pages render as headings.
const BOILERPLATE: &[&str] = &[
    "todas",
    "imagens",
    "vídeos",
    "videos",
    "notícias",
    "noticias",
    "shopping",
    "mapas",
    "maps",
    "mais",
    "ferramentas",
    "images",
    "news",
    "more",
    "tools",
    "sign in",
    "fazer login",
    "próxima",
    "proxima",
    "anterior",
    "next",
    "previous",
    "pesquisas relacionadas",
    "related searches",
    "people also ask",
    "as pessoas também perguntam",
    "resultados da web",
    "web results",
    "search results",
    "resultados da pesquisa",
    "no results found",
    "nenhum resultado encontrado",
];

/// Where a search engine puts its organic results.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRules {
    pub result_selector: &'static str,
    pub title_selector: &'static str,
    pub snippet_selector: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionOptions {
    /// Maximum names kept per page.
    pub max_names: usize,
    /// Only keep names containing the search term (case-insensitive).
    pub require_query_match: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            max_names: 3,
            require_query_match: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedName {
    pub title: String,
    pub snippet: Option<String>,
}

fn cnpj_regex() -> &'static Regex {
    static CNPJ: OnceLock<Regex> = OnceLock::new();
    CNPJ.get_or_init(|| {
        Regex::new(r"\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}").expect("CNPJ pattern is a valid regex")
    })
}

/// Every punctuated CNPJ in `text`, normalized to digits, first-seen order,
/// without duplicates. Matches glued to a longer digit run are skipped.
pub fn extract_identifiers(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let is_digit_at = |i: usize| bytes.get(i).is_some_and(u8::is_ascii_digit);

    let mut seen = HashSet::new();
    cnpj_regex()
        .find_iter(text)
        .filter(|m| !(m.start() > 0 && is_digit_at(m.start() - 1)) && !is_digit_at(m.end()))
        .map(|m| digits_only(m.as_str()))
        .filter(|cnpj| seen.insert(cnpj.clone()))
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_boilerplate(text: &str) -> bool {
    let lowered = text.to_lowercase();
    BOILERPLATE.contains(&lowered.as_str())
}

fn accept_name(title: &str, query: Option<&str>, options: &ExtractionOptions) -> bool {
    let len = title.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) || is_boilerplate(title) {
        return false;
    }

    match query {
        Some(term) if options.require_query_match => {
            title.to_lowercase().contains(&term.trim().to_lowercase())
        }
        _ => true,
    }
}

fn truncate_snippet(snippet: &str) -> String {
    if snippet.chars().count() > MAX_SNIPPET_CHARS {
        let head: String = snippet.chars().take(MAX_SNIPPET_CHARS).collect();
        format!("{}...", head)
    } else {
        snippet.to_string()
    }
}

/// Candidate company names from a parsed page.
///
/// Result containers from `rules` are scanned first; when the page has none,
/// plain headings are used instead.
pub fn extract_names(
    document: &Html,
    rules: &ExtractionRules,
    query: Option<&str>,
    options: &ExtractionOptions,
) -> Vec<ExtractedName> {
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse(rules.result_selector),
        Selector::parse(rules.title_selector),
        Selector::parse(rules.snippet_selector),
    ) else {
        tracing::warn!("Invalid extraction selectors: {:?}", rules);
        return Vec::new();
    };

    let mut names = Vec::new();
    let mut containers = 0usize;

    for result in document.select(&result_sel) {
        containers += 1;
        if names.len() >= options.max_names {
            break;
        }

        let Some(title) = result.select(&title_sel).next().map(element_text) else {
            continue;
        };
        if !accept_name(&title, query, options) {
            continue;
        }

        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(element_text)
            .filter(|s| !s.is_empty())
            .map(|s| truncate_snippet(&s));

        names.push(ExtractedName { title, snippet });
    }

    if containers == 0 {
        if let Ok(heading_sel) = Selector::parse(FALLBACK_HEADINGS) {
            names.extend(
                document
                    .select(&heading_sel)
                    .map(element_text)
                    .filter(|title| accept_name(title, query, options))
                    .take(options.max_names)
                    .map(|title| ExtractedName {
                        title,
                        snippet: None,
                    }),
            );
        }
    }

    names
}

/// Runs both extractions over a raw page and pairs the results
/// positionally into candidates.
pub fn extract_candidates(
    body: &str,
    rules: &ExtractionRules,
    query: Option<&str>,
    options: &ExtractionOptions,
    source_label: &str,
) -> Vec<CandidateResult> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let identifiers = extract_identifiers(body);
    let names = {
        let document = Html::parse_document(body);
        extract_names(&document, rules, query, options)
    };

    tracing::debug!(
        "{}: extracted {} name(s) and {} identifier(s)",
        source_label,
        names.len(),
        identifiers.len()
    );

    let mut identifiers = identifiers.into_iter();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = CandidateResult::new(source_label, CandidateMethod::Scraping);
            candidate.identifier = identifiers.next().unwrap_or_default();
            candidate.legal_name = name.title.clone();
            candidate.trade_name = name.title;
            candidate.snippet = name.snippet;
            candidate
        })
        .collect()
}
