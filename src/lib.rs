//! CNPJ Finder Library
//!
//! Resolves Brazilian company identifiers (CNPJ) and company names into
//! consolidated company records by querying several public registries,
//! falling back to search-engine scraping when no registry knows the name.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `dedup`: Exact-match deduplication of search candidates.
//! - `enrichment`: Provider cascade (resolve and name search).
//! - `errors`: Error handling types.
//! - `extraction`: HTML result extraction for scrapers.
//! - `handlers`: HTTP request handlers.
//! - `merge`: First-writer-wins merge of partial records.
//! - `models`: Core data models.
//! - `normalize`: Field normalization helpers.
//! - `provider`: Provider trait and failure taxonomy.
//! - `scrapers`: Search-engine scraper adapters.
//! - `services`: Structured registry API clients.

pub mod config;
pub mod dedup;
pub mod enrichment;
pub mod errors;
pub mod extraction;
pub mod handlers;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod scrapers;
pub mod services;
