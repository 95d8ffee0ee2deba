//! Exact-match deduplication of name-search candidates.
use crate::models::CandidateResult;

fn names(candidate: &CandidateResult) -> impl Iterator<Item = &str> {
    [candidate.legal_name.trim(), candidate.trade_name.trim()]
        .into_iter()
        .filter(|name| !name.is_empty())
}

/// Whether two candidates refer to the same company.
///
/// Equal non-empty identifiers match. When either side lacks an identifier,
/// any exact (trimmed) equality between their legal or trade names matches.
/// Case and punctuation variants are treated as different companies.
pub fn same_entity(a: &CandidateResult, b: &CandidateResult) -> bool {
    if a.has_identifier() && b.has_identifier() {
        return a.identifier.trim() == b.identifier.trim();
    }

    names(a).any(|left| names(b).any(|right| left == right))
}

/// Drops every candidate that matches an earlier one, keeping order.
pub fn dedupe(candidates: Vec<CandidateResult>) -> Vec<CandidateResult> {
    let mut kept: Vec<CandidateResult> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if kept.iter().any(|existing| same_entity(existing, &candidate)) {
            tracing::debug!(
                "Dropping duplicate candidate '{}' ({})",
                candidate.legal_name,
                candidate.source
            );
            continue;
        }
        kept.push(candidate);
    }

    kept
}
