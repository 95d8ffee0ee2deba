//! First-writer-wins merge of partial records.
use std::collections::BTreeMap;

use crate::models::{CanonicalRecord, Cnpj, PartialRecord};

/// Merges partial records given in provider priority order.
///
/// For each field the first non-empty value wins and later records only fill
/// gaps. Partners come wholesale from the first record with a non-empty list.
/// The output depends only on the order of `records`.
pub fn merge(identifier: Cnpj, records: &[PartialRecord]) -> CanonicalRecord {
    let mut fields = BTreeMap::new();
    let mut partners = Vec::new();
    let mut sources = Vec::with_capacity(records.len());
    let mut contributors = Vec::new();

    for record in records {
        sources.push(record.source.clone());
        let mut contributed = false;

        for (field, value) in &record.fields {
            if value.trim().is_empty() || fields.contains_key(field) {
                continue;
            }
            fields.insert(*field, value.clone());
            contributed = true;
        }

        if partners.is_empty() && !record.partners.is_empty() {
            partners = record.partners.clone();
            contributed = true;
        }

        if contributed && !contributors.contains(&record.source) {
            contributors.push(record.source.clone());
        }
    }

    let mut canonical = CanonicalRecord::from_fields(identifier, fields);
    canonical.partners = partners;
    canonical.enriched = sources.len() >= 2;
    canonical.sources = sources;
    canonical.contributors = contributors;
    canonical
}
