use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::AppError;
use crate::provider::ProviderFailure;

// ============ Identifier ============

/// A normalized CNPJ: exactly 14 ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cnpj(String);

impl Cnpj {
    pub const LEN: usize = 14;

    /// Parses a raw identifier, accepting the punctuated `XX.XXX.XXX/XXXX-XX`
    /// shape as well as bare digits.
    ///
    /// Separators (`.`, `/`, `-`, whitespace) are dropped. Any other character
    /// or a digit count other than 14 is rejected.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut digits = String::with_capacity(Self::LEN);
        for c in raw.chars() {
            match c {
                '0'..='9' => digits.push(c),
                '.' | '/' | '-' => {}
                c if c.is_whitespace() => {}
                _ => return Err(AppError::InvalidIdentifier(raw.to_string())),
            }
        }

        if digits.len() != Self::LEN {
            return Err(AppError::InvalidIdentifier(raw.to_string()));
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the canonical punctuated shape, e.g. `12.345.678/0001-95`.
    pub fn formatted(&self) -> String {
        let d = &self.0;
        format!(
            "{}.{}.{}/{}-{}",
            &d[0..2],
            &d[2..5],
            &d[5..8],
            &d[8..12],
            &d[12..14]
        )
    }
}

impl fmt::Display for Cnpj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============ Partial records ============

/// Shared field vocabulary every provider schema is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    LegalName,
    TradeName,
    Status,
    OpeningDate,
    LegalNature,
    ActivityCode,
    ActivityDescription,
    CompanySize,
    Street,
    Number,
    Complement,
    District,
    Municipality,
    State,
    PostalCode,
    Email,
    Phone,
    ShareCapital,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::LegalName,
        Field::TradeName,
        Field::Status,
        Field::OpeningDate,
        Field::LegalNature,
        Field::ActivityCode,
        Field::ActivityDescription,
        Field::CompanySize,
        Field::Street,
        Field::Number,
        Field::Complement,
        Field::District,
        Field::Municipality,
        Field::State,
        Field::PostalCode,
        Field::Email,
        Field::Phone,
        Field::ShareCapital,
    ];
}

/// A company partner (QSA entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub name: String,
    pub role: Option<String>,
}

/// Fields produced by one provider for one identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    /// Tag of the provider that produced this record.
    pub source: String,
    pub fields: BTreeMap<Field, String>,
    pub partners: Vec<Partner>,
}

impl PartialRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Stores a value, ignoring `None` and blank strings.
    pub fn set(&mut self, field: Field, value: Option<String>) {
        if let Some(value) = value {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.fields.insert(field, trimmed.to_string());
            }
        }
    }

    /// Builder-style variant of [`PartialRecord::set`].
    pub fn with(mut self, field: Field, value: &str) -> Self {
        self.set(field, Some(value.to_string()));
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.partners.is_empty()
    }
}

// ============ Canonical record ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: Option<String>,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// The merged view of a company across every provider that answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub identifier: Cnpj,
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub status: Option<String>,
    pub opening_date: Option<String>,
    pub legal_nature: Option<String>,
    pub activity_code: Option<String>,
    pub activity_description: Option<String>,
    pub company_size: Option<String>,
    pub address: Address,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub share_capital: Option<String>,
    pub partners: Vec<Partner>,
    /// Providers that answered successfully, in priority order.
    pub sources: Vec<String>,
    /// Providers that supplied at least one field or the partner list.
    pub contributors: Vec<String>,
    /// Two or more providers answered.
    pub enriched: bool,
    #[serde(default)]
    pub outcomes: Vec<SourceOutcome>,
}

impl CanonicalRecord {
    pub fn from_fields(identifier: Cnpj, mut fields: BTreeMap<Field, String>) -> Self {
        let mut take = |field: Field| fields.remove(&field);

        Self {
            identifier,
            legal_name: take(Field::LegalName),
            trade_name: take(Field::TradeName),
            status: take(Field::Status),
            opening_date: take(Field::OpeningDate),
            legal_nature: take(Field::LegalNature),
            activity_code: take(Field::ActivityCode),
            activity_description: take(Field::ActivityDescription),
            company_size: take(Field::CompanySize),
            address: Address {
                street: take(Field::Street),
                number: take(Field::Number),
                complement: take(Field::Complement),
                district: take(Field::District),
                municipality: take(Field::Municipality),
                state: take(Field::State),
                postal_code: take(Field::PostalCode),
            },
            email: take(Field::Email),
            phone: take(Field::Phone),
            share_capital: take(Field::ShareCapital),
            partners: Vec::new(),
            sources: Vec::new(),
            contributors: Vec::new(),
            enriched: false,
            outcomes: Vec::new(),
        }
    }

    /// Reads a field back through the shared vocabulary.
    pub fn field(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::LegalName => &self.legal_name,
            Field::TradeName => &self.trade_name,
            Field::Status => &self.status,
            Field::OpeningDate => &self.opening_date,
            Field::LegalNature => &self.legal_nature,
            Field::ActivityCode => &self.activity_code,
            Field::ActivityDescription => &self.activity_description,
            Field::CompanySize => &self.company_size,
            Field::Street => &self.address.street,
            Field::Number => &self.address.number,
            Field::Complement => &self.address.complement,
            Field::District => &self.address.district,
            Field::Municipality => &self.address.municipality,
            Field::State => &self.address.state,
            Field::PostalCode => &self.address.postal_code,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::ShareCapital => &self.share_capital,
        };
        value.as_deref()
    }
}

// ============ Name search ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateMethod {
    Api,
    Scraping,
}

/// One company found by a name search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Normalized CNPJ, empty when the source did not expose one.
    pub identifier: String,
    pub legal_name: String,
    pub trade_name: String,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    /// Human-readable provenance label ("BrasilAPI", "Google Search", ...).
    pub source: String,
    pub method: CandidateMethod,
    pub snippet: Option<String>,
}

impl CandidateResult {
    pub fn new(source: impl Into<String>, method: CandidateMethod) -> Self {
        Self {
            identifier: String::new(),
            legal_name: String::new(),
            trade_name: String::new(),
            municipality: None,
            state: None,
            status: None,
            source: source.into(),
            method,
            snippet: None,
        }
    }

    pub fn has_identifier(&self) -> bool {
        !self.identifier.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub sources_used: Vec<String>,
    pub results: Vec<CandidateResult>,
    #[serde(default)]
    pub outcomes: Vec<SourceOutcome>,
}

// ============ Provenance ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// What one provider did during one request, recorded even when it
/// produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub status: OutcomeStatus,
    /// Failure reason code (`timeout`, `http_status`, ...).
    pub reason: Option<String>,
    pub detail: Option<String>,
    /// Records or candidates produced.
    pub items: usize,
}

impl SourceOutcome {
    pub fn success(source: impl Into<String>, items: usize) -> Self {
        Self {
            source: source.into(),
            status: OutcomeStatus::Success,
            reason: None,
            detail: None,
            items,
        }
    }

    pub fn failure(source: impl Into<String>, failure: &ProviderFailure) -> Self {
        Self {
            source: source.into(),
            status: OutcomeStatus::Failure,
            reason: Some(failure.code().to_string()),
            detail: Some(failure.to_string()),
            items: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}
