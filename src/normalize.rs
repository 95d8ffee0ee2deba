//! Value normalization shared by the provider adapters and the name search.
use chrono::NaiveDate;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Trailing markers of Brazilian legal-entity types.
const CORPORATE_SUFFIXES: &[&str] = &[
    "LTDA", "LTDA-ME", "LTDA-EPP", "S/A", "SA", "S.A", "S/S", "ME", "EPP", "EIRELI", "MEI", "CIA",
];

/// Reads a JSON value as a trimmed, non-empty string. Numbers are rendered
/// with their JSON representation.
pub fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `data[key]` as text.
pub fn text(data: &Value, key: &str) -> Option<String> {
    value_text(data.get(key))
}

/// `data[outer][inner]` as text, for the nested schemas.
pub fn nested_text(data: &Value, outer: &str, inner: &str) -> Option<String> {
    value_text(data.get(outer).and_then(|v| v.get(inner)))
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Converts `YYYY-MM-DD` or `DD/MM/YYYY` into ISO format. Unknown shapes
/// are passed through untouched.
pub fn normalize_date(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let head = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%d/%m/%Y"))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok()
        .or(Some(raw))
}

fn thousands_regex() -> &'static Regex {
    static THOUSANDS: OnceLock<Regex> = OnceLock::new();
    THOUSANDS.get_or_init(|| {
        Regex::new(r"^\d{1,3}(\.\d{3})+$").expect("thousands pattern is a valid regex")
    })
}

/// Renders share capital with two decimals. Accepts `1000`, `"1000.00"`
/// and the Brazilian `"1.000,00"` and `"1.000"` notations.
pub fn normalize_capital(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let cleaned = raw.trim().trim_start_matches("R$").trim();
    let parsable = if cleaned.contains(',') || thousands_regex().is_match(cleaned) {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.to_string()
    };

    match parsable.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(format!("{:.2}", value)),
        _ => Some(raw),
    }
}

/// Validate and normalize Brazilian phone number
///
/// Uses phonenumber library (port of Google's libphonenumber) to:
/// - Parse phone number with Brazilian region (BR)
/// - Validate if it's a valid Brazilian number
/// - Return normalized E.164 format (+5511987654321)
///
/// Returns: (is_valid, normalized_phone_or_error_msg)
pub fn validate_br_phone(raw: &str) -> (bool, String) {
    if raw.trim().is_empty() || raw.len() < 8 {
        return (false, "Phone too short".to_string());
    }

    match phonenumber::parse(Some(CountryId::BR), raw) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("✓ Valid BR phone: {} → {}", raw, formatted);
                (true, formatted)
            } else {
                tracing::debug!("Invalid BR phone number: {}", raw);
                (false, "Invalid Brazilian phone number".to_string())
            }
        }
        Err(e) => {
            tracing::debug!("Failed to parse BR phone '{}': {:?}", raw, e);
            (false, format!("Parse error: {:?}", e))
        }
    }
}

/// E.164 when the number validates, bare digits otherwise. Numbers with
/// fewer than 8 digits are dropped.
pub fn normalize_phone(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let digits = digits_only(&raw);
    if digits.len() < 8 {
        return None;
    }

    let (is_valid, normalized) = validate_br_phone(&raw);
    if is_valid {
        Some(normalized)
    } else {
        Some(digits)
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email pattern is a valid regex")
    })
}

/// Validate email address
///
/// Checks for:
/// - Basic email format (contains @ and .)
/// - Fake/placeholder patterns (repeated digits like 9999, 1111)
/// - Minimum length requirements
/// - Valid domain structure
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    if let Some(pattern) = fake_patterns.iter().find(|p| email.contains(*p)) {
        tracing::debug!("Placeholder email (pattern '{}'): {}", pattern, email);
        return false;
    }

    email_regex().is_match(email)
}

/// Lowercased email, or `None` when it is missing or a placeholder.
pub fn normalize_email(raw: Option<String>) -> Option<String> {
    let email = raw?.trim().to_lowercase();
    is_valid_email(&email).then_some(email)
}

/// Removes trailing legal-entity markers: `"Acme Comercio LTDA - ME"` becomes
/// `"Acme Comercio"`.
pub fn strip_corporate_suffixes(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();

    while let Some(last) = tokens.last() {
        let marker = last.trim_end_matches([',', '.']).to_uppercase();
        let is_separator = marker.is_empty() || marker == "-" || marker == "&";
        if is_separator || CORPORATE_SUFFIXES.contains(&marker.as_str()) {
            tokens.pop();
        } else {
            break;
        }
    }

    tokens.join(" ")
}

/// One or two search terms for a name query: the query itself and, when it
/// differs and is still long enough, the query without corporate suffixes.
pub fn search_terms(query: &str, min_len: usize) -> Vec<String> {
    let primary = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut terms = vec![primary.clone()];

    let stripped = strip_corporate_suffixes(&primary);
    if stripped != primary && stripped.chars().count() >= min_len {
        terms.push(stripped);
    }

    terms
}
