//! Structured (JSON API) provider adapters.
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::errors::AppError;
use crate::models::{CandidateMethod, CandidateResult, Cnpj, Field, PartialRecord, Partner};
use crate::normalize::{
    digits_only, nested_text, normalize_capital, normalize_date, normalize_email,
    normalize_phone, text,
};
use crate::provider::{Provider, ProviderFailure, ProviderKind, ProviderResult};

pub const BRASILAPI_TAG: &str = "receita_federal";
pub const MINHA_RECEITA_TAG: &str = "minha_receita";
pub const CNPJ_WS_TAG: &str = "cnpj_ws";

/// Builds the HTTP client used by one adapter.
pub fn build_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::InternalError(format!("Failed to create HTTP client: {}", e)))
}

/// Issues one GET, requires 200 and decodes the body as JSON.
async fn get_json(client: &Client, url: reqwest::Url, source: &str) -> ProviderResult<Value> {
    tracing::debug!("{} GET {}", source, url);

    let response = client.get(url).send().await.map_err(|e| {
        tracing::warn!("{} request failed: {}", source, e);
        ProviderFailure::from(e)
    })?;

    if response.status() != reqwest::StatusCode::OK {
        let status = response.status();
        tracing::warn!("{} returned status {}", source, status);
        return Err(ProviderFailure::HttpStatus(status.as_u16()));
    }

    let body = response.text().await.map_err(ProviderFailure::from)?;
    serde_json::from_str(&body).map_err(|e| {
        tracing::warn!("Failed to parse {} response: {}", source, e);
        ProviderFailure::Decode(e.to_string())
    })
}

fn endpoint(base_url: &str, segments: &[&str]) -> ProviderResult<reqwest::Url> {
    let mut url = reqwest::Url::parse(base_url)
        .map_err(|e| ProviderFailure::Transport(format!("Invalid base URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| ProviderFailure::Transport(format!("Base URL cannot be a base: {}", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Maps the Receita Federal schema shared by BrasilAPI and Minha Receita.
pub fn map_receita_schema(source: &str, data: &Value) -> PartialRecord {
    let mut record = PartialRecord::new(source);

    record.set(Field::LegalName, text(data, "razao_social"));
    record.set(Field::TradeName, text(data, "nome_fantasia"));
    record.set(
        Field::Status,
        text(data, "descricao_situacao_cadastral").or_else(|| text(data, "situacao")),
    );
    record.set(
        Field::OpeningDate,
        normalize_date(text(data, "data_inicio_atividade")),
    );
    record.set(Field::LegalNature, text(data, "natureza_juridica"));
    record.set(Field::ActivityCode, text(data, "cnae_fiscal"));
    record.set(Field::ActivityDescription, text(data, "cnae_fiscal_descricao"));
    record.set(Field::CompanySize, text(data, "porte"));
    record.set(
        Field::Street,
        match (text(data, "descricao_tipo_de_logradouro"), text(data, "logradouro")) {
            (Some(kind), Some(street)) if !street.starts_with(&kind) => {
                Some(format!("{} {}", kind, street))
            }
            (_, street) => street,
        },
    );
    record.set(Field::Number, text(data, "numero"));
    record.set(Field::Complement, text(data, "complemento"));
    record.set(Field::District, text(data, "bairro"));
    record.set(Field::Municipality, text(data, "municipio"));
    record.set(Field::State, text(data, "uf"));
    record.set(Field::PostalCode, text(data, "cep").map(|cep| digits_only(&cep)));
    record.set(Field::Email, normalize_email(text(data, "email")));
    record.set(
        Field::Phone,
        normalize_phone(text(data, "ddd_telefone_1").or_else(|| text(data, "telefone"))),
    );
    record.set(Field::ShareCapital, normalize_capital(text(data, "capital_social")));

    if let Some(qsa) = data.get("qsa").and_then(|v| v.as_array()) {
        record.partners = qsa
            .iter()
            .filter_map(|partner| {
                Some(Partner {
                    name: text(partner, "nome_socio")?,
                    role: text(partner, "qualificacao_socio"),
                })
            })
            .collect();
    }

    record
}

/// Maps the nested CNPJ.ws schema.
pub fn map_cnpj_ws_schema(data: &Value) -> PartialRecord {
    let mut record = PartialRecord::new(CNPJ_WS_TAG);

    record.set(Field::LegalName, text(data, "razao_social"));
    record.set(
        Field::LegalNature,
        nested_text(data, "natureza_juridica", "descricao"),
    );
    record.set(Field::CompanySize, nested_text(data, "porte", "descricao"));
    record.set(Field::ShareCapital, normalize_capital(text(data, "capital_social")));

    if let Some(est) = data.get("estabelecimento") {
        record.set(Field::TradeName, text(est, "nome_fantasia"));
        record.set(Field::Status, text(est, "situacao_cadastral"));
        record.set(
            Field::OpeningDate,
            normalize_date(text(est, "data_inicio_atividade")),
        );
        record.set(
            Field::ActivityCode,
            nested_text(est, "atividade_principal", "id")
                .or_else(|| nested_text(est, "atividade_principal", "subclasse")),
        );
        record.set(
            Field::ActivityDescription,
            nested_text(est, "atividade_principal", "descricao"),
        );
        record.set(
            Field::Street,
            match (text(est, "tipo_logradouro"), text(est, "logradouro")) {
                (Some(kind), Some(street)) => Some(format!("{} {}", kind, street)),
                (_, street) => street,
            },
        );
        record.set(Field::Number, text(est, "numero"));
        record.set(Field::Complement, text(est, "complemento"));
        record.set(Field::District, text(est, "bairro"));
        record.set(Field::Municipality, nested_text(est, "cidade", "nome"));
        record.set(Field::State, nested_text(est, "estado", "sigla"));
        record.set(Field::PostalCode, text(est, "cep").map(|cep| digits_only(&cep)));
        record.set(Field::Email, normalize_email(text(est, "email")));

        let phone = match (text(est, "ddd1"), text(est, "telefone1")) {
            (Some(ddd), Some(number)) => Some(format!("{}{}", ddd, number)),
            (None, number) => number,
            (Some(_), None) => None,
        };
        record.set(Field::Phone, normalize_phone(phone));
    }

    if let Some(socios) = data.get("socios").and_then(|v| v.as_array()) {
        record.partners = socios
            .iter()
            .filter_map(|socio| {
                Some(Partner {
                    name: text(socio, "nome")?,
                    role: nested_text(socio, "qualificacao_socio", "descricao"),
                })
            })
            .collect();
    }

    record
}

// ============ BrasilAPI ============

/// BrasilAPI, the Receita Federal mirror. Primary source for lookups and the
/// only structured source with a name search.
pub struct BrasilApiService {
    client: Client,
    base_url: String,
}

impl BrasilApiService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    fn map_search_item(item: &Value) -> CandidateResult {
        let mut candidate = CandidateResult::new("BrasilAPI", CandidateMethod::Api);
        candidate.identifier = text(item, "cnpj")
            .map(|cnpj| digits_only(&cnpj))
            .unwrap_or_default();
        candidate.legal_name = text(item, "razao_social").unwrap_or_default();
        candidate.trade_name = text(item, "nome_fantasia").unwrap_or_default();
        candidate.municipality = text(item, "municipio");
        candidate.state = text(item, "uf");
        candidate.status =
            text(item, "descricao_situacao_cadastral").or_else(|| text(item, "situacao"));
        candidate
    }
}

#[async_trait]
impl Provider for BrasilApiService {
    fn tag(&self) -> &'static str {
        BRASILAPI_TAG
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Structured
    }

    fn supports_fetch(&self) -> bool {
        true
    }

    fn supports_search(&self) -> bool {
        true
    }

    async fn fetch(&self, cnpj: &Cnpj) -> ProviderResult<PartialRecord> {
        let url = endpoint(&self.base_url, &["api", "cnpj", "v1", cnpj.as_str()])?;
        tracing::info!("BrasilAPI: fetching CNPJ {}", cnpj);

        let data = get_json(&self.client, url, "BrasilAPI").await?;
        Ok(map_receita_schema(BRASILAPI_TAG, &data))
    }

    async fn search(&self, query: &str) -> ProviderResult<Vec<CandidateResult>> {
        let mut url = endpoint(&self.base_url, &["api", "cnpj", "v1", "empresas"])?;
        url.query_pairs_mut().append_pair("q", query);
        tracing::info!("BrasilAPI: searching companies by name: {}", query);

        let data = get_json(&self.client, url, "BrasilAPI").await?;
        let items = data
            .as_array()
            .ok_or_else(|| ProviderFailure::Decode("expected a JSON array".to_string()))?;

        let candidates: Vec<CandidateResult> = items.iter().map(Self::map_search_item).collect();
        tracing::info!(
            "BrasilAPI: found {} candidate(s) for '{}'",
            candidates.len(),
            query
        );
        Ok(candidates)
    }
}

// ============ Minha Receita ============

/// Minha Receita, an alternate Receita Federal mirror. Also serves the
/// secondary lookup that completes name-search candidates.
pub struct MinhaReceitaService {
    client: Client,
    base_url: String,
}

impl MinhaReceitaService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Provider for MinhaReceitaService {
    fn tag(&self) -> &'static str {
        MINHA_RECEITA_TAG
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Structured
    }

    fn supports_fetch(&self) -> bool {
        true
    }

    async fn fetch(&self, cnpj: &Cnpj) -> ProviderResult<PartialRecord> {
        let url = endpoint(&self.base_url, &[cnpj.as_str()])?;
        tracing::info!("Minha Receita: fetching CNPJ {}", cnpj);

        let data = get_json(&self.client, url, "Minha Receita").await?;
        Ok(map_receita_schema(MINHA_RECEITA_TAG, &data))
    }
}

// ============ CNPJ.ws ============

/// CNPJ.ws public API. Lowest priority; mostly fills contact fields.
pub struct CnpjWsService {
    client: Client,
    base_url: String,
}

impl CnpjWsService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Provider for CnpjWsService {
    fn tag(&self) -> &'static str {
        CNPJ_WS_TAG
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Structured
    }

    fn supports_fetch(&self) -> bool {
        true
    }

    async fn fetch(&self, cnpj: &Cnpj) -> ProviderResult<PartialRecord> {
        let url = endpoint(&self.base_url, &["cnpj", cnpj.as_str()])?;
        tracing::info!("CNPJ.ws: fetching CNPJ {}", cnpj);

        let data = get_json(&self.client, url, "CNPJ.ws").await?;
        Ok(map_cnpj_ws_schema(&data))
    }
}
