use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub brasilapi_base_url: String,
    pub minha_receita_base_url: String,
    pub cnpj_ws_base_url: String,
    pub google_search_url: String,
    pub bing_search_url: String,
    pub duckduckgo_search_url: String,
    /// Per-call timeout for primary lookups and scrapes.
    pub provider_timeout_secs: u64,
    /// Per-call timeout for the secondary lookup used to complete search candidates.
    pub lookup_timeout_secs: u64,
    /// Upper bound for a whole resolve/search invocation.
    pub request_timeout_secs: u64,
    pub search_result_cap: usize,
    pub scrape_result_cap: usize,
    /// Scraped names must contain the search term.
    pub scrape_match_query: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            brasilapi_base_url: "https://brasilapi.com.br".to_string(),
            minha_receita_base_url: "https://minhareceita.org".to_string(),
            cnpj_ws_base_url: "https://publica.cnpj.ws".to_string(),
            google_search_url: "https://www.google.com".to_string(),
            bing_search_url: "https://www.bing.com".to_string(),
            duckduckgo_search_url: "https://html.duckduckgo.com".to_string(),
            provider_timeout_secs: 10,
            lookup_timeout_secs: 5,
            request_timeout_secs: 25,
            search_result_cap: 5,
            scrape_result_cap: 3,
            scrape_match_query: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            brasilapi_base_url: url_var("BRASILAPI_BASE_URL", defaults.brasilapi_base_url)?,
            minha_receita_base_url: url_var(
                "MINHA_RECEITA_BASE_URL",
                defaults.minha_receita_base_url,
            )?,
            cnpj_ws_base_url: url_var("CNPJ_WS_BASE_URL", defaults.cnpj_ws_base_url)?,
            google_search_url: url_var("GOOGLE_SEARCH_URL", defaults.google_search_url)?,
            bing_search_url: url_var("BING_SEARCH_URL", defaults.bing_search_url)?,
            duckduckgo_search_url: url_var(
                "DUCKDUCKGO_SEARCH_URL",
                defaults.duckduckgo_search_url,
            )?,
            provider_timeout_secs: positive_var(
                "PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            )?,
            lookup_timeout_secs: positive_var("LOOKUP_TIMEOUT_SECS", defaults.lookup_timeout_secs)?,
            request_timeout_secs: positive_var(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            search_result_cap: positive_var("SEARCH_RESULT_CAP", defaults.search_result_cap)?,
            scrape_result_cap: positive_var("SCRAPE_RESULT_CAP", defaults.scrape_result_cap)?,
            scrape_match_query: std::env::var("SCRAPE_MATCH_QUERY")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.scrape_match_query),
        };

        if config.request_timeout_secs < config.provider_timeout_secs {
            tracing::warn!(
                "REQUEST_TIMEOUT_SECS ({}) is lower than PROVIDER_TIMEOUT_SECS ({}); slow providers will be cut off by the request deadline",
                config.request_timeout_secs,
                config.provider_timeout_secs
            );
        }

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("BrasilAPI URL: {}", config.brasilapi_base_url);
        tracing::debug!("Minha Receita URL: {}", config.minha_receita_base_url);
        tracing::debug!("CNPJ.ws URL: {}", config.cnpj_ws_base_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn url_var(name: &str, default: String) -> anyhow::Result<String> {
    let url = match std::env::var(name) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn positive_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let raw = match std::env::var(name) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a valid number", name))?;
    if value <= T::default() {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(value)
}
