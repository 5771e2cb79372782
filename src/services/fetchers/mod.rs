// src/services/fetchers/mod.rs
pub mod argentina_datos;
pub mod bcra_icl;
pub mod dolar_api;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::{IndexType, NewIndexValue};
use crate::BoxError;

pub use argentina_datos::ArgentinaDatosIpcFetcher;
pub use bcra_icl::BcraIclFetcher;
pub use dolar_api::DolarApiFetcher;

/// Fractional digits kept for every fetched value.
pub const VALUE_SCALE: i64 = 6;

/// Adapter for one upstream data source.
///
/// Malformed rows are skipped, not fatal. "No new data" is an empty vector.
/// Transport or format failures of the whole source are returned as errors and
/// contained by the refresh orchestrator.
#[async_trait]
pub trait IndexFetcher: Send + Sync {
    /// Short identifier used in logs and refresh reports.
    fn name(&self) -> &str;

    fn supported_index_types(&self) -> &[IndexType];

    fn country_code(&self) -> &str;

    async fn fetch_latest(&self) -> Result<Vec<NewIndexValue>, BoxError>;

    async fn fetch_all_historical(&self) -> Result<Vec<NewIndexValue>, BoxError> {
        self.fetch_latest().await
    }

    fn supports_any(&self, types: &[IndexType]) -> bool {
        self.supported_index_types().iter().any(|t| types.contains(t))
    }
}

/// The fixed list of sources the service ingests from.
pub fn standard_registry(config: &AppConfig) -> Result<Vec<Arc<dyn IndexFetcher>>, BoxError> {
    Ok(vec![
        Arc::new(DolarApiFetcher::new(&config.dolar_api_url, config.fetch_timeout)?),
        Arc::new(ArgentinaDatosIpcFetcher::new(&config.ipc_source_url, config.fetch_timeout)?),
        Arc::new(BcraIclFetcher::new(&config.icl_source_url, config.spreadsheet_timeout)?),
    ])
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, BoxError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("rent-indexation/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

pub fn normalize_value(value: BigDecimal) -> BigDecimal {
    value.with_scale_round(VALUE_SCALE, RoundingMode::HalfUp)
}

/// Parses a decimal written with either `.` or `,` as the decimal separator.
pub(crate) fn parse_decimal(raw: &str) -> Option<BigDecimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let canonical = if trimmed.contains(',') && trimmed.contains('.') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.replace(',', ".")
    };
    BigDecimal::from_str(&canonical).ok()
}

/// JSON numbers and numeric strings both appear in upstream payloads.
pub(crate) fn json_decimal(value: &serde_json::Value) -> Option<BigDecimal> {
    match value {
        serde_json::Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => parse_decimal(s),
        _ => None,
    }
}
