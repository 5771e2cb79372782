// src/services/fetchers/argentina_datos.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, error, info};
use serde_json::Value;
use std::time::Duration;

use super::{http_client, json_decimal, normalize_value, IndexFetcher};
use crate::models::{IndexType, NewIndexValue};
use crate::BoxError;

const SOURCE: &str = "argentinadatos.com";
const SUPPORTED: [IndexType; 1] = [IndexType::Ipc];

/// Monthly inflation (IPC) from the ArgentinaDatos API. Values are monthly percentages.
pub struct ArgentinaDatosIpcFetcher {
    client: reqwest::Client,
    url: String,
}

impl ArgentinaDatosIpcFetcher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, BoxError> {
        Ok(ArgentinaDatosIpcFetcher {
            client: http_client(timeout)?,
            url: url.to_string(),
        })
    }

    async fn download(&self) -> Result<String, BoxError> {
        info!("Fetching IPC series from URL: {}", self.url);
        match self.client.get(&self.url).send().await.and_then(|r| r.error_for_status()) {
            Ok(resp) => Ok(resp.text().await?),
            Err(e) => {
                error!("HTTP error fetching IPC from ArgentinaDatos: {}", e);
                Err(e.into())
            }
        }
    }
}

/// Parses the `[{fecha, valor}]` array, oldest first.
pub fn parse_series(body: &str) -> Result<Vec<NewIndexValue>, BoxError> {
    let items: Vec<Value> = serde_json::from_str(body)?;
    let mut values: Vec<NewIndexValue> = items
        .iter()
        .filter_map(|item| {
            let fecha = item.get("fecha").and_then(Value::as_str);
            let date = fecha.and_then(|f| NaiveDate::parse_from_str(f.trim(), "%Y-%m-%d").ok());
            let valor = item.get("valor").and_then(json_decimal);
            match (date, valor) {
                (Some(value_date), Some(value)) => Some(NewIndexValue {
                    index_type: IndexType::Ipc,
                    country_code: "AR".to_string(),
                    value_date,
                    value: normalize_value(value),
                    source: SOURCE.to_string(),
                    raw_payload: None,
                }),
                _ => {
                    debug!("Skipping malformed IPC row: {}", item);
                    None
                }
            }
        })
        .collect();
    values.sort_by_key(|v| v.value_date);
    Ok(values)
}

#[async_trait]
impl IndexFetcher for ArgentinaDatosIpcFetcher {
    fn name(&self) -> &str {
        "argentinadatos-ipc"
    }

    fn supported_index_types(&self) -> &[IndexType] {
        &SUPPORTED
    }

    fn country_code(&self) -> &str {
        "AR"
    }

    async fn fetch_latest(&self) -> Result<Vec<NewIndexValue>, BoxError> {
        let mut values = self.fetch_all_historical().await?;
        Ok(values.pop().into_iter().collect())
    }

    async fn fetch_all_historical(&self) -> Result<Vec<NewIndexValue>, BoxError> {
        let body = self.download().await?;
        let values = parse_series(&body)?;
        info!("Fetched {} IPC historical values from ArgentinaDatos", values.len());
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_sorted_and_malformed_ones_skipped() {
        let body = r#"[
            {"fecha":"2024-03-31","valor":11.0},
            {"fecha":"2024-01-31","valor":20.6},
            {"fecha":"not-a-date","valor":1.0},
            {"fecha":"2024-02-29","valor":null},
            {"fecha":"2024-02-29","valor":13.2}
        ]"#;
        let values = parse_series(body).unwrap();
        let dates: Vec<String> = values.iter().map(|v| v.value_date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-31", "2024-02-29", "2024-03-31"]);
        assert_eq!(values[0].value.to_string(), "20.600000");
        assert!(values.iter().all(|v| v.index_type == IndexType::Ipc && v.source == SOURCE));
    }

    #[test]
    fn empty_series_yields_nothing() {
        assert!(parse_series("[]").unwrap().is_empty());
    }
}
