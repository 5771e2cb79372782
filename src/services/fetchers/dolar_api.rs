// src/services/fetchers/dolar_api.rs
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use log::{debug, error, info};
use serde_json::Value;
use std::time::Duration;

use super::{http_client, json_decimal, normalize_value, IndexFetcher};
use crate::models::{IndexType, NewIndexValue};
use crate::BoxError;

const SOURCE: &str = "dolarapi.com";
const SUPPORTED: [IndexType; 3] = [IndexType::DolarBlue, IndexType::DolarMep, IndexType::DolarOficial];

/// Dollar reference quotes from dolarapi.com. The API only serves today's quotes.
pub struct DolarApiFetcher {
    client: reqwest::Client,
    url: String,
}

impl DolarApiFetcher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, BoxError> {
        Ok(DolarApiFetcher {
            client: http_client(timeout)?,
            url: url.to_string(),
        })
    }
}

fn index_type_for_casa(casa: &str) -> Option<IndexType> {
    match casa {
        "blue" => Some(IndexType::DolarBlue),
        "bolsa" => Some(IndexType::DolarMep),
        "oficial" => Some(IndexType::DolarOficial),
        _ => None,
    }
}

fn quote_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(raw) = raw else {
        return today;
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.date_naive();
    }
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or(today)
}

/// Turns the `/v1/dolares` array into one record per tracked `casa`.
pub fn parse_quotes(body: &str, today: NaiveDate) -> Result<Vec<NewIndexValue>, BoxError> {
    let items: Vec<Value> = serde_json::from_str(body)?;
    let mut values = Vec::new();

    for item in &items {
        let Some(casa) = item.get("casa").and_then(Value::as_str) else {
            debug!("Skipping quote without casa: {}", item);
            continue;
        };
        let Some(index_type) = index_type_for_casa(casa) else {
            continue;
        };
        let Some(venta) = item.get("venta").and_then(json_decimal) else {
            debug!("Skipping {} quote without venta", casa);
            continue;
        };

        let value_date = quote_date(item.get("fechaActualizacion").and_then(Value::as_str), today);
        info!("Fetched {} = {} for date {}", index_type, venta, value_date);
        values.push(NewIndexValue {
            index_type,
            country_code: "AR".to_string(),
            value_date,
            value: normalize_value(venta),
            source: SOURCE.to_string(),
            raw_payload: Some(item.to_string()),
        });
    }

    Ok(values)
}

#[async_trait]
impl IndexFetcher for DolarApiFetcher {
    fn name(&self) -> &str {
        "dolarapi"
    }

    fn supported_index_types(&self) -> &[IndexType] {
        &SUPPORTED
    }

    fn country_code(&self) -> &str {
        "AR"
    }

    async fn fetch_latest(&self) -> Result<Vec<NewIndexValue>, BoxError> {
        info!("Fetching dollar quotes from URL: {}", self.url);
        let body = match self.client.get(&self.url).send().await.and_then(|r| r.error_for_status()) {
            Ok(resp) => resp.text().await?,
            Err(e) => {
                error!("HTTP error fetching dollar quotes: {}", e);
                return Err(e.into());
            }
        };
        let values = parse_quotes(&body, Local::now().date_naive())?;
        info!("Parsed {} dollar quotes", values.len());
        Ok(values)
    }
}
