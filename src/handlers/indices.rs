// src/handlers/indices.rs
use bigdecimal::{BigDecimal, One};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::with_status;
use warp::Rejection;

use super::error::{reject, ApiError};
use crate::models::{normalize_country_code, AdjustmentIndex, IndexType};
use crate::services::calculations::round_money;
use crate::Engine;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentQuery {
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub index: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdjustmentResponse {
    country_code: String,
    index_type: AdjustmentIndex,
    from_date: NaiveDate,
    to_date: NaiveDate,
    factor: BigDecimal,
    percentage_change: BigDecimal,
}

pub(crate) fn parse_index_type(raw: &str) -> Result<IndexType, Rejection> {
    raw.parse::<IndexType>()
        .map_err(|_| warp::reject::custom(ApiError::bad_request(format!("Unknown index type: {}", raw))))
}

pub(crate) fn parse_adjustment_index(raw: &str) -> Result<AdjustmentIndex, Rejection> {
    raw.parse::<AdjustmentIndex>()
        .map_err(|_| warp::reject::custom(ApiError::bad_request(format!("Unknown index type: {}", raw))))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, Rejection> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| warp::reject::custom(ApiError::bad_request(format!("Invalid date: {}", raw))))
}

fn missing(index_type: IndexType, country: &str) -> Rejection {
    warp::reject::custom(ApiError::not_found(format!("No {} data for {}", index_type, country)))
}

pub async fn get_all_latest(country: String, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(&country);
    info!("Handling request for latest indices of {}", country);
    let values = engine.indices.latest_per_type(&country).await.map_err(reject)?;
    Ok(warp::reply::json(&values))
}

pub async fn get_latest(country: String, index_type: String, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(&country);
    let index_type = parse_index_type(&index_type)?;
    info!("Handling request for latest {} of {}", index_type, country);
    match engine.indices.latest(&country, index_type).await.map_err(reject)? {
        Some(value) => Ok(warp::reply::json(&value)),
        None => Err(missing(index_type, &country)),
    }
}

pub async fn get_on_date(
    country: String,
    index_type: String,
    date: String,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(&country);
    let index_type = parse_index_type(&index_type)?;
    let date = parse_date(&date)?;
    info!("Handling request for {} of {} on {}", index_type, country, date);
    match engine.indices.exact(&country, index_type, date).await.map_err(reject)? {
        Some(value) => Ok(warp::reply::json(&value)),
        None => Err(missing(index_type, &country)),
    }
}

pub async fn get_closest(
    country: String,
    index_type: String,
    query: DateQuery,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(&country);
    let index_type = parse_index_type(&index_type)?;
    info!("Handling request for {} of {} closest to {}", index_type, country, query.date);
    match engine
        .indices
        .closest_on_or_before(&country, index_type, query.date)
        .await
        .map_err(reject)?
    {
        Some(value) => Ok(warp::reply::json(&value)),
        None => Err(missing(index_type, &country)),
    }
}

pub async fn get_history(
    country: String,
    index_type: String,
    query: RangeQuery,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(&country);
    let index_type = parse_index_type(&index_type)?;
    if query.from > query.to {
        return Err(warp::reject::custom(ApiError::bad_request("`from` must not be after `to`")));
    }
    info!("Handling request for {} history of {} from {} to {}", index_type, country, query.from, query.to);
    let values = engine
        .indices
        .range(&country, index_type, query.from, query.to)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&values))
}

pub async fn get_annual_change(
    country: String,
    index_type: String,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(&country);
    let index_type = parse_index_type(&index_type)?;
    info!("Handling request for annual {} change of {}", index_type, country);
    let change = engine
        .calculator
        .annual_percentage_change(&country, index_type.into())
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&json!({
        "countryCode": country,
        "indexType": index_type,
        "percentageChange": change,
    })))
}

pub async fn get_monthly_change(
    country: String,
    index_type: String,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(&country);
    let index_type = parse_index_type(&index_type)?;
    info!("Handling request for monthly {} change of {}", index_type, country);
    let change = engine
        .calculator
        .monthly_percentage_change(&country, index_type.into())
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&json!({
        "countryCode": country,
        "indexType": index_type,
        "percentageChange": change,
    })))
}

pub async fn calculate_adjustment(query: AdjustmentQuery, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(query.country.as_deref().unwrap_or("AR"));
    let index = parse_adjustment_index(&query.index)?;
    info!(
        "Handling adjustment calculation for {} {} from {} to {}",
        country, index, query.from, query.to
    );
    let factor = engine
        .calculator
        .adjustment_factor(&country, index, query.from, query.to)
        .await
        .map_err(reject)?;
    let percentage_change = round_money(&((&factor - BigDecimal::one()) * BigDecimal::from(100)));
    Ok(warp::reply::json(&AdjustmentResponse {
        country_code: country,
        index_type: index,
        from_date: query.from,
        to_date: query.to,
        factor,
        percentage_change,
    }))
}

pub async fn refresh_all(engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling manual refresh of all countries");
    let report = engine.refresher.refresh_all().await;
    Ok(warp::reply::json(&report))
}

pub async fn refresh_country(country: String, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    let country = normalize_country_code(&country);
    info!("Handling manual refresh of {}", country);
    if !engine.catalog.is_supported(&country) {
        return Err(warp::reject::custom(ApiError::not_found(format!("Unsupported country: {}", country))));
    }
    let report = engine.refresher.refresh_country(&country).await;
    Ok(warp::reply::json(&report))
}

pub async fn import_historical(engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling historical import request");
    let report = engine.refresher.import_all_historical().await;
    Ok(with_status(warp::reply::json(&report), StatusCode::OK))
}
