// src/handlers/countries.rs
use log::info;
use std::sync::Arc;
use warp::Rejection;

use super::error::ApiError;
use crate::models::normalize_country_code;
use crate::Engine;

pub async fn list_countries(engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling request to list countries");
    Ok(warp::reply::json(&engine.catalog.countries()))
}

pub async fn get_country(code: String, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    let code = normalize_country_code(&code);
    info!("Handling request for country {}", code);
    match engine.catalog.entry(&code) {
        Some(entry) => Ok(warp::reply::json(entry)),
        None => Err(warp::reject::custom(ApiError::not_found(format!("Unsupported country: {}", code)))),
    }
}
