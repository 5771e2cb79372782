// src/routes.rs
use log::info;
use std::convert::Infallible;
use std::sync::Arc;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{InvalidQuery, MethodNotAllowed, Rejection};
use warp::{Filter, Reply};

use crate::handlers::error::ApiError;
use crate::handlers::{countries, indices, leases, payments};
use crate::models::OwnerId;
use crate::services::auth::{bearer_token, decode_owner};
use crate::Engine;

const MAX_BODY_BYTES: u64 = 64 * 1024;

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        code = StatusCode::BAD_REQUEST;
        message = format!("Invalid request body: {}", e);
    } else if let Some(e) = err.find::<InvalidQuery>() {
        code = StatusCode::BAD_REQUEST;
        message = format!("Invalid query: {}", e);
    } else if err.find::<MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

/// Resolves the owner from an `Authorization: Bearer` header, rejecting with 401.
pub fn with_owner(secret: String) -> impl Filter<Extract = (OwnerId,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            let header = header.ok_or_else(|| warp::reject::custom(ApiError::unauthorized("Missing bearer token")))?;
            let token = bearer_token(&header)
                .ok_or_else(|| warp::reject::custom(ApiError::unauthorized("Missing bearer token")))?;
            decode_owner(token, &secret)
                .map_err(|_| warp::reject::custom(ApiError::unauthorized("Invalid bearer token")))
        }
    })
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn routes(engine: Arc<Engine>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let owner = with_owner(engine.jwt_secret.clone());
    let engine_filter = warp::any().map(move || engine.clone());

    // Indices (public)
    let all_latest_route = warp::path!("api" / "v1" / "indices" / String / "all" / "latest")
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(indices::get_all_latest);

    let latest_route = warp::path!("api" / "v1" / "indices" / String / String / "latest")
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(indices::get_latest);

    let on_date_route = warp::path!("api" / "v1" / "indices" / String / String / "date" / String)
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(indices::get_on_date);

    let closest_route = warp::path!("api" / "v1" / "indices" / String / String / "closest")
        .and(warp::get())
        .and(warp::query::<indices::DateQuery>())
        .and(engine_filter.clone())
        .and_then(indices::get_closest);

    let history_route = warp::path!("api" / "v1" / "indices" / String / String / "history")
        .and(warp::get())
        .and(warp::query::<indices::RangeQuery>())
        .and(engine_filter.clone())
        .and_then(indices::get_history);

    let annual_route = warp::path!("api" / "v1" / "indices" / String / String / "annual-change")
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(indices::get_annual_change);

    let monthly_route = warp::path!("api" / "v1" / "indices" / String / String / "monthly-change")
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(indices::get_monthly_change);

    let adjustment_route = warp::path!("api" / "v1" / "indices" / "calculate-adjustment")
        .and(warp::get())
        .and(warp::query::<indices::AdjustmentQuery>())
        .and(engine_filter.clone())
        .and_then(indices::calculate_adjustment);

    let refresh_all_route = warp::path!("api" / "v1" / "indices" / "refresh")
        .and(warp::post())
        .and(engine_filter.clone())
        .and_then(indices::refresh_all);

    let refresh_country_route = warp::path!("api" / "v1" / "indices" / "refresh" / String)
        .and(warp::post())
        .and(engine_filter.clone())
        .and_then(indices::refresh_country);

    let import_route = warp::path!("api" / "v1" / "indices" / "import-historical")
        .and(warp::post())
        .and(engine_filter.clone())
        .and_then(indices::import_historical);

    let index_routes = adjustment_route
        .or(refresh_all_route)
        .or(refresh_country_route)
        .or(import_route)
        .or(all_latest_route)
        .or(latest_route)
        .or(on_date_route)
        .or(closest_route)
        .or(history_route)
        .or(annual_route)
        .or(monthly_route)
        .boxed();

    // Countries (public)
    let countries_route = warp::path!("api" / "v1" / "countries")
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(countries::list_countries);

    let country_route = warp::path!("api" / "v1" / "countries" / String)
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(countries::get_country);

    // Leases (owner-scoped)
    let create_lease_route = warp::path!("api" / "v1" / "leases")
        .and(warp::post())
        .and(owner.clone())
        .and(json_body())
        .and(engine_filter.clone())
        .and_then(leases::create_lease);

    let list_leases_route = warp::path!("api" / "v1" / "leases")
        .and(warp::get())
        .and(owner.clone())
        .and(warp::query::<leases::LeaseListQuery>())
        .and(engine_filter.clone())
        .and_then(leases::list_leases);

    let active_leases_route = warp::path!("api" / "v1" / "leases" / "active")
        .and(warp::get())
        .and(owner.clone())
        .and(warp::query::<leases::AsOfQuery>())
        .and(engine_filter.clone())
        .and_then(leases::list_active_leases);

    let deleted_leases_route = warp::path!("api" / "v1" / "leases" / "deleted")
        .and(warp::get())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::list_deleted_leases);

    let restore_lease_route = warp::path!("api" / "v1" / "leases" / "deleted" / i64 / "restore")
        .and(warp::post())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::restore_lease);

    let permanent_delete_route = warp::path!("api" / "v1" / "leases" / "deleted" / i64)
        .and(warp::delete())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::permanently_delete_lease);

    let get_lease_route = warp::path!("api" / "v1" / "leases" / i64)
        .and(warp::get())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::get_lease);

    let update_lease_route = warp::path!("api" / "v1" / "leases" / i64)
        .and(warp::put())
        .and(owner.clone())
        .and(json_body())
        .and(engine_filter.clone())
        .and_then(leases::update_lease);

    let terminate_route = warp::path!("api" / "v1" / "leases" / i64 / "terminate")
        .and(warp::post())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::terminate_lease);

    let reactivate_route = warp::path!("api" / "v1" / "leases" / i64 / "reactivate")
        .and(warp::post())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::reactivate_lease);

    let soft_delete_route = warp::path!("api" / "v1" / "leases" / i64)
        .and(warp::delete())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::soft_delete_lease);

    let purge_route = warp::path!("api" / "v1" / "leases" / i64 / "purge")
        .and(warp::delete())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::hard_delete_lease);

    let adjusted_rent_route = warp::path!("api" / "v1" / "leases" / i64 / "adjusted-rent")
        .and(warp::get())
        .and(owner.clone())
        .and(warp::query::<leases::AdjustedRentQuery>())
        .and(engine_filter.clone())
        .and_then(leases::get_adjusted_rent);

    let lease_payments_route = warp::path!("api" / "v1" / "leases" / i64 / "payments")
        .and(warp::get())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(leases::list_lease_payments);

    let outstanding_route = warp::path!("api" / "v1" / "leases" / i64 / "outstanding")
        .and(warp::get())
        .and(owner.clone())
        .and(warp::query::<leases::AsOfQuery>())
        .and(engine_filter.clone())
        .and_then(leases::get_outstanding_rent);

    let lease_routes = create_lease_route
        .or(list_leases_route)
        .or(active_leases_route)
        .or(deleted_leases_route)
        .or(restore_lease_route)
        .or(permanent_delete_route)
        .or(get_lease_route)
        .or(update_lease_route)
        .or(terminate_route)
        .or(reactivate_route)
        .or(soft_delete_route)
        .or(purge_route)
        .or(adjusted_rent_route)
        .or(lease_payments_route)
        .or(outstanding_route)
        .boxed();

    // Payments (owner-scoped)
    let create_payment_route = warp::path!("api" / "v1" / "payments")
        .and(warp::post())
        .and(owner.clone())
        .and(json_body())
        .and(engine_filter.clone())
        .and_then(payments::create_payment);

    let get_payment_route = warp::path!("api" / "v1" / "payments" / i64)
        .and(warp::get())
        .and(owner.clone())
        .and(engine_filter.clone())
        .and_then(payments::get_payment);

    let update_payment_route = warp::path!("api" / "v1" / "payments" / i64)
        .and(warp::put())
        .and(owner.clone())
        .and(json_body())
        .and(engine_filter.clone())
        .and_then(payments::update_payment);

    let delete_payment_route = warp::path!("api" / "v1" / "payments" / i64)
        .and(warp::delete())
        .and(owner)
        .and(engine_filter)
        .and_then(payments::delete_payment);

    let payment_routes = create_payment_route
        .or(get_payment_route)
        .or(update_payment_route)
        .or(delete_payment_route)
        .boxed();

    info!("All routes configured successfully.");

    index_routes
        .or(countries_route)
        .or(country_route)
        .or(lease_routes)
        .or(payment_routes)
        .recover(handle_rejection)
}
