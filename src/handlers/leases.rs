// src/handlers/leases.rs
use chrono::{Local, NaiveDate};
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::with_status;
use warp::Rejection;

use super::error::reject;
use crate::models::{Lease, LeaseChanges, LeaseDraft, OwnerId, PaymentType};
use crate::Engine;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseListQuery {
    pub property_unit_id: Option<i64>,
    pub tenant_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustedRentQuery {
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsOfQuery {
    pub as_of: Option<NaiveDate>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn present(leases: Vec<Lease>) -> Vec<Lease> {
    let today = today();
    leases.into_iter().map(|l| l.presented_on(today)).collect()
}

pub async fn create_lease(owner: OwnerId, draft: LeaseDraft, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling lease creation for owner {}", owner);
    let lease = engine.leases.create(owner, draft).await.map_err(reject)?;
    Ok(with_status(warp::reply::json(&lease.presented_on(today())), StatusCode::CREATED))
}

pub async fn list_leases(owner: OwnerId, query: LeaseListQuery, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling lease listing for owner {}", owner);
    let leases = match (query.property_unit_id, query.tenant_id) {
        (Some(property_unit_id), _) => engine.leases.list_for_property(owner, property_unit_id).await,
        (None, Some(tenant_id)) => engine.leases.list_for_tenant(owner, tenant_id).await,
        (None, None) => engine.leases.list(owner).await,
    }
    .map_err(reject)?;
    Ok(warp::reply::json(&present(leases)))
}

pub async fn list_active_leases(owner: OwnerId, query: AsOfQuery, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    let date = query.as_of.unwrap_or_else(today);
    info!("Handling active lease listing for owner {} on {}", owner, date);
    let leases = engine.leases.active_on(owner, date).await.map_err(reject)?;
    Ok(warp::reply::json(&present(leases)))
}

pub async fn get_lease(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling request for lease {}", id);
    let lease = engine.leases.get(owner, id).await.map_err(reject)?;
    Ok(warp::reply::json(&lease.presented_on(today())))
}

pub async fn update_lease(
    id: i64,
    owner: OwnerId,
    changes: LeaseChanges,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    info!("Handling update of lease {}", id);
    let lease = engine.leases.update(owner, id, changes).await.map_err(reject)?;
    Ok(warp::reply::json(&lease.presented_on(today())))
}

pub async fn terminate_lease(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling termination of lease {}", id);
    let lease = engine.leases.terminate(owner, id).await.map_err(reject)?;
    Ok(warp::reply::json(&lease.presented_on(today())))
}

pub async fn reactivate_lease(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling reactivation of lease {}", id);
    let lease = engine.leases.reactivate(owner, id).await.map_err(reject)?;
    Ok(warp::reply::json(&lease.presented_on(today())))
}

pub async fn soft_delete_lease(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling soft delete of lease {}", id);
    let lease = engine.leases.soft_delete(owner, id).await.map_err(reject)?;
    Ok(warp::reply::json(&lease))
}

pub async fn hard_delete_lease(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling hard delete of lease {}", id);
    engine.leases.hard_delete(owner, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_deleted_leases(owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling deleted lease listing for owner {}", owner);
    let leases = engine.leases.list_deleted(owner).await.map_err(reject)?;
    Ok(warp::reply::json(&leases))
}

pub async fn restore_lease(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling restore of lease {}", id);
    let lease = engine.leases.restore(owner, id).await.map_err(reject)?;
    Ok(warp::reply::json(&lease.presented_on(today())))
}

pub async fn permanently_delete_lease(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling permanent delete of lease {}", id);
    engine.leases.permanently_delete(owner, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_adjusted_rent(
    id: i64,
    owner: OwnerId,
    query: AdjustedRentQuery,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    let payment_date = query.payment_date.unwrap_or_else(today);
    info!("Handling adjusted rent for lease {} at {}", id, payment_date);
    let lease = engine.leases.get(owner, id).await.map_err(reject)?;
    let quote = engine
        .calculator
        .quote(
            lease.id,
            &lease.monthly_rent,
            &lease.country_code,
            lease.adjustment_index,
            lease.start_date,
            payment_date,
        )
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&quote))
}

pub async fn list_lease_payments(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling payment listing for lease {}", id);
    let payments = engine.payments.list_for_lease(owner, id).await.map_err(reject)?;
    Ok(warp::reply::json(&payments))
}

pub async fn get_outstanding_rent(
    id: i64,
    owner: OwnerId,
    query: AsOfQuery,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    let as_of = query.as_of.unwrap_or_else(today);
    info!("Handling outstanding rent for lease {} as of {}", id, as_of);
    let outstanding = engine.payments.outstanding_rent(owner, id, as_of).await.map_err(reject)?;
    let rent_paid = engine
        .payments
        .total_paid(owner, id, Some(PaymentType::Rent))
        .await
        .map_err(reject)?;
    let total_paid = engine.payments.total_paid(owner, id, None).await.map_err(reject)?;
    Ok(warp::reply::json(&json!({
        "leaseId": id,
        "asOf": as_of,
        "outstandingRent": outstanding,
        "rentPaid": rent_paid,
        "totalPaid": total_paid,
    })))
}
