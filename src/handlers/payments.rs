// src/handlers/payments.rs
use log::info;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::with_status;
use warp::Rejection;

use super::error::reject;
use crate::models::{OwnerId, PaymentChanges, PaymentDraft};
use crate::Engine;

pub async fn create_payment(owner: OwnerId, draft: PaymentDraft, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling payment creation for lease {}", draft.lease_id);
    let payment = engine.payments.create(owner, draft).await.map_err(reject)?;
    Ok(with_status(warp::reply::json(&payment), StatusCode::CREATED))
}

pub async fn get_payment(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling request for payment {}", id);
    let payment = engine.payments.get(owner, id).await.map_err(reject)?;
    Ok(warp::reply::json(&payment))
}

pub async fn update_payment(
    id: i64,
    owner: OwnerId,
    changes: PaymentChanges,
    engine: Arc<Engine>,
) -> Result<impl warp::Reply, Rejection> {
    info!("Handling update of payment {}", id);
    let payment = engine.payments.update(owner, id, changes).await.map_err(reject)?;
    Ok(warp::reply::json(&payment))
}

pub async fn delete_payment(id: i64, owner: OwnerId, engine: Arc<Engine>) -> Result<impl warp::Reply, Rejection> {
    info!("Handling delete of payment {}", id);
    engine.payments.delete(owner, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}
