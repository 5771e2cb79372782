// src/lib.rs
pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::services::calculations::AdjustmentCalculator;
use crate::services::catalog::IndexCatalog;
use crate::services::fetchers::IndexFetcher;
use crate::services::leases::LeaseManager;
use crate::services::payments::PaymentService;
use crate::services::refresh::{IndexRefresher, DEFAULT_FETCH_TIMEOUT};
use crate::services::store::{IndexStore, LeaseStore, PaymentStore};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a request handler or scheduled job needs, shared behind `Arc`.
pub struct Engine {
    pub catalog: Arc<IndexCatalog>,
    pub indices: Arc<dyn IndexStore>,
    pub calculator: AdjustmentCalculator,
    pub leases: LeaseManager,
    pub payments: PaymentService,
    pub refresher: Arc<IndexRefresher>,
    pub jwt_secret: String,
}

impl Engine {
    /// Wires every service onto one store implementing all three ports.
    pub fn new<S>(store: Arc<S>, fetchers: Vec<Arc<dyn IndexFetcher>>, jwt_secret: impl Into<String>) -> Self
    where
        S: IndexStore + LeaseStore + PaymentStore + 'static,
    {
        Self::assemble(store, fetchers, jwt_secret.into(), DEFAULT_FETCH_TIMEOUT)
    }

    /// Like `new`, taking the JWT secret and refresh timeout from `config`.
    pub fn from_config<S>(store: Arc<S>, fetchers: Vec<Arc<dyn IndexFetcher>>, config: &AppConfig) -> Self
    where
        S: IndexStore + LeaseStore + PaymentStore + 'static,
    {
        Self::assemble(store, fetchers, config.jwt_secret.clone(), config.refresh_timeout())
    }

    fn assemble<S>(
        store: Arc<S>,
        fetchers: Vec<Arc<dyn IndexFetcher>>,
        jwt_secret: String,
        fetch_timeout: Duration,
    ) -> Self
    where
        S: IndexStore + LeaseStore + PaymentStore + 'static,
    {
        let catalog = Arc::new(IndexCatalog::standard());
        let indices: Arc<dyn IndexStore> = store.clone();
        let leases: Arc<dyn LeaseStore> = store.clone();
        let payments: Arc<dyn PaymentStore> = store;

        Engine {
            calculator: AdjustmentCalculator::new(indices.clone()),
            leases: LeaseManager::new(leases.clone(), payments.clone(), catalog.clone()),
            payments: PaymentService::new(payments, leases, indices.clone()),
            refresher: Arc::new(
                IndexRefresher::new(indices.clone(), catalog.clone(), fetchers).with_fetch_timeout(fetch_timeout),
            ),
            indices,
            catalog,
            jwt_secret,
        }
    }
}
