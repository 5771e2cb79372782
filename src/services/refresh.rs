// src/services/refresh.rs
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{normalize_country_code, IndexType, NewIndexValue, UpsertOutcome};
use crate::services::catalog::IndexCatalog;
use crate::services::error::EngineError;
use crate::services::fetchers::IndexFetcher;
use crate::services::store::IndexStore;

/// Upper bound on one fetcher call, on top of the HTTP client timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetcherReport {
    pub fetcher: String,
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetcherReport {
    fn new(fetcher: &str) -> Self {
        FetcherReport {
            fetcher: fetcher.to_string(),
            fetched: 0,
            inserted: 0,
            skipped: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetchers: Vec<FetcherReport>,
}

impl RefreshReport {
    pub fn inserted(&self) -> usize {
        self.fetchers.iter().map(|f| f.inserted).sum()
    }

    pub fn skipped(&self) -> usize {
        self.fetchers.iter().map(|f| f.skipped).sum()
    }

    pub fn failures(&self) -> usize {
        self.fetchers.iter().filter(|f| f.error.is_some()).count()
    }

    fn merge(&mut self, other: RefreshReport) {
        self.finished_at = other.finished_at;
        self.fetchers.extend(other.fetchers);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    Latest,
    Historical,
}

/// Pulls values from every registered fetcher into the index store.
///
/// A fetcher that errors, times out, or hits a store failure only loses its
/// own contribution; values already written stay written.
pub struct IndexRefresher {
    store: Arc<dyn IndexStore>,
    catalog: Arc<IndexCatalog>,
    fetchers: Vec<Arc<dyn IndexFetcher>>,
    fetch_timeout: Duration,
}

impl IndexRefresher {
    pub fn new(store: Arc<dyn IndexStore>, catalog: Arc<IndexCatalog>, fetchers: Vec<Arc<dyn IndexFetcher>>) -> Self {
        IndexRefresher {
            store,
            catalog,
            fetchers,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub async fn refresh_country(&self, country_code: &str) -> RefreshReport {
        let country = normalize_country_code(country_code);
        info!("Refreshing indices for country {}", country);
        let selected: Vec<&Arc<dyn IndexFetcher>> =
            self.fetchers.iter().filter(|f| f.country_code() == country).collect();
        if selected.is_empty() {
            warn!("No fetchers registered for country {}", country);
        }
        self.run(selected, FetchMode::Latest).await
    }

    /// Like `refresh_country`, restricted to fetchers serving any of `types`.
    pub async fn refresh_index_types(&self, country_code: &str, types: &[IndexType]) -> RefreshReport {
        let country = normalize_country_code(country_code);
        info!("Refreshing {:?} for country {}", types, country);
        let selected: Vec<&Arc<dyn IndexFetcher>> = self
            .fetchers
            .iter()
            .filter(|f| f.country_code() == country && f.supports_any(types))
            .collect();
        self.run(selected, FetchMode::Latest).await
    }

    pub async fn refresh_all(&self) -> RefreshReport {
        info!("Starting refresh of all auto-index countries");
        let mut report = empty_report();
        for country in self.catalog.auto_index_countries() {
            report.merge(self.refresh_country(&country).await);
        }
        info!(
            "Refresh of all countries finished: {} inserted, {} skipped, {} failed fetchers",
            report.inserted(),
            report.skipped(),
            report.failures()
        );
        report
    }

    /// One-time backfill across every fetcher regardless of country.
    pub async fn import_all_historical(&self) -> RefreshReport {
        info!("Starting historical import across {} fetchers", self.fetchers.len());
        let report = self.run(self.fetchers.iter().collect(), FetchMode::Historical).await;
        info!(
            "Historical import finished: {} imported, {} already present",
            report.inserted(),
            report.skipped()
        );
        report
    }

    async fn run(&self, fetchers: Vec<&Arc<dyn IndexFetcher>>, mode: FetchMode) -> RefreshReport {
        let mut report = empty_report();
        for fetcher in fetchers {
            report.fetchers.push(self.run_one(&**fetcher, mode).await);
        }
        report.finished_at = Utc::now();
        report
    }

    async fn run_one(&self, fetcher: &dyn IndexFetcher, mode: FetchMode) -> FetcherReport {
        let mut report = FetcherReport::new(fetcher.name());

        let values = match self.fetch(fetcher, mode).await {
            Ok(values) => values,
            Err(e) => {
                error!("Error refreshing indices with {}: {}", fetcher.name(), e);
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.fetched = values.len();

        for value in &values {
            match self.store.upsert_if_absent(value).await {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!("Store failure while saving {} values: {}", fetcher.name(), e);
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }

        info!(
            "{}: fetched {}, inserted {}, skipped {}",
            fetcher.name(),
            report.fetched,
            report.inserted,
            report.skipped
        );
        report
    }

    async fn fetch(&self, fetcher: &dyn IndexFetcher, mode: FetchMode) -> Result<Vec<NewIndexValue>, EngineError> {
        let call = async {
            match mode {
                FetchMode::Latest => fetcher.fetch_latest().await,
                FetchMode::Historical => fetcher.fetch_all_historical().await,
            }
        };
        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(e)) => Err(EngineError::fetch(fetcher.name(), e.to_string())),
            Err(_) => Err(EngineError::fetch(
                fetcher.name(),
                format!("timed out after {}s", self.fetch_timeout.as_secs()),
            )),
        }
    }
}

fn empty_report() -> RefreshReport {
    let now = Utc::now();
    RefreshReport {
        started_at: now,
        finished_at: now,
        fetchers: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryStore;
    use crate::BoxError;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    struct StaticFetcher {
        name: &'static str,
        country: &'static str,
        types: Vec<IndexType>,
        latest: Vec<NewIndexValue>,
        history: Vec<NewIndexValue>,
    }

    #[async_trait]
    impl IndexFetcher for StaticFetcher {
        fn name(&self) -> &str {
            self.name
        }
        fn supported_index_types(&self) -> &[IndexType] {
            &self.types
        }
        fn country_code(&self) -> &str {
            self.country
        }
        async fn fetch_latest(&self) -> Result<Vec<NewIndexValue>, BoxError> {
            Ok(self.latest.clone())
        }
        async fn fetch_all_historical(&self) -> Result<Vec<NewIndexValue>, BoxError> {
            Ok(self.history.clone())
        }
    }

    struct BrokenFetcher;

    #[async_trait]
    impl IndexFetcher for BrokenFetcher {
        fn name(&self) -> &str {
            "broken"
        }
        fn supported_index_types(&self) -> &[IndexType] {
            &[IndexType::Ipc]
        }
        fn country_code(&self) -> &str {
            "AR"
        }
        async fn fetch_latest(&self) -> Result<Vec<NewIndexValue>, BoxError> {
            Err("connection refused".into())
        }
    }

    struct HangingFetcher;

    #[async_trait]
    impl IndexFetcher for HangingFetcher {
        fn name(&self) -> &str {
            "hanging"
        }
        fn supported_index_types(&self) -> &[IndexType] {
            &[IndexType::DolarBlue]
        }
        fn country_code(&self) -> &str {
            "AR"
        }
        async fn fetch_latest(&self) -> Result<Vec<NewIndexValue>, BoxError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn icl(day: u32, value: i64) -> NewIndexValue {
        NewIndexValue {
            index_type: IndexType::Icl,
            country_code: "AR".to_string(),
            value_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            value: BigDecimal::from(value),
            source: "test".to_string(),
            raw_payload: None,
        }
    }

    fn icl_fetcher() -> Arc<dyn IndexFetcher> {
        Arc::new(StaticFetcher {
            name: "icl",
            country: "AR",
            types: vec![IndexType::Icl],
            latest: vec![icl(3, 103), icl(3, 103)],
            history: vec![icl(1, 101), icl(2, 102), icl(3, 103)],
        })
    }

    fn refresher(store: Arc<MemoryStore>, fetchers: Vec<Arc<dyn IndexFetcher>>) -> IndexRefresher {
        IndexRefresher::new(store, Arc::new(IndexCatalog::standard()), fetchers)
    }

    #[tokio::test]
    async fn duplicate_records_are_counted_as_skipped() {
        let store = Arc::new(MemoryStore::new());
        let report = refresher(store.clone(), vec![icl_fetcher()]).refresh_country("ar").await;
        assert_eq!(report.fetchers.len(), 1);
        assert_eq!(report.fetchers[0].fetched, 2);
        assert_eq!(report.fetchers[0].inserted, 1);
        assert_eq!(report.fetchers[0].skipped, 1);
        assert_eq!(store.index_value_count().await, 1);
    }

    #[tokio::test]
    async fn failing_fetcher_does_not_block_the_others() {
        let store = Arc::new(MemoryStore::new());
        let fetchers: Vec<Arc<dyn IndexFetcher>> = vec![Arc::new(BrokenFetcher), icl_fetcher()];
        let report = refresher(store.clone(), fetchers).refresh_all().await;
        assert_eq!(report.failures(), 1);
        let broken = report.fetchers.iter().find(|f| f.fetcher == "broken").unwrap();
        assert!(broken.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(report.inserted(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetcher_times_out_as_a_per_fetcher_failure() {
        let store = Arc::new(MemoryStore::new());
        let fetchers: Vec<Arc<dyn IndexFetcher>> = vec![Arc::new(HangingFetcher), icl_fetcher()];
        let report = refresher(store.clone(), fetchers)
            .with_fetch_timeout(Duration::from_secs(5))
            .refresh_country("AR")
            .await;
        let hanging = report.fetchers.iter().find(|f| f.fetcher == "hanging").unwrap();
        assert!(hanging.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(store.index_value_count().await, 1);
    }

    #[tokio::test]
    async fn type_filtered_refresh_only_runs_matching_fetchers() {
        let store = Arc::new(MemoryStore::new());
        let fetchers: Vec<Arc<dyn IndexFetcher>> = vec![Arc::new(BrokenFetcher), icl_fetcher()];
        let report = refresher(store, fetchers)
            .refresh_index_types("AR", &[IndexType::Icl])
            .await;
        assert_eq!(report.fetchers.len(), 1);
        assert_eq!(report.fetchers[0].fetcher, "icl");
    }

    #[tokio::test]
    async fn historical_import_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let refresher = refresher(store.clone(), vec![icl_fetcher()]);
        let first = refresher.import_all_historical().await;
        let second = refresher.import_all_historical().await;
        assert_eq!(first.inserted(), 3);
        assert_eq!(second.inserted(), 0);
        assert_eq!(second.skipped(), 3);
        assert_eq!(store.index_value_count().await, 3);
    }

    #[tokio::test]
    async fn country_without_fetchers_yields_empty_report() {
        let store = Arc::new(MemoryStore::new());
        let report = refresher(store, vec![icl_fetcher()]).refresh_country("US").await;
        assert!(report.fetchers.is_empty());
    }
}
