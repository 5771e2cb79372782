// src/bin/import_history.rs
use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use rent_indexation::config::AppConfig;
use rent_indexation::services::catalog::IndexCatalog;
use rent_indexation::services::db::DbStore;
use rent_indexation::services::fetchers::standard_registry;
use rent_indexation::services::refresh::IndexRefresher;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let database_url = config.database_url.as_deref().context("DATABASE_URL must be set")?;
    let store = DbStore::new(database_url).await.context("connecting to Postgres")?;
    store.migrate().await.context("applying schema")?;

    let fetchers = standard_registry(&config).map_err(|e| anyhow::anyhow!("building fetchers: {}", e))?;
    let refresher = IndexRefresher::new(Arc::new(store), Arc::new(IndexCatalog::standard()), fetchers)
        .with_fetch_timeout(config.refresh_timeout());

    let report = refresher.import_all_historical().await;
    for fetcher in &report.fetchers {
        match &fetcher.error {
            Some(error) => println!("{:<24} FAILED: {}", fetcher.fetcher, error),
            None => println!(
                "{:<24} fetched {:>6}, imported {:>6}, already present {:>6}",
                fetcher.fetcher, fetcher.fetched, fetcher.inserted, fetcher.skipped
            ),
        }
    }
    println!("Imported {} values, {} already present.", report.inserted(), report.skipped());

    if report.failures() > 0 {
        anyhow::bail!("{} fetcher(s) failed", report.failures());
    }
    Ok(())
}
