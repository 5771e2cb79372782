use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use rent_indexation::config::AppConfig;
use rent_indexation::routes;
use rent_indexation::services::db::DbStore;
use rent_indexation::services::fetchers::standard_registry;
use rent_indexation::services::memory::MemoryStore;
use rent_indexation::services::scheduler::start_scheduler;
use rent_indexation::Engine;

async fn build_engine(config: &AppConfig) -> Result<Engine> {
    let fetchers = standard_registry(config).map_err(|e| anyhow::anyhow!("building fetchers: {}", e))?;

    match &config.database_url {
        Some(url) => {
            let store = DbStore::new(url).await.context("connecting to Postgres")?;
            store.migrate().await.context("applying schema")?;
            Ok(Engine::from_config(Arc::new(store), fetchers, config))
        }
        None => {
            warn!("Running on the in-memory store, data is lost on restart");
            Ok(Engine::from_config(Arc::new(MemoryStore::new()), fetchers, config))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env().context("loading configuration")?;
    info!("Using PORT: {}", config.port);

    let engine = Arc::new(build_engine(&config).await?);
    info!("Fetch timeout per refresh: {:?}", engine.refresher.fetch_timeout());

    let _scheduler = if config.scheduler_enabled {
        Some(
            start_scheduler(engine.refresher.clone(), config.startup_backfill)
                .await
                .context("starting scheduler")?,
        )
    } else {
        info!("Scheduler disabled");
        None
    };

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let api = routes::routes(engine).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
