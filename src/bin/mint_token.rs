// src/bin/mint_token.rs
use anyhow::{Context, Result};
use chrono::Duration;
use dotenv::dotenv;
use std::env;

use rent_indexation::config::AppConfig;
use rent_indexation::models::OwnerId;
use rent_indexation::services::auth::issue_token;

/// Usage: `mint_token <owner_id> [hours]`
fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let mut args = env::args().skip(1);
    let owner: OwnerId = args
        .next()
        .context("usage: mint_token <owner_id> [hours]")?
        .parse()
        .context("owner_id must be an integer")?;
    let hours: i64 = match args.next() {
        Some(raw) => raw.parse().context("hours must be an integer")?,
        None => 24,
    };

    let config = AppConfig::from_env().context("loading configuration")?;
    let token = issue_token(owner, &config.jwt_secret, Duration::hours(hours))?;
    println!("{}", token);
    Ok(())
}
