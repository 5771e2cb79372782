// src/bin/setup_db.rs
use anyhow::{bail, Context, Result};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use csv::Reader;
use dotenv::dotenv;
use std::env;
use std::fs::File;
use std::str::FromStr;

use rent_indexation::models::{normalize_country_code, IndexType, NewIndexValue, UpsertOutcome};
use rent_indexation::services::db::DbStore;
use rent_indexation::services::fetchers::normalize_value;
use rent_indexation::services::store::IndexStore;

/// Creates the schema, then optionally seeds index values from a CSV file with
/// the header `index_type,country_code,value_date,value,source`.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = DbStore::new(&database_url).await.context("connecting to Postgres")?;
    store.migrate().await.context("applying schema")?;
    println!("Schema applied.");

    let Some(path) = env::args().nth(1) else {
        println!("Database setup complete!");
        return Ok(());
    };

    let file = File::open(&path).with_context(|| format!("opening {}", path))?;
    let mut rdr = Reader::from_reader(file);
    let (mut inserted, mut skipped) = (0usize, 0usize);

    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("reading record {}", line + 1))?;
        if record.len() < 4 {
            bail!("record {} has {} columns, expected at least 4", line + 1, record.len());
        }

        let index_type = IndexType::from_str(record[0].trim())
            .map_err(|e| anyhow::anyhow!("record {}: {}", line + 1, e))?;
        let value_date = NaiveDate::parse_from_str(record[2].trim(), "%Y-%m-%d")
            .with_context(|| format!("record {}: bad date {:?}", line + 1, &record[2]))?;
        let value = BigDecimal::from_str(record[3].trim())
            .with_context(|| format!("record {}: bad value {:?}", line + 1, &record[3]))?;
        let source = record.get(4).map(str::trim).filter(|s| !s.is_empty()).unwrap_or("seed");

        let outcome = store
            .upsert_if_absent(&NewIndexValue {
                index_type,
                country_code: normalize_country_code(&record[1]),
                value_date,
                value: normalize_value(value),
                source: source.to_string(),
                raw_payload: None,
            })
            .await
            .with_context(|| format!("storing record {}", line + 1))?;
        match outcome {
            UpsertOutcome::Inserted => inserted += 1,
            UpsertOutcome::Skipped => skipped += 1,
        }
    }

    println!("Seeded {} index values ({} already present).", inserted, skipped);
    println!("Database setup complete!");
    Ok(())
}
