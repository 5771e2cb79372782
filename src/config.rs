// src/config.rs
use log::warn;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use std::time::Duration;

pub const DEFAULT_DOLAR_API_URL: &str = "https://dolarapi.com/v1/dolares";
pub const DEFAULT_IPC_SOURCE_URL: &str = "https://api.argentinadatos.com/v1/finanzas/indices/inflacion";
pub const DEFAULT_ICL_SOURCE_URL: &str =
    "https://www.bcra.gob.ar/Pdfs/PublicacionesEstadisticas/diar_icl.xls";

const DEV_JWT_SECRET: &str = "rent-indexation-dev-secret";
/// Headroom a refresh gets beyond the slowest HTTP client timeout.
const REFRESH_SLACK: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
#[error("invalid {variable}: {message}")]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub fetch_timeout: Duration,
    pub spreadsheet_timeout: Duration,
    pub scheduler_enabled: bool,
    pub startup_backfill: bool,
    pub dolar_api_url: String,
    pub ipc_source_url: String,
    pub icl_source_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: 3030,
            database_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            fetch_timeout: Duration::from_secs(30),
            spreadsheet_timeout: Duration::from_secs(60),
            scheduler_enabled: true,
            startup_backfill: false,
            dolar_api_url: DEFAULT_DOLAR_API_URL.to_string(),
            ipc_source_url: DEFAULT_IPC_SOURCE_URL.to_string(),
            icl_source_url: DEFAULT_ICL_SOURCE_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Call `dotenv().ok()` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let port = parse_or("PORT", &lookup, defaults.port)?;
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if database_url.is_none() {
            warn!("DATABASE_URL not set, using the in-memory store");
        }

        let jwt_secret = match lookup("JWT_SECRET").filter(|v| !v.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set, using the development secret");
                defaults.jwt_secret
            }
        };

        Ok(AppConfig {
            port,
            database_url,
            jwt_secret,
            fetch_timeout: Duration::from_secs(parse_or("FETCH_TIMEOUT_SECS", &lookup, 30u64)?),
            spreadsheet_timeout: Duration::from_secs(parse_or("SPREADSHEET_TIMEOUT_SECS", &lookup, 60u64)?),
            scheduler_enabled: parse_bool_or("SCHEDULER_ENABLED", &lookup, defaults.scheduler_enabled)?,
            startup_backfill: parse_bool_or("STARTUP_BACKFILL", &lookup, defaults.startup_backfill)?,
            dolar_api_url: lookup("DOLAR_API_URL").unwrap_or(defaults.dolar_api_url),
            ipc_source_url: lookup("IPC_SOURCE_URL").unwrap_or(defaults.ipc_source_url),
            icl_source_url: lookup("ICL_SOURCE_URL").unwrap_or(defaults.icl_source_url),
        })
    }

    /// Outer bound on one fetcher call, derived from the client timeouts.
    pub fn refresh_timeout(&self) -> Duration {
        self.fetch_timeout.max(self.spreadsheet_timeout) + REFRESH_SLACK
    }
}

fn parse_or<T, F>(variable: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(variable) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError {
            variable,
            message: format!("{:?}: {}", raw, e),
        }),
    }
}

fn parse_bool_or<F>(variable: &'static str, lookup: &F, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(variable) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError {
                variable,
                message: format!("{:?} is not a boolean", raw),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3030);
        assert!(config.database_url.is_none());
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.spreadsheet_timeout, Duration::from_secs(60));
        assert!(config.scheduler_enabled);
        assert!(!config.startup_backfill);
        assert_eq!(config.icl_source_url, DEFAULT_ICL_SOURCE_URL);
        assert_eq!(config.refresh_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/rent"),
            ("FETCH_TIMEOUT_SECS", "5"),
            ("SCHEDULER_ENABLED", "false"),
            ("STARTUP_BACKFILL", "yes"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/rent"));
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert!(!config.scheduler_enabled);
        assert!(config.startup_backfill);
        assert_eq!(config.jwt_secret, "s3cret");
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert_eq!(err.variable, "PORT");
        let err = AppConfig::from_lookup(lookup(&[("SCHEDULER_ENABLED", "maybe")])).unwrap_err();
        assert_eq!(err.variable, "SCHEDULER_ENABLED");
        assert!(err.to_string().starts_with("invalid SCHEDULER_ENABLED: "));
    }

    #[test]
    fn refresh_timeout_follows_the_slowest_client() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FETCH_TIMEOUT_SECS", "120"),
            ("SPREADSHEET_TIMEOUT_SECS", "45"),
        ]))
        .unwrap();
        assert_eq!(config.refresh_timeout(), Duration::from_secs(150));
    }
}
