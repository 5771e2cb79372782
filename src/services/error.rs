//! Error taxonomy shared by the engine services.

use thiserror::Error;

/// Failure surfaced by the engine to its callers.
///
/// Missing index data is never an error here; the calculator falls back to a
/// neutral result instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Entity absent or not owned by the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Request violates a lease or payment rule. The message is shown verbatim.
    #[error("{0}")]
    BusinessRule(String),

    /// Persistence layer unreachable or failing. Retryable by the caller.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Upstream source failed. Contained by the refresh orchestrator.
    #[error("fetch failed for {fetcher}: {message}")]
    Fetch { fetcher: String, message: String },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        EngineError::NotFound { entity, id }
    }

    pub fn rule(message: impl Into<String>) -> Self {
        EngineError::BusinessRule(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        EngineError::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn fetch(fetcher: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Fetch {
            fetcher: fetcher.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::StoreUnavailable {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    // ═══════════════════════════════════════════════════════════════════════
    // Display
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn not_found_names_entity_and_id() {
        let err = EngineError::not_found("Lease", 42);
        assert_eq!(err.to_string(), "Lease not found: 42");
    }

    #[test]
    fn business_rule_message_is_verbatim() {
        let err = EngineError::rule("Lease must be at least 30 days long");
        assert_eq!(err.to_string(), "Lease must be at least 30 days long");
    }

    #[test]
    fn fetch_error_names_fetcher() {
        let err = EngineError::fetch("bcra-icl", "timed out");
        assert_eq!(err.to_string(), "fetch failed for bcra-icl: timed out");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Conversions
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn sqlx_errors_become_store_unavailable_with_source() {
        let err: EngineError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, EngineError::StoreUnavailable { .. }));
        assert!(err.source().is_some());
    }
}
