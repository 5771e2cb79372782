// src/handlers/error.rs
use log::error;
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

use crate::services::error::EngineError;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Fetch { .. } => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        ApiError::new(status, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

/// Turns an engine failure into a warp rejection carrying its HTTP status.
pub fn reject(err: EngineError) -> warp::Rejection {
    warp::reject::custom(ApiError::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        assert_eq!(ApiError::from(EngineError::not_found("Lease", 4)).status, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(EngineError::rule("nope")).status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::from(EngineError::store("down")).status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn business_rule_message_is_kept_verbatim() {
        let api = ApiError::from(EngineError::rule("Payment date cannot be before lease start date"));
        assert_eq!(api.message, "Payment date cannot be before lease start date");
    }
}
