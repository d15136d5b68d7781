//! # Cardiorisk
//!
//! Authenticated HTTP service for cardiovascular risk prediction.
//!
//! This crate provides:
//! - A request-to-prediction pipeline (normalize, validate, classify, tier)
//! - Stateless bearer-token sessions over a user store
//! - An axum HTTP surface wiring both together
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (features, risk levels, users, tokens)
//! - `ports`: Trait definitions for external collaborators
//! - `adapters`: Concrete implementations (SQLite, logistic model, log sanitizer)
//! - `application`: Use cases orchestrating domain and ports
//! - `http`: Routes, extractors and JSON error mapping
//! - `config`: Environment-supplied runtime configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod http;
pub mod ports;

pub use domain::{PatientFeatures, PredictionResult, RiskLevel};

/// Result type for Cardiorisk operations
pub type Result<T> = std::result::Result<T, CardioError>;

/// Main error type for Cardiorisk.
///
/// Every variant maps to exactly one HTTP status at the boundary
/// (see [`http::ApiError`]).
#[derive(Debug, thiserror::Error)]
pub enum CardioError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    UserExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Missing features: [{}]", quoted_list(.0))]
    MissingFeatures(Vec<String>),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("User store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ports::StoreError> for CardioError {
    fn from(e: ports::StoreError) -> Self {
        match e {
            ports::StoreError::Duplicate(_) => Self::UserExists,
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<ports::ClassifierError> for CardioError {
    fn from(e: ports::ClassifierError) -> Self {
        Self::ModelUnavailable(e.to_string())
    }
}

/// Render names as `'a', 'b'` for error messages.
pub(crate) fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_features_message() {
        let err = CardioError::MissingFeatures(vec!["thal".into()]);
        assert_eq!(err.to_string(), "Missing features: ['thal']");

        let err = CardioError::MissingFeatures(vec!["age".into(), "ca".into()]);
        assert_eq!(err.to_string(), "Missing features: ['age', 'ca']");
    }

    #[test]
    fn test_duplicate_store_error_becomes_user_exists() {
        let err: CardioError = ports::StoreError::Duplicate("alice".into()).into();
        assert!(matches!(err, CardioError::UserExists));

        let err: CardioError = ports::StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, CardioError::StoreUnavailable(_)));
    }
}
