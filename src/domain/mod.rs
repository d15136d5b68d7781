//! Domain layer: Core business types and logic.
//!
//! This module contains the request-to-prediction rules (normalization,
//! validation, risk tiers) and the account primitives (users, password
//! hashes, tokens). Nothing here performs I/O.

mod diagnosis;
pub mod normalize;
pub mod password;
mod patient;
pub mod token;
mod user;

pub use diagnosis::{PredictionResult, RiskLevel, HIGH_RISK_ABOVE, LOW_RISK_BELOW};
pub use patient::{PatientFeatures, FEATURE_COUNT, FEATURE_NAMES};
pub use token::{TokenIssuer, TokenSecret};
pub use user::UserRecord;
