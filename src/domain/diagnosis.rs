//! Prediction result types.
//!
//! Represents the output of the heart disease classifier as returned to clients.

use serde::{Deserialize, Serialize};

/// Probability below which risk is low.
pub const LOW_RISK_BELOW: f64 = 0.30;

/// Probability above which risk is high.
pub const HIGH_RISK_ABOVE: f64 = 0.70;

/// Risk tier derived from the positive-class probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Low risk of heart disease
    Low,
    /// Medium risk, follow-up recommended
    Medium,
    /// High risk, consultation advised
    High,
}

impl RiskLevel {
    /// Tier a probability: `< 0.30` low, `0.30..=0.70` medium, `> 0.70` high.
    ///
    /// Both boundaries belong to `Medium`.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability < LOW_RISK_BELOW {
            Self::Low
        } else if probability <= HIGH_RISK_ABOVE {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Response body of a successful prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Binary prediction (0 = no disease, 1 = disease present)
    pub prediction: u8,

    /// Positive-class probability rounded to 2 decimals
    pub probability: f64,

    /// Risk tier of the unrounded probability
    pub risk_level: RiskLevel,
}

impl PredictionResult {
    /// Build a result from raw classifier output.
    ///
    /// The tier is taken from the raw probability, then the probability is
    /// rounded for display.
    #[must_use]
    pub fn from_scores(label: u8, probability: f64) -> Self {
        Self {
            prediction: label,
            probability: round2(probability),
            risk_level: RiskLevel::from_probability(probability),
        }
    }
}

/// Round half away from zero to 2 decimals.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
