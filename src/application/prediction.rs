//! Prediction service: Orchestrates the request-to-risk pipeline.
//!
//! Stages run strictly in order:
//! - Normalize categorical labels to numeric codes
//! - Validate that all 13 features are present
//! - Classify (label + probability) on the blocking pool under a deadline
//! - Tier the probability and shape the response
//!
//! No authentication happens here. `/predict` is open on purpose; deployments
//! that need it protected must put it behind `AuthService::verify`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use super::run_bounded;
use crate::domain::{normalize, PatientFeatures, PredictionResult};
use crate::ports::{ClassifierError, RiskClassifier};
use crate::{CardioError, Result};

/// Service for running risk predictions.
pub struct PredictionService<C>
where
    C: RiskClassifier + 'static,
{
    classifier: Arc<C>,
    timeout: Duration,
}

impl<C> PredictionService<C>
where
    C: RiskClassifier + 'static,
{
    /// Create a new prediction service; each classifier call is bounded by `timeout`.
    pub fn new(classifier: Arc<C>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    /// Whether the classifier can serve requests.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.classifier.is_loaded()
    }

    /// Run one prediction over a raw request body.
    ///
    /// # Errors
    /// - `Validation` if the body is empty or a value is not numeric
    /// - `MissingFeatures` listing every absent or null feature
    /// - `ModelUnavailable` if the model is not loaded or misbehaves
    /// - `Timeout` if the classifier exceeds its deadline
    pub async fn predict(&self, mut record: Map<String, Value>) -> Result<PredictionResult> {
        if record.is_empty() {
            return Err(CardioError::Validation("No data provided".to_string()));
        }

        let rewritten = normalize::normalize(&mut record);
        let features = PatientFeatures::from_record(&record)?;
        tracing::debug!("Normalized {rewritten} categorical field(s)");

        // Fail closed before touching the blocking pool.
        if !self.classifier.is_loaded() {
            return Err(ClassifierError::NotLoaded.into());
        }

        let classifier = Arc::clone(&self.classifier);
        let (label, probability) = run_bounded(self.timeout, "Classifier", move || {
            let label = classifier.predict(&features)?;
            let probability = classifier.predict_proba(&features)?;
            Ok((label, probability))
        })
        .await?;

        check_output(label, probability)?;

        let result = PredictionResult::from_scores(label, probability);
        tracing::info!("Prediction complete: risk={}", result.risk_level);
        Ok(result)
    }
}

fn check_output(label: u8, probability: f64) -> Result<()> {
    if label > 1 {
        return Err(ClassifierError::InvalidOutput(format!("label {label}")).into());
    }
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(ClassifierError::InvalidOutput(format!("probability {probability}")).into());
    }
    Ok(())
}
