//! Classifier port: Trait for the pre-trained risk model.
//!
//! This trait abstracts the model artifact from the prediction pipeline so the
//! pipeline can run against a stub in tests.

use crate::domain::PatientFeatures;

/// Errors that can occur while loading or invoking a classifier.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    #[error("Model not loaded")]
    NotLoaded,

    #[error("Invalid model artifact: {0}")]
    Artifact(String),

    #[error("Model signature verification failed: {0}")]
    Signature(String),

    #[error("Classifier produced invalid output: {0}")]
    InvalidOutput(String),
}

/// Binary classifier for cardiovascular risk.
///
/// Implementations are loaded once at startup and are read-only afterwards;
/// calls may come from many worker threads at once.
pub trait RiskClassifier: Send + Sync {
    /// Thresholded class label: 0 = no disease, 1 = disease.
    ///
    /// # Errors
    /// Returns `ClassifierError::NotLoaded` if no model is available.
    fn predict(&self, features: &PatientFeatures) -> Result<u8, ClassifierError>;

    /// Calibrated probability of the positive class, in `[0, 1]`.
    ///
    /// # Errors
    /// Returns `ClassifierError::NotLoaded` if no model is available.
    fn predict_proba(&self, features: &PatientFeatures) -> Result<f64, ClassifierError>;

    /// Whether a model is loaded and calls can succeed.
    fn is_loaded(&self) -> bool;
}
