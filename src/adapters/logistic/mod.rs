//! Logistic adapter: Implementation of RiskClassifier.
//!
//! Loads a standardized logistic regression exported as JSON (`model.json`)
//! and scores feature records in plaintext.
//!
//! # Security
//!
//! - When a verifying key is configured, the artifact directory must carry a
//!   `manifest.json` signed with Ed25519 (`model.sig`), and the manifest must
//!   bind `model.json` by SHA-256
//! - Without a key, unsigned artifacts load with a warning
//! - A classifier that failed to load stays unloaded; every call fails closed
//!
//! # Thread Safety
//!
//! The model is immutable after loading, so one instance is shared by all
//! request workers without locking.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{PatientFeatures, FEATURE_COUNT, FEATURE_NAMES};
use crate::ports::{ClassifierError, RiskClassifier};

/// Artifact file name inside a model directory.
pub const MODEL_FILE: &str = "model.json";
/// Signed manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Detached Ed25519 signature over the manifest bytes.
pub const SIGNATURE_FILE: &str = "model.sig";

/// Allowed clock skew for manifest timestamps, in seconds.
const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// Model parameters exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

/// Signed list of artifact files and their SHA-256 digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    pub created_at: i64,
    pub files: BTreeMap<String, String>,
}

/// How artifacts must be authenticated before loading.
#[derive(Debug, Clone)]
pub enum ModelTrust {
    /// Load without a signature check.
    Unsigned,
    /// Require a manifest signed by this key.
    Signed(VerifyingKey),
}

impl ModelTrust {
    /// Read a base64 Ed25519 verifying key from a file.
    ///
    /// # Errors
    /// Returns error if the file is unreadable or not a 32-byte key.
    pub fn from_pubkey_file(path: &Path) -> Result<Self, ClassifierError> {
        let b64 = fs::read_to_string(path).map_err(|e| {
            ClassifierError::Signature(format!("Failed reading pubkey file {path:?}: {e}"))
        })?;
        verifying_key_from_b64(&b64).map(Self::Signed)
    }
}

/// Decode a base64 Ed25519 verifying key.
///
/// # Errors
/// Returns error if the input is not base64 of exactly 32 valid key bytes.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ClassifierError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ClassifierError::Signature("Invalid public key base64".into()))?;
    let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        ClassifierError::Signature("Invalid public key length (expected 32 bytes)".into())
    })?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ClassifierError::Signature("Invalid verifying key".into()))
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Parameters reordered into [`FEATURE_NAMES`] order.
#[derive(Debug, Clone)]
struct Standardized {
    coefficients: [f64; FEATURE_COUNT],
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
    intercept: f64,
    threshold: f64,
}

impl Standardized {
    fn from_export(model: &ExportedModel) -> Result<Self, ClassifierError> {
        let n = model.feature_names.len();
        if n != FEATURE_COUNT {
            return Err(ClassifierError::Artifact(format!(
                "Invalid feature count in model: got {n}, expected {FEATURE_COUNT}"
            )));
        }
        if model.coefficients.len() != n
            || model.scaler_mean.len() != n
            || model.scaler_scale.len() != n
        {
            return Err(ClassifierError::Artifact(
                "Model parameter lengths do not match feature_names length".into(),
            ));
        }
        if !(model.threshold > 0.0 && model.threshold < 1.0) {
            return Err(ClassifierError::Artifact(format!(
                "Threshold {} outside (0, 1)",
                model.threshold
            )));
        }
        if !model.intercept.is_finite() {
            return Err(ClassifierError::Artifact("Intercept is not finite".into()));
        }

        let mut out = Self {
            coefficients: [0.0; FEATURE_COUNT],
            mean: [0.0; FEATURE_COUNT],
            scale: [1.0; FEATURE_COUNT],
            intercept: model.intercept,
            threshold: model.threshold,
        };
        let mut seen = [false; FEATURE_COUNT];

        for (i, name) in model.feature_names.iter().enumerate() {
            let slot = FEATURE_NAMES
                .iter()
                .position(|f| *f == name.as_str())
                .ok_or_else(|| ClassifierError::Artifact(format!("Unknown feature {name:?}")))?;
            if seen[slot] {
                return Err(ClassifierError::Artifact(format!(
                    "Duplicate feature {name:?}"
                )));
            }
            seen[slot] = true;

            let (coef, mean, scale) =
                (model.coefficients[i], model.scaler_mean[i], model.scaler_scale[i]);
            if !(coef.is_finite() && mean.is_finite() && scale.is_finite()) || scale == 0.0 {
                return Err(ClassifierError::Artifact(format!(
                    "Non-finite or zero-scale parameters for {name:?}"
                )));
            }
            out.coefficients[slot] = coef;
            out.mean[slot] = mean;
            out.scale[slot] = scale;
        }

        Ok(out)
    }

    fn probability(&self, features: &PatientFeatures) -> f64 {
        let x = features.to_vec();
        let logit = (0..FEATURE_COUNT).fold(self.intercept, |acc, i| {
            acc + self.coefficients[i] * (x[i] - self.mean[i]) / self.scale[i]
        });
        sigmoid(logit)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Logistic regression classifier.
pub struct LogisticClassifier {
    model: Option<Standardized>,
}

impl LogisticClassifier {
    /// Create a classifier with no model loaded.
    #[must_use]
    pub fn new() -> Self {
        Self { model: None }
    }

    /// Create a loaded classifier from in-memory parameters.
    ///
    /// # Errors
    /// Returns error if the parameters are inconsistent.
    pub fn from_model(model: &ExportedModel) -> Result<Self, ClassifierError> {
        Ok(Self {
            model: Some(Standardized::from_export(model)?),
        })
    }

    /// Load the model from `model_path` (a directory or a `model.json` file).
    ///
    /// # Errors
    /// Returns error if the artifact is missing, malformed, or fails the
    /// signature policy. The classifier keeps its previous state on error.
    pub fn load_model(&mut self, model_path: &Path, trust: &ModelTrust) -> Result<(), ClassifierError> {
        let (base_dir, file) = split_model_path(model_path);

        if let ModelTrust::Signed(key) = trust {
            let manifest = verify_manifest(&base_dir, key)?;
            if !manifest.files.contains_key(&file) {
                return Err(ClassifierError::Signature(format!(
                    "{MANIFEST_FILE} does not bind {file}"
                )));
            }
        } else {
            tracing::warn!("Loading UNSIGNED model artifact from {:?}", base_dir);
        }

        let path = base_dir.join(&file);
        let content = fs::read_to_string(&path)
            .map_err(|e| ClassifierError::Artifact(format!("Failed to read {path:?}: {e}")))?;
        let exported: ExportedModel = serde_json::from_str(&content)
            .map_err(|e| ClassifierError::Artifact(format!("Failed to parse {path:?}: {e}")))?;
        let model = Standardized::from_export(&exported)?;

        tracing::info!(
            "Loaded model from {:?} (n_features={}, threshold={})",
            path,
            FEATURE_COUNT,
            model.threshold
        );
        self.model = Some(model);
        Ok(())
    }

    fn model(&self) -> Result<&Standardized, ClassifierError> {
        self.model.as_ref().ok_or(ClassifierError::NotLoaded)
    }
}

impl Default for LogisticClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskClassifier for LogisticClassifier {
    fn predict(&self, features: &PatientFeatures) -> Result<u8, ClassifierError> {
        let model = self.model()?;
        Ok(u8::from(model.probability(features) >= model.threshold))
    }

    fn predict_proba(&self, features: &PatientFeatures) -> Result<f64, ClassifierError> {
        Ok(self.model()?.probability(features))
    }

    fn is_loaded(&self) -> bool {
        self.model.is_some()
    }
}

/// Sign the artifact at `model_path` (a directory or a model file).
///
/// Writes `manifest.json` binding the artifact by SHA-256 and `model.sig`
/// next to it. The file bound is the one [`LogisticClassifier::load_model`]
/// reads for the same path.
///
/// # Errors
/// Returns error if the artifact is unreadable or the outputs cannot be written.
pub fn sign_artifact(model_path: &Path, key: &SigningKey) -> Result<ModelManifest, ClassifierError> {
    let (base_dir, file) = split_model_path(model_path);
    let path = base_dir.join(&file);
    let bytes = fs::read(&path)
        .map_err(|e| ClassifierError::Artifact(format!("Failed to read {path:?}: {e}")))?;

    let manifest = ModelManifest {
        version: 1,
        created_at: chrono::Utc::now().timestamp(),
        files: [(file, sha256_hex(&bytes))].into_iter().collect(),
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| ClassifierError::Artifact(format!("Cannot encode manifest: {e}")))?;
    let signature = key.sign(&manifest_bytes);

    let write = |name: &str, contents: &[u8]| {
        fs::write(base_dir.join(name), contents)
            .map_err(|e| ClassifierError::Artifact(format!("Cannot write {name}: {e}")))
    };
    write(MANIFEST_FILE, manifest_bytes.as_slice())?;
    write(SIGNATURE_FILE, signature.to_bytes().as_slice())?;
    Ok(manifest)
}

/// Split a configured path into (directory, artifact file name).
fn split_model_path(model_path: &Path) -> (PathBuf, String) {
    if model_path.is_dir() {
        return (model_path.to_path_buf(), MODEL_FILE.to_string());
    }
    let dir = model_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file = model_path
        .file_name()
        .map_or_else(|| MODEL_FILE.to_string(), |f| f.to_string_lossy().into_owned());
    (dir, file)
}

/// Verify `manifest.json` against `model.sig` and every bound file hash.
fn verify_manifest(base_dir: &Path, key: &VerifyingKey) -> Result<ModelManifest, ClassifierError> {
    let sig_path = base_dir.join(SIGNATURE_FILE);
    let manifest_path = base_dir.join(MANIFEST_FILE);

    let sig_bytes = fs::read(&sig_path)
        .map_err(|e| ClassifierError::Signature(format!("Failed to read signature: {e}")))?;
    let sig_bytes: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
        ClassifierError::Signature("Invalid signature length (expected 64 bytes)".into())
    })?;
    let signature = Signature::from_bytes(&sig_bytes);

    let manifest_content = fs::read(&manifest_path)
        .map_err(|e| ClassifierError::Signature(format!("Failed to read manifest: {e}")))?;
    key.verify(&manifest_content, &signature)
        .map_err(|_| ClassifierError::Signature("Invalid model signature".into()))?;

    let manifest: ModelManifest = serde_json::from_slice(&manifest_content)
        .map_err(|e| ClassifierError::Signature(format!("Invalid {MANIFEST_FILE} format: {e}")))?;
    if manifest.version != 1 {
        return Err(ClassifierError::Signature(format!(
            "Unsupported manifest version: {}",
            manifest.version
        )));
    }
    if manifest.created_at > chrono::Utc::now().timestamp() + MAX_FUTURE_SKEW_SECS {
        return Err(ClassifierError::Signature(
            "manifest created_at is in the future".into(),
        ));
    }

    for (rel, expected_hex) in &manifest.files {
        if Path::new(rel).components().count() != 1 {
            return Err(ClassifierError::Signature(format!(
                "Manifest entry {rel:?} must be a plain file name"
            )));
        }
        let path = base_dir.join(rel);
        let bytes = fs::read(&path).map_err(|e| {
            ClassifierError::Signature(format!(
                "Manifest references missing/unreadable file {path:?}: {e}"
            ))
        })?;
        if !constant_time_eq_str(&sha256_hex(&bytes), expected_hex) {
            return Err(ClassifierError::Signature(format!(
                "File hash mismatch for {rel}"
            )));
        }
    }

    tracing::info!("Model signature and hashes verified successfully");
    Ok(manifest)
}
