//! Patient feature record for cardiovascular risk prediction.
//!
//! Based on the 13 clinical attributes of the Cleveland heart disease dataset.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{quoted_list, CardioError};

/// Number of clinical features consumed by the classifier.
pub const FEATURE_COUNT: usize = 13;

/// Feature names in the order the classifier expects them.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Clinical features, all numeric, after normalization and validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PatientFeatures {
    /// Age in years
    pub age: f64,

    /// Sex: 1 = male, 0 = female
    pub sex: f64,

    /// Chest pain type (0 typical angina .. 3 asymptomatic)
    pub cp: f64,

    /// Resting blood pressure in mmHg
    pub trestbps: f64,

    /// Serum cholesterol in mg/dL
    pub chol: f64,

    /// Fasting blood sugar > 120 mg/dL: 1 = yes, 0 = no
    pub fbs: f64,

    /// Resting ECG (0 normal, 1 ST-T abnormality, 2 LV hypertrophy)
    pub restecg: f64,

    /// Maximum heart rate achieved
    pub thalach: f64,

    /// Exercise induced angina: 1 = yes, 0 = no
    pub exang: f64,

    /// ST depression induced by exercise relative to rest
    pub oldpeak: f64,

    /// Slope of the peak exercise ST segment (0 up, 1 flat, 2 down)
    pub slope: f64,

    /// Number of major vessels colored by fluoroscopy (0-3)
    pub ca: f64,

    /// Thalassemia (3 normal, 6 fixed defect, 7 reversible defect)
    pub thal: f64,
}

impl PatientFeatures {
    /// Convert features to a vector in [`FEATURE_NAMES`] order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.age,
            self.sex,
            self.cp,
            self.trestbps,
            self.chol,
            self.fbs,
            self.restecg,
            self.thalach,
            self.exang,
            self.oldpeak,
            self.slope,
            self.ca,
            self.thal,
        ]
    }

    /// Create features from a vector in [`FEATURE_NAMES`] order.
    ///
    /// # Errors
    /// Returns error if vector length is not 13.
    pub fn from_vec(v: &[f64]) -> Result<Self, String> {
        if v.len() != FEATURE_COUNT {
            return Err(format!(
                "Expected {FEATURE_COUNT} features, got {}",
                v.len()
            ));
        }

        Ok(Self {
            age: v[0],
            sex: v[1],
            cp: v[2],
            trestbps: v[3],
            chol: v[4],
            fbs: v[5],
            restecg: v[6],
            thalach: v[7],
            exang: v[8],
            oldpeak: v[9],
            slope: v[10],
            ca: v[11],
            thal: v[12],
        })
    }

    /// Validate a normalized request record and extract the 13 features.
    ///
    /// Absent and `null` keys are missing; every missing key is reported, in
    /// [`FEATURE_NAMES`] order. Numeric ranges are not checked. Keys outside
    /// the feature set are ignored.
    ///
    /// # Errors
    /// - `CardioError::MissingFeatures` if any required key is absent or null
    /// - `CardioError::Validation` if a present value is not numeric
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, CardioError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();
        let mut values = [0.0; FEATURE_COUNT];

        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            match record.get(name) {
                None | Some(Value::Null) => missing.push(name.to_string()),
                Some(value) => match numeric_value(value) {
                    Some(x) => *slot = x,
                    None => invalid.push(name.to_string()),
                },
            }
        }

        if !missing.is_empty() {
            return Err(CardioError::MissingFeatures(missing));
        }
        if !invalid.is_empty() {
            return Err(CardioError::Validation(format!(
                "Invalid features: [{}]",
                quoted_list(&invalid)
            )));
        }

        Self::from_vec(&values).map_err(CardioError::Internal)
    }
}

/// Numbers pass through; strings holding a finite number are parsed.
fn numeric_value(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_record() -> Map<String, Value> {
        json!({
            "age": 63, "sex": 1, "cp": 3, "trestbps": 145, "chol": 233, "fbs": 1,
            "restecg": 0, "thalach": 150, "exang": 0, "oldpeak": 2.3, "slope": 0,
            "ca": 0, "thal": 3
        })
        .as_object()
        .cloned()
        .expect("object literal")
    }

    #[test]
    fn test_features_to_vec_order() {
        let features = PatientFeatures::from_record(&complete_record()).expect("valid");
        let v = features.to_vec();
        assert_eq!(v.len(), FEATURE_COUNT);
        assert!((v[0] - 63.0).abs() < f64::EPSILON);
        assert!((v[9] - 2.3).abs() < f64::EPSILON);
        assert!((v[12] - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(PatientFeatures::from_vec(&[1.0; 9]).is_err());
        assert!(PatientFeatures::from_vec(&[1.0; FEATURE_COUNT]).is_ok());
    }

    #[test]
    fn test_single_missing_feature() {
        let mut record = complete_record();
        record.remove("thal");

        match PatientFeatures::from_record(&record) {
            Err(CardioError::MissingFeatures(names)) => assert_eq!(names, vec!["thal"]),
            other => panic!("expected MissingFeatures, got {other:?}"),
        }
    }

    #[test]
    fn test_every_missing_feature_is_listed() {
        let mut record = complete_record();
        record.remove("ca");
        record.remove("age");
        record.insert("chol".into(), Value::Null);

        match PatientFeatures::from_record(&record) {
            Err(CardioError::MissingFeatures(names)) => {
                assert_eq!(names, vec!["age", "chol", "ca"]);
            }
            other => panic!("expected MissingFeatures, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_record_lists_all_features() {
        match PatientFeatures::from_record(&Map::new()) {
            Err(CardioError::MissingFeatures(names)) => assert_eq!(names.len(), FEATURE_COUNT),
            other => panic!("expected MissingFeatures, got {other:?}"),
        }
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let mut record = complete_record();
        record.insert("age".into(), json!(" 63 "));
        record.insert("oldpeak".into(), json!("2.3"));

        let features = PatientFeatures::from_record(&record).expect("valid");
        assert!((features.age - 63.0).abs() < f64::EPSILON);
        assert!((features.oldpeak - 2.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_numeric_values_are_invalid() {
        let mut record = complete_record();
        record.insert("cp".into(), json!("Very Bad Pain"));
        record.insert("fbs".into(), json!(true));

        match PatientFeatures::from_record(&record) {
            Err(CardioError::Validation(msg)) => {
                assert_eq!(msg, "Invalid features: ['cp', 'fbs']");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_wins_over_invalid() {
        let mut record = complete_record();
        record.insert("cp".into(), json!("nonsense"));
        record.remove("slope");

        assert!(matches!(
            PatientFeatures::from_record(&record),
            Err(CardioError::MissingFeatures(_))
        ));
    }

    #[test]
    fn test_no_range_validation() {
        let mut record = complete_record();
        record.insert("age".into(), json!(-5));
        record.insert("chol".into(), json!(10_000));

        let features = PatientFeatures::from_record(&record).expect("ranges are not checked");
        assert!((features.age + 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extra_keys_are_ignored() {
        let mut record = complete_record();
        record.insert("patient_name".into(), json!("someone"));
        assert!(PatientFeatures::from_record(&record).is_ok());
    }
}
