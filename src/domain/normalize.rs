//! Categorical-to-numeric input normalization.
//!
//! Each categorical field owns its label table. Labels are never looked up
//! across fields, so "Normal" means 0 for `restecg` and 3 for `thal`.

use serde_json::{Map, Value};

type LabelTable = &'static [(&'static str, i64)];

const SEX: LabelTable = &[("Male", 1), ("Female", 0)];

const CHEST_PAIN: LabelTable = &[
    ("Typical Angina", 0),
    ("Atypical Angina", 1),
    ("Non-anginal Pain", 2),
    ("Asymptomatic", 3),
];

const YES_NO: LabelTable = &[("Yes", 1), ("No", 0)];

const RESTING_ECG: LabelTable = &[
    ("Normal", 0),
    ("ST-T wave abnormality", 1),
    ("Left ventricular hypertrophy", 2),
];

const ST_SLOPE: LabelTable = &[("Upsloping", 0), ("Flat", 1), ("Downsloping", 2)];

const THALASSEMIA: LabelTable = &[("Normal", 3), ("Fixed Defect", 6), ("Reversible Defect", 7)];

/// Categorical fields and their label tables.
pub const CATEGORICAL_FIELDS: [(&str, LabelTable); 7] = [
    ("sex", SEX),
    ("cp", CHEST_PAIN),
    ("fbs", YES_NO),
    ("restecg", RESTING_ECG),
    ("exang", YES_NO),
    ("slope", ST_SLOPE),
    ("thal", THALASSEMIA),
];

/// Look up the numeric code of `label` for `field`.
///
/// Returns `None` for non-categorical fields and unknown labels.
#[must_use]
pub fn categorical_code(field: &str, label: &str) -> Option<i64> {
    CATEGORICAL_FIELDS
        .iter()
        .find(|(name, _)| *name == field)
        .and_then(|(_, table)| table.iter().find(|(l, _)| *l == label))
        .map(|(_, code)| *code)
}

/// Replace categorical labels with their codes, in place.
///
/// Only string values of categorical fields that match a label exactly are
/// rewritten. Numbers, unknown labels and non-categorical fields pass through
/// unchanged, so applying this twice is the same as applying it once.
///
/// Returns the number of values rewritten.
pub fn normalize(record: &mut Map<String, Value>) -> usize {
    let mut rewritten = 0;
    for (field, _) in CATEGORICAL_FIELDS {
        let Some(value) = record.get_mut(field) else {
            continue;
        };
        let code = match value {
            Value::String(label) => categorical_code(field, label),
            _ => None,
        };
        if let Some(code) = code {
            *value = Value::from(code);
            rewritten += 1;
        }
    }
    rewritten
}
